use axum::{
    http::{header::ETAG, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::models::Versioned;

/// Wrapper for API responses that adds the success envelope
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: Option<StatusCode>,
    /// Store version of a single entity, sent as a strong ETag
    pub version: Option<u64>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            data,
            status_code: None,
            version: None,
        }
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
            version: None,
        }
    }

    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl<E: Serialize> ApiResponse<E> {
    /// 200 with the entity's version as ETag
    pub fn entity(versioned: Versioned<E>) -> Self {
        Self {
            data: versioned.entity,
            status_code: None,
            version: Some(versioned.version),
        }
    }

    /// 201 with the entity's version as ETag
    pub fn created_entity(versioned: Versioned<E>) -> Self {
        Self {
            data: versioned.entity,
            status_code: Some(StatusCode::CREATED),
            version: Some(versioned.version),
        }
    }
}

/// Parse an `If-Match` value produced from our own ETags
pub fn parse_etag(value: &str) -> Option<u64> {
    let value = value.trim();
    let value = value.strip_prefix("W/").unwrap_or(value);
    value.trim_matches('"').parse().ok()
}

pub fn format_etag(version: u64) -> String {
    format!("\"{}\"", version)
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        let data_value = match serde_json::to_value(&self.data) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                return crate::error::ApiError::internal("Failed to serialize response data").into_response();
            }
        };

        let envelope = json!({
            "success": true,
            "data": data_value
        });

        let mut response = (status, Json(envelope)).into_response();
        if let Some(version) = self.version {
            if let Ok(value) = HeaderValue::from_str(&format_etag(version)) {
                response.headers_mut().insert(ETAG, value);
            }
        }
        response
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
