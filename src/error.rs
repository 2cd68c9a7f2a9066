// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::auth::GateError;
use crate::graph::GraphError;
use crate::models::ValidationErrors;
use crate::patch::PatchError;
use crate::services::ProjectError;
use crate::store::StoreError;

/// HTTP API error. Every variant renders as a structured body naming its
/// kind; no entity state is ever attached.
#[derive(Debug)]
pub enum ApiError {
    // 401
    Unauthenticated(String),

    // 403
    Unauthorized(String),

    // 404
    NotFound(String),

    // 409
    PatchConflict(String),

    // 422
    ValidationFailed {
        message: String,
        field_errors: BTreeMap<String, String>,
    },

    // 500
    Internal(String),

    // 503
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PatchConflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthenticated(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::PatchConflict(msg) => msg,
            ApiError::ValidationFailed { message, .. } => message,
            ApiError::Internal(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Name of the failure kind, as reported in the body
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "Unauthenticated",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::NotFound(_) => "NotFound",
            ApiError::PatchConflict(_) => "PatchConflict",
            ApiError::ValidationFailed { .. } => "ValidationFailed",
            ApiError::Internal(_) => "Internal",
            ApiError::ServiceUnavailable(_) => "ServiceUnavailable",
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated(_) => "UNAUTHENTICATED",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::PatchConflict(_) => "PATCH_CONFLICT",
            ApiError::ValidationFailed { .. } => "VALIDATION_FAILED",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "kind": self.kind(),
            "code": self.error_code(),
            "message": self.message(),
        });
        if let ApiError::ValidationFailed { field_errors, .. } = self {
            if !field_errors.is_empty() {
                body["field_errors"] = json!(field_errors);
            }
        }
        body
    }
}

impl ApiError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        ApiError::Unauthenticated(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn patch_conflict(message: impl Into<String>) -> Self {
        ApiError::PatchConflict(message.into())
    }

    pub fn validation_failed(message: impl Into<String>, field_errors: BTreeMap<String, String>) -> Self {
        ApiError::ValidationFailed {
            message: message.into(),
            field_errors,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        ApiError::validation_failed("Validation failed", err.into_fields())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // Store details stay in the log
        tracing::error!("Store error: {}", err);
        match err {
            StoreError::Timeout { .. } => ApiError::internal("The request could not be completed in time"),
            _ => ApiError::internal("An error occurred while processing your request"),
        }
    }
}

impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Unauthenticated => ApiError::unauthenticated("A valid bearer credential is required"),
            GateError::Unauthorized => ApiError::unauthorized("Insufficient permissions for this project"),
            GateError::Store(e) => e.into(),
        }
    }
}

impl From<PatchError> for ApiError {
    fn from(err: PatchError) -> Self {
        match err {
            PatchError::NotFound { collection, id } => ApiError::not_found(format!("{} '{}' not found", collection, id)),
            conflict @ PatchError::Conflict { .. } => ApiError::patch_conflict(conflict.to_string()),
            PatchError::Validation(e) => e.into(),
            PatchError::Store(e) => e.into(),
        }
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NotFound { collection, id } => ApiError::not_found(format!("{} '{}' not found", collection, id)),
            GraphError::Validation(e) => e.into(),
            contended @ GraphError::Contended { .. } => ApiError::patch_conflict(contended.to_string()),
            rolled_back @ GraphError::RolledBack { .. } => {
                tracing::error!("{}", rolled_back);
                ApiError::internal("The component could not be added, please retry")
            }
            GraphError::Patch(e) => e.into(),
            GraphError::Store(e) => e.into(),
        }
    }
}

impl From<ProjectError> for ApiError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::NotFound(id) => ApiError::not_found(format!("project '{}' not found", id)),
            ProjectError::Validation(e) => e.into(),
            contended @ ProjectError::Contended { .. } => ApiError::patch_conflict(contended.to_string()),
            ProjectError::Store(e) => e.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_body_names_fields() {
        let err: ApiError = ValidationErrors::single("kind", "unknown kind 'x'").into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = err.to_json();
        assert_eq!(body["kind"], "ValidationFailed");
        assert_eq!(body["field_errors"]["kind"], "unknown kind 'x'");
    }

    #[test]
    fn gate_errors_stay_coarse() {
        let unauthenticated: ApiError = GateError::Unauthenticated.into();
        assert_eq!(unauthenticated.status_code(), StatusCode::UNAUTHORIZED);

        let unauthorized: ApiError = GateError::Unauthorized.into();
        assert_eq!(unauthorized.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(unauthorized.to_json()["kind"], "Unauthorized");

        let outage: ApiError = GateError::Store(StoreError::Unavailable("down".into())).into();
        assert_eq!(outage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!outage.message().contains("down"));
    }

    #[test]
    fn conflicts_map_to_409() {
        let err: ApiError = PatchError::Conflict {
            collection: crate::store::Collection::Views,
            id: "v1".into(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_json()["kind"], "PatchConflict");
    }

    #[test]
    fn rolled_back_add_is_internal() {
        let err: ApiError = GraphError::RolledBack {
            component_id: "c1".into(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().contains("c1"));
    }

    #[test]
    fn unavailable_store_is_503() {
        let err = ApiError::service_unavailable("document store unavailable");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_json()["code"], "SERVICE_UNAVAILABLE");
    }
}
