#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use traceability_api::auth::{issue_token, SigningKey};
use traceability_api::config::AppConfig;
use traceability_api::store::MemoryStore;
use traceability_api::{app, AppState};

pub const TEST_SECRET: &[u8] = b"integration-test-secret";

/// In-process API backed by a fresh in-memory store
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub key: Arc<SigningKey>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn kind(&self) -> Option<&str> {
        self.body.get("kind").and_then(Value::as_str)
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers.get(header::ETAG).and_then(|v| v.to_str().ok())
    }
}

impl TestApp {
    pub fn new() -> Self {
        let mut config = AppConfig::development();
        config.security.jwt_secret = String::from_utf8_lossy(TEST_SECRET).into_owned();

        let store = Arc::new(MemoryStore::new());
        let key = Arc::new(SigningKey::from_secret(TEST_SECRET).expect("test key"));
        let state = AppState::new(store.clone(), key.clone(), &config);

        Self {
            router: app(state, &config.server),
            store,
            key,
        }
    }

    pub fn token(&self, subject: &str) -> String {
        issue_token(&self.key, subject, chrono::Duration::hours(1)).expect("token")
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        if_match: Option<&str>,
    ) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(version) = if_match {
            builder = builder.header(header::IF_MATCH, version);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json)?)
            }
            None => Body::empty(),
        };

        let response = self.router.clone().oneshot(builder.body(body)?).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body for {}", uri))?
        };

        Ok(TestResponse { status, headers, body })
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<TestResponse> {
        self.request(Method::GET, uri, token, None, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(Method::POST, uri, token, Some(body), None).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(Method::PATCH, uri, token, Some(body), None).await
    }

    /// Create a project owned by `owner` and return its id
    pub async fn project(&self, owner: &str, name: &str) -> Result<String> {
        let token = self.token(owner);
        let res = self.post("/projects", Some(&token), serde_json::json!({ "name": name })).await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "project create failed: {}", res.body);
        res.data()["id"].as_str().map(str::to_string).context("project id")
    }

    pub async fn add_member(&self, project_id: &str, owner: &str, member: &str, role: &str) -> Result<TestResponse> {
        let token = self.token(owner);
        self.post(
            &format!("/projects/{}/members", project_id),
            Some(&token),
            serde_json::json!({ "id": member, "role": role }),
        )
        .await
    }
}
