use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderValue,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::handlers::{components, links, me, projects, views, AppState};

pub fn app(state: AppState, server: &ServerConfig) -> Router {
    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Identity only
        .merge(me_routes())
        // Project scoped
        .merge(project_routes())
        .merge(graph_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs)))
                .layer(DefaultBodyLimit::max(server.max_request_size_bytes)),
        );

    match cors_layer(server) {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(me::profile))
        .route("/me/projects", get(me::projects))
}

fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/projects", post(projects::create))
        .route("/projects/:project_id", get(projects::show))
        .route("/projects/:project_id/members", post(projects::add_member))
}

fn graph_routes() -> Router<AppState> {
    Router::new()
        .route("/projects/:project_id/views", get(views::list).post(views::create))
        .route("/projects/:project_id/views/:view_id", get(views::show).patch(views::patch))
        .route("/projects/:project_id/views/:view_id/components", post(components::create))
        .route(
            "/projects/:project_id/views/:view_id/components/:component_id",
            get(components::show).patch(components::patch),
        )
        .route("/projects/:project_id/links", get(links::list).post(links::create))
        .route("/projects/:project_id/links/:link_id", get(links::show))
}

fn cors_layer(server: &ServerConfig) -> Option<CorsLayer> {
    if !server.enable_cors {
        return None;
    }
    if server.cors_origins.iter().any(|origin| origin == "*") {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    Some(CorsLayer::permissive().allow_origin(AllowOrigin::list(origins)))
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Traceability API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Projects, architecture views and their components, with per-project roles",
            "endpoints": {
                "me": "/me, /me/projects (authenticated)",
                "projects": "/projects[/:projectID] (authenticated / member)",
                "members": "/projects/:projectID/members (owner)",
                "views": "/projects/:projectID/views[/:viewID] (member; creation by configured roles)",
                "components": "/projects/:projectID/views/:viewID/components[/:componentID] (member)",
                "links": "/projects/:projectID/links[/:linkID] (member)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.store.ping().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::service_unavailable("document store unavailable")
    })?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": chrono::Utc::now(),
            "store": "ok"
        }
    })))
}
