use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};

use super::{expected_version, parse_body, parse_patch, AppState};
use crate::api::{ApiResponse, ApiResult};
use crate::auth::BearerCredential;
use crate::models::{ArchView, NewView};

/// POST /projects/:project_id/views
pub async fn create(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path(project_id): Path<String>,
    body: Bytes,
) -> ApiResult<ArchView> {
    state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.create_view)
        .await?;
    let new: NewView = parse_body(&body)?;

    let view = state.graph.create_view(&project_id, new).await?;
    Ok(ApiResponse::created_entity(view))
}

/// GET /projects/:project_id/views
pub async fn list(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path(project_id): Path<String>,
) -> ApiResult<Vec<ArchView>> {
    state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.read)
        .await?;

    Ok(ApiResponse::success(state.graph.list_views(&project_id).await?))
}

/// GET /projects/:project_id/views/:view_id
pub async fn show(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path((project_id, view_id)): Path<(String, String)>,
) -> ApiResult<ArchView> {
    state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.read)
        .await?;

    let view = state.graph.get_view(&project_id, &view_id).await?;
    Ok(ApiResponse::entity(view))
}

/// PATCH /projects/:project_id/views/:view_id - merge patch
pub async fn patch(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path((project_id, view_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ArchView> {
    state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.write)
        .await?;
    let patch = parse_patch(&body)?;
    let expected = expected_version(&headers)?;

    let view = state.graph.patch_view(&project_id, &view_id, &patch, expected).await?;
    Ok(ApiResponse::entity(view))
}
