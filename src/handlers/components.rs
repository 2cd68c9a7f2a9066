use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};

use super::{expected_version, parse_body, parse_patch, AppState};
use crate::api::{ApiResponse, ApiResult};
use crate::auth::BearerCredential;
use crate::models::{ArchViewComponent, NewComponent};

/// POST /projects/:project_id/views/:view_id/components
pub async fn create(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path((project_id, view_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<ArchViewComponent> {
    state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.write)
        .await?;
    let new: NewComponent = parse_body(&body)?;

    let component = state.graph.add_component(&project_id, &view_id, new).await?;
    Ok(ApiResponse::created_entity(component))
}

/// GET /projects/:project_id/views/:view_id/components/:component_id
pub async fn show(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path((project_id, view_id, component_id)): Path<(String, String, String)>,
) -> ApiResult<ArchViewComponent> {
    state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.read)
        .await?;

    let component = state.graph.get_component(&project_id, &view_id, &component_id).await?;
    Ok(ApiResponse::entity(component))
}

/// PATCH /projects/:project_id/views/:view_id/components/:component_id
pub async fn patch(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path((project_id, view_id, component_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<ArchViewComponent> {
    state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.write)
        .await?;
    let patch = parse_patch(&body)?;
    let expected = expected_version(&headers)?;

    let component = state
        .graph
        .patch_component(&project_id, &view_id, &component_id, &patch, expected)
        .await?;
    Ok(ApiResponse::entity(component))
}
