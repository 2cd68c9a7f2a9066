use axum::{
    body::Bytes,
    extract::{Path, State},
};

use super::{parse_body, AppState};
use crate::api::{ApiResponse, ApiResult};
use crate::auth::BearerCredential;
use crate::models::{Link, NewLink};

/// POST /projects/:project_id/links
pub async fn create(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path(project_id): Path<String>,
    body: Bytes,
) -> ApiResult<Link> {
    state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.write)
        .await?;
    let new: NewLink = parse_body(&body)?;

    let link = state.graph.create_link(&project_id, new).await?;
    Ok(ApiResponse::created_entity(link))
}

/// GET /projects/:project_id/links
pub async fn list(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path(project_id): Path<String>,
) -> ApiResult<Vec<Link>> {
    state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.read)
        .await?;

    Ok(ApiResponse::success(state.graph.list_links(&project_id).await?))
}

/// GET /projects/:project_id/links/:link_id
pub async fn show(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path((project_id, link_id)): Path<(String, String)>,
) -> ApiResult<Link> {
    state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.read)
        .await?;

    Ok(ApiResponse::entity(state.graph.get_link(&project_id, &link_id).await?))
}
