use axum::{
    body::Bytes,
    extract::{Path, State},
};

use super::{parse_body, AppState};
use crate::api::{ApiResponse, ApiResult};
use crate::auth::BearerCredential;
use crate::models::{NewMember, NewProject, Project};

/// POST /projects - any authenticated subject; the caller becomes the owner
pub async fn create(
    State(state): State<AppState>,
    credential: BearerCredential,
    body: Bytes,
) -> ApiResult<Project> {
    let caller = state.gate.authenticate(credential.as_deref())?;
    let new: NewProject = parse_body(&body)?;

    let project = state.projects.create_project(&caller.subject, new).await?;
    Ok(ApiResponse::created_entity(project))
}

/// GET /projects/:project_id
pub async fn show(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path(project_id): Path<String>,
) -> ApiResult<Project> {
    state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.read)
        .await?;

    let project = state.projects.get_project(&project_id).await?;
    Ok(ApiResponse::entity(project))
}

/// POST /projects/:project_id/members - owner only
pub async fn add_member(
    State(state): State<AppState>,
    credential: BearerCredential,
    Path(project_id): Path<String>,
    body: Bytes,
) -> ApiResult<Project> {
    let owner = state
        .gate
        .authorize(credential.as_deref(), &project_id, &state.policy.manage_members)
        .await?;
    let new: NewMember = parse_body(&body)?;

    tracing::debug!("'{}' adding '{}' to project '{}'", owner.id, new.id, project_id);
    let project = state.projects.add_member(&project_id, new).await?;
    Ok(ApiResponse::entity(project))
}
