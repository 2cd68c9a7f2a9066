use axum::extract::State;

use super::AppState;
use crate::api::{ApiResponse, ApiResult};
use crate::auth::BearerCredential;
use crate::models::{Project, UserProfile};

/// GET /me - identity only
pub async fn profile(State(state): State<AppState>, credential: BearerCredential) -> ApiResult<UserProfile> {
    let caller = state.gate.authenticate(credential.as_deref())?;
    Ok(ApiResponse::success(state.projects.profile(&caller.subject).await?))
}

/// GET /me/projects
pub async fn projects(State(state): State<AppState>, credential: BearerCredential) -> ApiResult<Vec<Project>> {
    let caller = state.gate.authenticate(credential.as_deref())?;
    Ok(ApiResponse::success(state.projects.list_for_subject(&caller.subject).await?))
}
