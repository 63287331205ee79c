use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentIdentity;
use crate::errors::AppError;
use crate::models::project::Project;
use crate::models::user::UserSummary;
use crate::projects::access::{check_buddy_candidate, require_member, require_owner};
use crate::projects::repo;
use crate::state::AppState;
use crate::users::{self, require_user};
use crate::validation::{validate_email, validate_project_name};

#[derive(Debug, Deserialize)]
pub struct ProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteBuddyRequest {
    pub buddy_email: String,
}

#[derive(Debug, Serialize)]
pub struct InviteBuddyResponse {
    pub success: bool,
    pub project: Project,
    pub buddy: UserSummary,
}

/// GET /api/v1/projects
pub async fn handle_list(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<Project>>, AppError> {
    let user = require_user(&state.db, &identity).await?;
    Ok(Json(repo::list_owned(&state.db, user.id).await?))
}

/// GET /api/v1/projects/buddy
pub async fn handle_list_buddy(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<Project>>, AppError> {
    let user = require_user(&state.db, &identity).await?;
    Ok(Json(repo::list_buddy(&state.db, user.id).await?))
}

/// GET /api/v1/projects/:id
pub async fn handle_get(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    let user = require_user(&state.db, &identity).await?;
    let project = repo::require(&state.db, id).await?;
    require_member(&project, &user)?;
    Ok(Json(project))
}

/// POST /api/v1/projects
pub async fn handle_create(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Json(req): Json<ProjectRequest>,
) -> Result<(StatusCode, Json<Project>), AppError> {
    let user = require_user(&state.db, &identity).await?;
    let name = validate_project_name(&req.name)?;
    let project = repo::create(
        &state.db,
        user.id,
        &name,
        req.description.trim(),
        state.config.free_project_limit,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// PUT /api/v1/projects/:id
pub async fn handle_update(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<Uuid>,
    Json(req): Json<ProjectRequest>,
) -> Result<Json<Project>, AppError> {
    let user = require_user(&state.db, &identity).await?;
    let project = repo::require(&state.db, id).await?;
    require_owner(&project, &user, "Only project owner can edit this project")?;
    let name = validate_project_name(&req.name)?;
    let updated = repo::update(&state.db, id, &name, req.description.trim()).await?;
    info!("Updated project {id}");
    Ok(Json(updated))
}

/// DELETE /api/v1/projects/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let user = require_user(&state.db, &identity).await?;
    let project = repo::require(&state.db, id).await?;
    require_owner(&project, &user, "Only project owner can delete this project")?;
    repo::delete(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/projects/:id/buddy
pub async fn handle_invite_buddy(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<Uuid>,
    Json(req): Json<InviteBuddyRequest>,
) -> Result<Json<InviteBuddyResponse>, AppError> {
    let user = require_user(&state.db, &identity).await?;
    let project = repo::require(&state.db, id).await?;
    require_owner(&project, &user, "Only project owner can invite buddies")?;

    let email = validate_email(&req.buddy_email)?;
    let buddy = users::resolve_email(&state.db, &email)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(
                "User with this email not found. They need to sign up first.".to_string(),
            )
        })?;
    check_buddy_candidate(&project, buddy.id)?;

    let project = repo::set_buddy(&state.db, id, Some(buddy.id)).await?;
    info!("User {} is now buddy on project {id}", buddy.id);

    Ok(Json(InviteBuddyResponse {
        success: true,
        project,
        buddy,
    }))
}

/// DELETE /api/v1/projects/:id/buddy
pub async fn handle_remove_buddy(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    let user = require_user(&state.db, &identity).await?;
    let project = repo::require(&state.db, id).await?;
    require_owner(&project, &user, "Only project owner can remove buddy")?;
    let project = repo::set_buddy(&state.db, id, None).await?;
    info!("Removed buddy from project {id}");
    Ok(Json(project))
}
