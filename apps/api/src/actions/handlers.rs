use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::actions::repo;
use crate::auth::CurrentIdentity;
use crate::errors::AppError;
use crate::models::action::{Action, ActionType, ActionWithAuthor, ActionWithDetails};
use crate::projects::{self, access};
use crate::state::AppState;
use crate::users::require_user;
use crate::validation::validate_action_message;

#[derive(Debug, Deserialize)]
pub struct CreateActionRequest {
    #[serde(rename = "type")]
    pub action_type: String,
    pub message: String,
}

/// GET /api/v1/projects/:id/actions
pub async fn handle_list_by_project(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ActionWithAuthor>>, AppError> {
    let user = require_user(&state.db, &identity).await?;
    let project = projects::repo::require(&state.db, id).await?;
    access::require_member(&project, &user)?;
    Ok(Json(repo::list_with_authors(&state.db, id).await?))
}

/// POST /api/v1/projects/:id/actions
pub async fn handle_create(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateActionRequest>,
) -> Result<(StatusCode, Json<Action>), AppError> {
    let user = require_user(&state.db, &identity).await?;
    let project = projects::repo::require(&state.db, id).await?;
    access::require_member_to_write(
        &project,
        &user,
        "Only project owner or buddy can create actions",
    )?;

    let action_type = ActionType::parse(req.action_type.trim()).ok_or_else(|| {
        AppError::Validation(format!(
            "Unknown action type '{}'. Expected one of: {}",
            req.action_type,
            ActionType::ALL.map(|t| t.as_str()).join(", ")
        ))
    })?;
    let message = validate_action_message(&req.message)?;

    let action =
        repo::create(&state.db, project.id, user.id, action_type, &message).await?;
    Ok((StatusCode::CREATED, Json(action)))
}

/// GET /api/v1/actions/recent
pub async fn handle_recent(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<ActionWithDetails>>, AppError> {
    let user = require_user(&state.db, &identity).await?;
    Ok(Json(
        repo::recent_for_member(&state.db, user.id, repo::RECENT_ACTIONS_LIMIT).await?,
    ))
}
