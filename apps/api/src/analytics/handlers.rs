use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::actions;
use crate::analytics::compute::{
    compute_project_analytics, compute_user_analytics, ProjectAnalytics, UserAnalytics,
};
use crate::auth::CurrentIdentity;
use crate::errors::AppError;
use crate::projects::{self, access};
use crate::state::AppState;
use crate::users::require_user;

/// GET /api/v1/projects/:id/analytics
pub async fn handle_project_analytics(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectAnalytics>, AppError> {
    let user = require_user(&state.db, &identity).await?;
    let project = projects::repo::require(&state.db, id).await?;
    access::require_member(&project, &user)?;

    let actions = actions::repo::list_for_project(&state.db, id).await?;
    Ok(Json(compute_project_analytics(&project, &actions, Utc::now())))
}

/// GET /api/v1/analytics/me
pub async fn handle_user_analytics(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<UserAnalytics>, AppError> {
    let user = require_user(&state.db, &identity).await?;
    let projects = projects::repo::list_owned(&state.db, user.id).await?;
    let actions = actions::repo::list_for_owner(&state.db, user.id).await?;
    Ok(Json(compute_user_analytics(&projects, &actions)))
}
