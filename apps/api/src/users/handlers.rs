use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::auth::CurrentIdentity;
use crate::errors::AppError;
use crate::models::user::{User, UserSummary};
use crate::state::AppState;
use crate::users::{self, repo, require_user};
use crate::validation::validate_email;

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

/// GET /api/v1/users/me
pub async fn handle_current(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<User>, AppError> {
    Ok(Json(require_user(&state.db, &identity).await?))
}

/// POST /api/v1/users/me
pub async fn handle_get_or_create(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<User>, AppError> {
    Ok(Json(repo::get_or_create(&state.db, &identity).await?))
}

/// GET /api/v1/users/lookup?email=
pub async fn handle_find_by_email(
    State(state): State<AppState>,
    CurrentIdentity(_identity): CurrentIdentity,
    Query(params): Query<EmailQuery>,
) -> Result<Json<UserSummary>, AppError> {
    let email = validate_email(&params.email)?;
    users::resolve_email(&state.db, &email)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No user with email {email}")))
}
