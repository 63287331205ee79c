pub mod handlers;
pub mod repo;

use sqlx::PgPool;

use crate::auth::Identity;
use crate::errors::AppError;
use crate::models::user::{User, UserSummary};

/// Loads the user row for a verified identity. Callers that have never hit
/// `POST /api/v1/users/me` have no row yet.
pub async fn require_user(db: &PgPool, identity: &Identity) -> Result<User, AppError> {
    repo::find_by_clerk_id(db, &identity.clerk_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Resolves an email to a single account. `None` when nobody signed up with it;
/// 409 when several accounts share the address.
pub async fn resolve_email(db: &PgPool, email: &str) -> Result<Option<UserSummary>, AppError> {
    let mut matches = repo::find_by_email(db, email).await?;
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        _ => Err(AppError::Conflict(format!(
            "More than one account uses {email}"
        ))),
    }
}
