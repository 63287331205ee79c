use sqlx::PgPool;

use crate::auth::ClerkVerifier;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Verifies Clerk session tokens for the `CurrentIdentity` extractor.
    pub auth: ClerkVerifier,
}
