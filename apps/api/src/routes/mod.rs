pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::actions::handlers as actions;
use crate::analytics::handlers as analytics;
use crate::billing::handlers as billing;
use crate::projects::handlers as projects;
use crate::state::AppState;
use crate::users::handlers as users;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Users
        .route(
            "/api/v1/users/me",
            get(users::handle_current).post(users::handle_get_or_create),
        )
        .route("/api/v1/users/lookup", get(users::handle_find_by_email))
        // Projects
        .route(
            "/api/v1/projects",
            get(projects::handle_list).post(projects::handle_create),
        )
        .route("/api/v1/projects/buddy", get(projects::handle_list_buddy))
        .route(
            "/api/v1/projects/:id",
            get(projects::handle_get)
                .put(projects::handle_update)
                .delete(projects::handle_delete),
        )
        .route(
            "/api/v1/projects/:id/buddy",
            post(projects::handle_invite_buddy).delete(projects::handle_remove_buddy),
        )
        // Actions
        .route(
            "/api/v1/projects/:id/actions",
            get(actions::handle_list_by_project).post(actions::handle_create),
        )
        .route("/api/v1/actions/recent", get(actions::handle_recent))
        // Analytics
        .route(
            "/api/v1/projects/:id/analytics",
            get(analytics::handle_project_analytics),
        )
        .route("/api/v1/analytics/me", get(analytics::handle_user_analytics))
        // Billing
        .route("/api/v1/stripe/webhook", post(billing::handle_webhook))
        .with_state(state)
}
