use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::models::action::{Action, ActionType, ActionWithAuthor, ActionWithDetails};
use crate::models::project::ProjectSummary;
use crate::models::user::UserSummary;

/// How many entries the activity feed returns.
pub const RECENT_ACTIONS_LIMIT: i64 = 10;

#[derive(FromRow)]
struct ActionJoinRow {
    id: Uuid,
    project_id: Uuid,
    user_id: Uuid,
    action_type: ActionType,
    message: String,
    created_at: DateTime<Utc>,
    author_name: String,
    author_email: String,
    project_name: Option<String>,
}

impl ActionJoinRow {
    fn split(self) -> (Action, UserSummary, Option<String>) {
        let author = UserSummary {
            id: self.user_id,
            name: self.author_name,
            email: self.author_email,
        };
        let action = Action {
            id: self.id,
            project_id: self.project_id,
            user_id: self.user_id,
            action_type: self.action_type,
            message: self.message,
            created_at: self.created_at,
        };
        (action, author, self.project_name)
    }
}

pub async fn create(
    db: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
    action_type: ActionType,
    message: &str,
) -> Result<Action, sqlx::Error> {
    let action = sqlx::query_as::<_, Action>(
        r#"
        INSERT INTO actions (id, project_id, user_id, action_type, message, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(user_id)
    .bind(action_type)
    .bind(message)
    .bind(Utc::now())
    .fetch_one(db)
    .await?;

    info!(
        "User {user_id} logged {} on project {project_id}",
        action_type.as_str()
    );
    Ok(action)
}

/// Every action on a project, unordered. Used by analytics.
pub async fn list_for_project(db: &PgPool, project_id: Uuid) -> Result<Vec<Action>, sqlx::Error> {
    sqlx::query_as::<_, Action>("SELECT * FROM actions WHERE project_id = $1")
        .bind(project_id)
        .fetch_all(db)
        .await
}

/// Every action on projects owned by `owner_id`. Used by analytics.
pub async fn list_for_owner(db: &PgPool, owner_id: Uuid) -> Result<Vec<Action>, sqlx::Error> {
    sqlx::query_as::<_, Action>(
        r#"
        SELECT a.*
        FROM actions a
        JOIN projects p ON p.id = a.project_id
        WHERE p.owner_id = $1
        "#,
    )
    .bind(owner_id)
    .fetch_all(db)
    .await
}

/// A project's log with each entry's author, newest first.
pub async fn list_with_authors(
    db: &PgPool,
    project_id: Uuid,
) -> Result<Vec<ActionWithAuthor>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ActionJoinRow>(
        r#"
        SELECT a.id, a.project_id, a.user_id, a.action_type, a.message, a.created_at,
               u.name AS author_name, u.email AS author_email,
               NULL::TEXT AS project_name
        FROM actions a
        JOIN users u ON u.id = a.user_id
        WHERE a.project_id = $1
        ORDER BY a.created_at DESC
        "#,
    )
    .bind(project_id)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let (action, user, _) = row.split();
            ActionWithAuthor { action, user }
        })
        .collect())
}

/// The latest actions across every project `user_id` owns or buddies.
pub async fn recent_for_member(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<ActionWithDetails>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ActionJoinRow>(
        r#"
        SELECT a.id, a.project_id, a.user_id, a.action_type, a.message, a.created_at,
               u.name AS author_name, u.email AS author_email,
               p.name AS project_name
        FROM actions a
        JOIN projects p ON p.id = a.project_id
        JOIN users u ON u.id = a.user_id
        WHERE p.owner_id = $1 OR p.buddy_id = $1
        ORDER BY a.created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let (action, user, project_name) = row.split();
            let project = ProjectSummary {
                id: action.project_id,
                name: project_name.unwrap_or_default(),
            };
            ActionWithDetails {
                action,
                user,
                project,
            }
        })
        .collect())
}
