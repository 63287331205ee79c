use chrono::Utc;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::project::Project;
use crate::projects::access::check_project_limit;

pub async fn get(db: &PgPool, project_id: Uuid) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(db)
        .await
}

/// Loads a project or fails with 404.
pub async fn require(db: &PgPool, project_id: Uuid) -> Result<Project, AppError> {
    get(db, project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

pub async fn list_owned(db: &PgPool, owner_id: Uuid) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE owner_id = $1 ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(db)
    .await
}

pub async fn list_buddy(db: &PgPool, buddy_id: Uuid) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "SELECT * FROM projects WHERE buddy_id = $1 ORDER BY created_at DESC",
    )
    .bind(buddy_id)
    .fetch_all(db)
    .await
}

/// Inserts a project after checking the owner's free-tier allowance.
///
/// The owner row is locked for the duration of the transaction, so two
/// concurrent creates by the same free user cannot both pass the count check.
pub async fn create(
    db: &PgPool,
    owner_id: Uuid,
    name: &str,
    description: &str,
    free_project_limit: i64,
) -> Result<Project, AppError> {
    let mut tx = db.begin().await?;

    let premium: bool = sqlx::query_scalar("SELECT premium FROM users WHERE id = $1 FOR UPDATE")
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

    let owned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE owner_id = $1")
        .bind(owner_id)
        .fetch_one(&mut *tx)
        .await?;

    check_project_limit(premium, owned, free_project_limit)?;

    let project = sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects (id, owner_id, name, description, buddy_id, created_at)
        VALUES ($1, $2, $3, $4, NULL, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(name)
    .bind(description)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("Created project {} for user {owner_id}", project.id);
    Ok(project)
}

pub async fn update(
    db: &PgPool,
    project_id: Uuid,
    name: &str,
    description: &str,
) -> Result<Project, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "UPDATE projects SET name = $1, description = $2 WHERE id = $3 RETURNING *",
    )
    .bind(name)
    .bind(description)
    .bind(project_id)
    .fetch_one(db)
    .await
}

pub async fn set_buddy(
    db: &PgPool,
    project_id: Uuid,
    buddy_id: Option<Uuid>,
) -> Result<Project, sqlx::Error> {
    sqlx::query_as::<_, Project>("UPDATE projects SET buddy_id = $1 WHERE id = $2 RETURNING *")
        .bind(buddy_id)
        .bind(project_id)
        .fetch_one(db)
        .await
}

/// Deletes a project together with its action log. Returns the number of
/// actions removed.
pub async fn delete(db: &PgPool, project_id: Uuid) -> Result<u64, sqlx::Error> {
    let mut tx = db.begin().await?;

    let actions = sqlx::query("DELETE FROM actions WHERE project_id = $1")
        .bind(project_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(project_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!("Deleted project {project_id} and {actions} actions");
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::repo as actions;
    use crate::db::test_support;
    use crate::models::action::ActionType;

    // These tests need PostgreSQL and return early without one.

    #[tokio::test]
    async fn test_free_user_limited_to_one_project() {
        let Some(db) = test_support::pool().await else {
            return;
        };
        let owner = test_support::insert_user(&db, false, None).await;

        create(&db, owner.id, "First goal", "", 1).await.unwrap();
        let err = create(&db, owner.id, "Second goal", "", 1).await.unwrap_err();

        assert!(matches!(err, AppError::ProjectLimitReached(_)));
        assert_eq!(list_owned(&db, owner.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_respect_limit() {
        let Some(db) = test_support::pool().await else {
            return;
        };
        let owner = test_support::insert_user(&db, false, None).await;

        let (a, b) = tokio::join!(
            create(&db, owner.id, "Goal A", "", 1),
            create(&db, owner.id, "Goal B", "", 1),
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(list_owned(&db, owner.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_premium_user_is_not_limited() {
        let Some(db) = test_support::pool().await else {
            return;
        };
        let owner = test_support::insert_user(&db, true, None).await;

        for name in ["Goal one", "Goal two", "Goal three"] {
            create(&db, owner.id, name, "", 1).await.unwrap();
        }
        assert_eq!(list_owned(&db, owner.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_removes_actions() {
        let Some(db) = test_support::pool().await else {
            return;
        };
        let owner = test_support::insert_user(&db, false, None).await;
        let project = create(&db, owner.id, "Run a marathon", "", 1)
            .await
            .unwrap();
        for message in ["5k done", "10k done"] {
            let kind = ActionType::ProgressUpdate;
            actions::create(&db, project.id, owner.id, kind, message)
                .await
                .unwrap();
        }

        assert_eq!(delete(&db, project.id).await.unwrap(), 2);
        assert!(get(&db, project.id).await.unwrap().is_none());
        assert!(actions::list_for_project(&db, project.id)
            .await
            .unwrap()
            .is_empty());
    }
}
