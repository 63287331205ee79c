use chrono::Utc;
use sqlx::{PgConnection, PgExecutor, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Identity;
use crate::models::user::{User, UserSummary};

pub async fn find_by_clerk_id<'e, E: PgExecutor<'e>>(
    db: E,
    clerk_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE clerk_id = $1")
        .bind(clerk_id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_stripe_customer_id<'e, E: PgExecutor<'e>>(
    db: E,
    stripe_customer_id: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE stripe_customer_id = $1")
        .bind(stripe_customer_id)
        .fetch_optional(db)
        .await
}

/// Case-insensitive email lookup. Emails are not unique, so every match is returned
/// and the caller decides what an ambiguous result means.
pub async fn find_by_email(db: &PgPool, email: &str) -> Result<Vec<UserSummary>, sqlx::Error> {
    sqlx::query_as::<_, UserSummary>(
        "SELECT id, name, email FROM users WHERE LOWER(email) = LOWER($1) ORDER BY created_at ASC LIMIT 2",
    )
    .bind(email.trim())
    .fetch_all(db)
    .await
}

/// Returns the user row for `identity`, inserting it on first sight.
pub async fn get_or_create(db: &PgPool, identity: &Identity) -> Result<User, sqlx::Error> {
    // ON CONFLICT covers two first requests for the same identity racing each other.
    let inserted = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (id, clerk_id, email, name, premium, created_at)
        VALUES ($1, $2, $3, $4, FALSE, $5)
        ON CONFLICT (clerk_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&identity.clerk_id)
    .bind(&identity.email)
    .bind(&identity.name)
    .bind(Utc::now())
    .fetch_optional(db)
    .await?;

    match inserted {
        Some(user) => {
            info!("Created user {} for clerk id {}", user.id, user.clerk_id);
            Ok(user)
        }
        None => sqlx::query_as::<_, User>("SELECT * FROM users WHERE clerk_id = $1")
            .bind(&identity.clerk_id)
            .fetch_one(db)
            .await,
    }
}

pub async fn set_premium<'e, E: PgExecutor<'e>>(
    db: E,
    user_id: Uuid,
    premium: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET premium = $1 WHERE id = $2")
        .bind(premium)
        .bind(user_id)
        .execute(db)
        .await?;
    info!("Set premium={premium} for user {user_id}");
    Ok(())
}

/// Stores `stripe_customer_id` on `user_id`. A customer id belongs to one user
/// at a time; any other row holding it is unlinked first and its id returned.
pub async fn link_stripe_customer(
    conn: &mut PgConnection,
    user_id: Uuid,
    stripe_customer_id: &str,
) -> Result<Option<Uuid>, sqlx::Error> {
    let previous: Option<Uuid> = sqlx::query_scalar(
        "UPDATE users SET stripe_customer_id = NULL WHERE stripe_customer_id = $1 AND id <> $2 RETURNING id",
    )
    .bind(stripe_customer_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    sqlx::query("UPDATE users SET stripe_customer_id = $1 WHERE id = $2")
        .bind(stripe_customer_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    if let Some(previous) = previous {
        warn!(
            "Moved Stripe customer {stripe_customer_id} from user {previous} to user {user_id}"
        );
    }
    Ok(previous)
}
