use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::billing::events::BillingEvent;
use crate::errors::AppError;
use crate::models::user::User;
use crate::users::repo;

/// What applying a billing event did to the user table.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Upgraded(Uuid),
    AlreadyPremium(Uuid),
    Downgraded(Uuid),
    NotPremium(Uuid),
    LoggedFailure(Uuid),
    UserNotFound,
    Ignored,
}

/// The user-table operations billing reconciliation needs.
///
/// Implemented by `PgConnection` so a whole event applies inside one
/// transaction.
#[async_trait]
pub trait BillingStore: Send {
    async fn user_by_clerk_id(&mut self, clerk_id: &str) -> Result<Option<User>, sqlx::Error>;

    async fn user_by_customer(&mut self, customer_id: &str) -> Result<Option<User>, sqlx::Error>;

    async fn set_premium(&mut self, user_id: Uuid, premium: bool) -> Result<(), sqlx::Error>;

    /// Links `customer_id` to `user_id`; returns the user it was taken from, if any.
    async fn link_customer(
        &mut self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<Option<Uuid>, sqlx::Error>;
}

#[async_trait]
impl BillingStore for PgConnection {
    async fn user_by_clerk_id(&mut self, clerk_id: &str) -> Result<Option<User>, sqlx::Error> {
        repo::find_by_clerk_id(self, clerk_id).await
    }

    async fn user_by_customer(&mut self, customer_id: &str) -> Result<Option<User>, sqlx::Error> {
        repo::find_by_stripe_customer_id(self, customer_id).await
    }

    async fn set_premium(&mut self, user_id: Uuid, premium: bool) -> Result<(), sqlx::Error> {
        repo::set_premium(self, user_id, premium).await
    }

    async fn link_customer(
        &mut self,
        user_id: Uuid,
        customer_id: &str,
    ) -> Result<Option<Uuid>, sqlx::Error> {
        repo::link_stripe_customer(self, user_id, customer_id).await
    }
}

/// Records `event_id` and applies `event` in one transaction.
///
/// Returns `None` when the event id was already recorded; the event is then
/// acknowledged without touching any user. A failure rolls back both the
/// user changes and the record, so Stripe's retry applies the event afresh.
pub async fn process(
    db: &PgPool,
    event_id: &str,
    event_type: &str,
    event: &BillingEvent,
) -> Result<Option<Outcome>, AppError> {
    let mut tx = db.begin().await?;

    if !claim_event(&mut tx, event_id, event_type).await? {
        return Ok(None);
    }
    let outcome = apply(&mut *tx, event).await?;

    tx.commit().await?;
    Ok(Some(outcome))
}

/// Inserts the event id. False when it was already present; a concurrent
/// delivery of the same id waits here until the first one commits.
async fn claim_event(
    conn: &mut PgConnection,
    event_id: &str,
    event_type: &str,
) -> Result<bool, sqlx::Error> {
    let inserted = sqlx::query(
        "INSERT INTO stripe_events (event_id, event_type) VALUES ($1, $2) ON CONFLICT (event_id) DO NOTHING",
    )
    .bind(event_id)
    .bind(event_type)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(inserted == 1)
}

pub async fn apply<S>(store: &mut S, event: &BillingEvent) -> Result<Outcome, AppError>
where
    S: BillingStore + ?Sized,
{
    match event {
        BillingEvent::CheckoutCompleted {
            session_id,
            clerk_user_id,
            customer_id,
        } => {
            let Some(clerk_id) = clerk_user_id else {
                info!("Checkout {session_id} carries no userId; ignoring");
                return Ok(Outcome::Ignored);
            };

            if let Some(user) = store.user_by_clerk_id(clerk_id).await? {
                store.set_premium(user.id, true).await?;
                if let Some(customer_id) = customer_id {
                    store.link_customer(user.id, customer_id).await?;
                }
                info!("Checkout {session_id} upgraded user {}", user.id);
                return Ok(Outcome::Upgraded(user.id));
            }

            warn!("Checkout {session_id} names unknown clerk id {clerk_id}");
            match customer_id {
                Some(customer_id) => upgrade_customer(store, customer_id).await,
                None => Ok(Outcome::UserNotFound),
            }
        }

        BillingEvent::PaymentSucceeded { customer_id } => {
            upgrade_customer(store, customer_id).await
        }

        BillingEvent::PaymentFailed {
            customer_id,
            invoice_id,
        } => match store.user_by_customer(customer_id).await? {
            // Failed payments never downgrade; `customer.subscription.deleted` does.
            Some(user) => {
                warn!("Payment failed for user {}, invoice {invoice_id}", user.id);
                Ok(Outcome::LoggedFailure(user.id))
            }
            None => Ok(Outcome::UserNotFound),
        },

        BillingEvent::SubscriptionCanceled {
            customer_id,
            subscription_id,
        } => match store.user_by_customer(customer_id).await? {
            Some(user) if user.premium => {
                store.set_premium(user.id, false).await?;
                info!(
                    "Subscription {subscription_id} canceled; downgraded user {}",
                    user.id
                );
                Ok(Outcome::Downgraded(user.id))
            }
            Some(user) => Ok(Outcome::NotPremium(user.id)),
            None => Ok(Outcome::UserNotFound),
        },

        BillingEvent::Ignored { .. } => Ok(Outcome::Ignored),
    }
}

async fn upgrade_customer<S>(store: &mut S, customer_id: &str) -> Result<Outcome, AppError>
where
    S: BillingStore + ?Sized,
{
    match store.user_by_customer(customer_id).await? {
        Some(user) if user.premium => Ok(Outcome::AlreadyPremium(user.id)),
        Some(user) => {
            store.set_premium(user.id, true).await?;
            Ok(Outcome::Upgraded(user.id))
        }
        None => Ok(Outcome::UserNotFound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::db::test_support;

    /// In-memory user table.
    #[derive(Default)]
    struct MemoryStore {
        users: Vec<User>,
        fail_link: bool,
    }

    impl MemoryStore {
        fn add(&mut self, clerk_id: &str, premium: bool, customer: Option<&str>) -> Uuid {
            let user = User {
                id: Uuid::new_v4(),
                clerk_id: clerk_id.to_string(),
                email: format!("{clerk_id}@purple.test"),
                name: clerk_id.to_string(),
                premium,
                stripe_customer_id: customer.map(str::to_string),
                created_at: Utc::now(),
            };
            let id = user.id;
            self.users.push(user);
            id
        }

        fn user(&self, id: Uuid) -> &User {
            self.users.iter().find(|u| u.id == id).unwrap()
        }
    }

    #[async_trait]
    impl BillingStore for MemoryStore {
        async fn user_by_clerk_id(&mut self, clerk_id: &str) -> Result<Option<User>, sqlx::Error> {
            Ok(self.users.iter().find(|u| u.clerk_id == clerk_id).cloned())
        }

        async fn user_by_customer(
            &mut self,
            customer_id: &str,
        ) -> Result<Option<User>, sqlx::Error> {
            Ok(self
                .users
                .iter()
                .find(|u| u.stripe_customer_id.as_deref() == Some(customer_id))
                .cloned())
        }

        async fn set_premium(&mut self, user_id: Uuid, premium: bool) -> Result<(), sqlx::Error> {
            if let Some(user) = self.users.iter_mut().find(|u| u.id == user_id) {
                user.premium = premium;
            }
            Ok(())
        }

        async fn link_customer(
            &mut self,
            user_id: Uuid,
            customer_id: &str,
        ) -> Result<Option<Uuid>, sqlx::Error> {
            if self.fail_link {
                return Err(sqlx::Error::RowNotFound);
            }
            let mut previous = None;
            for user in &mut self.users {
                if user.id != user_id && user.stripe_customer_id.as_deref() == Some(customer_id) {
                    user.stripe_customer_id = None;
                    previous = Some(user.id);
                }
                if user.id == user_id {
                    user.stripe_customer_id = Some(customer_id.to_string());
                }
            }
            Ok(previous)
        }
    }

    fn checkout(clerk_id: Option<&str>, customer: Option<&str>) -> BillingEvent {
        BillingEvent::CheckoutCompleted {
            session_id: "cs_1".to_string(),
            clerk_user_id: clerk_id.map(str::to_string),
            customer_id: customer.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_checkout_upgrades_by_clerk_id_and_links_customer() {
        let mut store = MemoryStore::default();
        let id = store.add("user_a", false, None);

        let outcome = apply(&mut store, &checkout(Some("user_a"), Some("cus_1")))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Upgraded(id));
        assert!(store.user(id).premium);
        assert_eq!(store.user(id).stripe_customer_id.as_deref(), Some("cus_1"));
    }

    #[tokio::test]
    async fn test_checkout_without_user_id_is_ignored() {
        let mut store = MemoryStore::default();
        let id = store.add("user_a", false, Some("cus_1"));

        let outcome = apply(&mut store, &checkout(None, Some("cus_1")))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Ignored);
        assert!(!store.user(id).premium);
    }

    #[tokio::test]
    async fn test_checkout_with_unknown_user_id_falls_back_to_customer() {
        let mut store = MemoryStore::default();
        let id = store.add("user_a", false, Some("cus_1"));

        let outcome = apply(&mut store, &checkout(Some("user_gone"), Some("cus_1")))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Upgraded(id));
        assert!(store.user(id).premium);

        let outcome = apply(&mut store, &checkout(Some("user_gone"), None))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::UserNotFound);
    }

    #[tokio::test]
    async fn test_checkout_moves_customer_held_by_another_user() {
        let mut store = MemoryStore::default();
        let a = store.add("user_a", false, Some("cus_x"));
        let b = store.add("user_b", false, None);

        let outcome = apply(&mut store, &checkout(Some("user_b"), Some("cus_x")))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Upgraded(b));
        assert_eq!(store.user(a).stripe_customer_id, None);
        assert_eq!(store.user(b).stripe_customer_id.as_deref(), Some("cus_x"));

        let cancel = BillingEvent::SubscriptionCanceled {
            customer_id: "cus_x".to_string(),
            subscription_id: "sub_1".to_string(),
        };
        assert_eq!(
            apply(&mut store, &cancel).await.unwrap(),
            Outcome::Downgraded(b)
        );
        assert!(!store.user(b).premium);
    }

    #[tokio::test]
    async fn test_link_failure_surfaces_as_error() {
        let mut store = MemoryStore {
            fail_link: true,
            ..Default::default()
        };
        store.add("user_a", false, None);

        let result = apply(&mut store, &checkout(Some("user_a"), Some("cus_1"))).await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_payment_succeeded() {
        let mut store = MemoryStore::default();
        let free = store.add("user_a", false, Some("cus_1"));
        let paid = store.add("user_b", true, Some("cus_2"));

        let event = |c: &str| BillingEvent::PaymentSucceeded {
            customer_id: c.to_string(),
        };
        assert_eq!(
            apply(&mut store, &event("cus_1")).await.unwrap(),
            Outcome::Upgraded(free)
        );
        assert_eq!(
            apply(&mut store, &event("cus_2")).await.unwrap(),
            Outcome::AlreadyPremium(paid)
        );
        assert_eq!(
            apply(&mut store, &event("cus_none")).await.unwrap(),
            Outcome::UserNotFound
        );
    }

    #[tokio::test]
    async fn test_payment_failed_never_downgrades() {
        let mut store = MemoryStore::default();
        let id = store.add("user_a", true, Some("cus_1"));

        let event = BillingEvent::PaymentFailed {
            customer_id: "cus_1".to_string(),
            invoice_id: "in_1".to_string(),
        };
        assert_eq!(
            apply(&mut store, &event).await.unwrap(),
            Outcome::LoggedFailure(id)
        );
        assert!(store.user(id).premium);
    }

    #[tokio::test]
    async fn test_cancel_only_downgrades_premium_users() {
        let mut store = MemoryStore::default();
        let id = store.add("user_a", false, Some("cus_1"));

        let event = BillingEvent::SubscriptionCanceled {
            customer_id: "cus_1".to_string(),
            subscription_id: "sub_1".to_string(),
        };
        assert_eq!(
            apply(&mut store, &event).await.unwrap(),
            Outcome::NotPremium(id)
        );
    }

    #[tokio::test]
    async fn test_other_events_ignored() {
        let mut store = MemoryStore::default();
        let event = BillingEvent::Ignored {
            event_type: "customer.created".to_string(),
        };
        assert_eq!(apply(&mut store, &event).await.unwrap(), Outcome::Ignored);
    }

    // The tests below need PostgreSQL and return early without one.

    async fn reload(db: &PgPool, user: &User) -> User {
        repo::find_by_clerk_id(db, &user.clerk_id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_pg_checkout_moves_customer_atomically() {
        let Some(db) = test_support::pool().await else {
            return;
        };
        let customer = format!("cus_{}", Uuid::new_v4().simple());
        let a = test_support::insert_user(&db, false, Some(&customer)).await;
        let b = test_support::insert_user(&db, false, None).await;

        let event = checkout(Some(&b.clerk_id), Some(&customer));
        let event_id = format!("evt_{}", Uuid::new_v4());
        let outcome = process(&db, &event_id, "checkout.session.completed", &event)
            .await
            .unwrap();
        assert_eq!(outcome, Some(Outcome::Upgraded(b.id)));

        let a = reload(&db, &a).await;
        let b = reload(&db, &b).await;
        assert_eq!(a.stripe_customer_id, None);
        assert!(b.premium);
        assert_eq!(b.stripe_customer_id.as_deref(), Some(customer.as_str()));
    }

    #[tokio::test]
    async fn test_pg_redelivered_event_applies_once() {
        let Some(db) = test_support::pool().await else {
            return;
        };
        let customer = format!("cus_{}", Uuid::new_v4().simple());
        let user = test_support::insert_user(&db, true, Some(&customer)).await;
        let event_id = format!("evt_{}", Uuid::new_v4());
        let cancel = BillingEvent::SubscriptionCanceled {
            customer_id: customer.clone(),
            subscription_id: "sub_1".to_string(),
        };

        let first = process(&db, &event_id, "customer.subscription.deleted", &cancel)
            .await
            .unwrap();
        assert_eq!(first, Some(Outcome::Downgraded(user.id)));

        // Re-upgrade, then redeliver the cancel: it must not apply again.
        repo::set_premium(&db, user.id, true).await.unwrap();
        let second = process(&db, &event_id, "customer.subscription.deleted", &cancel)
            .await
            .unwrap();
        assert_eq!(second, None);

        let user = reload(&db, &user).await;
        assert!(user.premium);
    }

    #[tokio::test]
    async fn test_pg_rolled_back_event_leaves_no_trace() {
        let Some(db) = test_support::pool().await else {
            return;
        };
        let user = test_support::insert_user(&db, false, None).await;
        let event_id = format!("evt_{}", Uuid::new_v4());
        let customer = format!("cus_{}", Uuid::new_v4().simple());
        let event = checkout(Some(&user.clerk_id), Some(&customer));

        let mut tx = db.begin().await.unwrap();
        claim_event(&mut tx, &event_id, "checkout.session.completed")
            .await
            .unwrap();
        apply(&mut *tx, &event).await.unwrap();
        tx.rollback().await.unwrap();

        let user = reload(&db, &user).await;
        assert!(!user.premium);
        assert_eq!(user.stripe_customer_id, None);
        let recorded: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM stripe_events WHERE event_id = $1)")
                .bind(&event_id)
                .fetch_one(&db)
                .await
                .unwrap();
        assert!(!recorded);
    }
}
