use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::billing::events::StripeEvent;
use crate::billing::reconcile::{self, Outcome};
use crate::billing::signature::verify_signature;
use crate::errors::AppError;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// POST /api/v1/stripe/webhook
///
/// Authenticated by the Stripe signature, not a session token. Redelivered
/// events are acknowledged without being applied twice.
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("No Stripe signature found".to_string()))?;

    if let Err(e) = verify_signature(
        &body,
        signature,
        &state.config.stripe_webhook_secret,
        state.config.stripe_webhook_tolerance_secs,
        Utc::now().timestamp(),
    ) {
        warn!("Rejected Stripe webhook: {e}");
        return Err(AppError::Validation("Invalid webhook signature".to_string()));
    }

    let event = StripeEvent::parse(&body)?;
    let billing_event = event.classify()?;

    let Some(outcome) =
        reconcile::process(&state.db, &event.id, &event.event_type, &billing_event).await?
    else {
        info!("Stripe event {} already processed", event.id);
        return Ok(Json(json!({ "received": true })));
    };

    match &outcome {
        Outcome::UserNotFound => warn!(
            "Stripe event {} ({}) matched no user",
            event.id, event.event_type
        ),
        other => info!(
            "Stripe event {} ({}) applied: {other:?}",
            event.id, event.event_type
        ),
    }

    Ok(Json(json!({ "received": true })))
}
