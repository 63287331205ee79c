use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::errors::AppError;

/// The envelope Stripe posts to webhook endpoints.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    id: String,
    customer: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Invoice {
    id: Option<String>,
    customer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    id: String,
    customer: Option<String>,
}

/// The billing facts this service acts on, extracted from a Stripe event.
#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    /// `checkout.session.completed`; `clerk_user_id` comes from the session metadata
    /// that the checkout flow sets to the buyer's Clerk id.
    CheckoutCompleted {
        session_id: String,
        clerk_user_id: Option<String>,
        customer_id: Option<String>,
    },
    PaymentSucceeded {
        customer_id: String,
    },
    PaymentFailed {
        customer_id: String,
        invoice_id: String,
    },
    SubscriptionCanceled {
        customer_id: String,
        subscription_id: String,
    },
    /// Anything else, or a known type missing the fields needed to act on it.
    Ignored {
        event_type: String,
    },
}

impl StripeEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, AppError> {
        serde_json::from_slice(payload)
            .map_err(|e| AppError::Validation(format!("Malformed Stripe event: {e}")))
    }

    pub fn classify(&self) -> Result<BillingEvent, AppError> {
        let ignored = || BillingEvent::Ignored {
            event_type: self.event_type.clone(),
        };

        let event = match self.event_type.as_str() {
            "checkout.session.completed" => {
                let session: CheckoutSession = self.object()?;
                BillingEvent::CheckoutCompleted {
                    session_id: session.id,
                    clerk_user_id: session.metadata.get("userId").cloned(),
                    customer_id: session.customer,
                }
            }
            "invoice.payment_succeeded" => match self.object::<Invoice>()?.customer {
                Some(customer_id) => BillingEvent::PaymentSucceeded { customer_id },
                None => ignored(),
            },
            "invoice.payment_failed" => {
                let invoice: Invoice = self.object()?;
                match (invoice.customer, invoice.id) {
                    (Some(customer_id), Some(invoice_id)) => BillingEvent::PaymentFailed {
                        customer_id,
                        invoice_id,
                    },
                    _ => ignored(),
                }
            }
            "customer.subscription.deleted" => {
                let subscription: Subscription = self.object()?;
                match subscription.customer {
                    Some(customer_id) => BillingEvent::SubscriptionCanceled {
                        customer_id,
                        subscription_id: subscription.id,
                    },
                    None => ignored(),
                }
            }
            _ => ignored(),
        };
        Ok(event)
    }

    fn object<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| {
            AppError::Validation(format!(
                "Malformed '{}' object in event {}: {e}",
                self.event_type, self.id
            ))
        })
    }
}
