//! Typed view of the Stripe events consumed by subscription reconciliation.
//!
//! Only the fields we act on are captured; everything else in the payload is ignored.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use super::account::normalize_email;

/// Convert a Unix timestamp to NaiveDateTime
pub fn timestamp_to_naive(secs: i64) -> Option<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    CheckoutCompleted,
    SubscriptionUpdated,
    SubscriptionDeleted,
    Unrecognized,
}

impl EventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => EventKind::CheckoutCompleted,
            "customer.subscription.updated" => EventKind::SubscriptionUpdated,
            "customer.subscription.deleted" => EventKind::SubscriptionDeleted,
            _ => EventKind::Unrecognized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CheckoutCompleted => "checkout.session.completed",
            EventKind::SubscriptionUpdated => "customer.subscription.updated",
            EventKind::SubscriptionDeleted => "customer.subscription.deleted",
            EventKind::Unrecognized => "unrecognized",
        }
    }
}

// ============================================================================
// Event objects
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

impl CheckoutSession {
    /// Email the customer entered at checkout, falling back to the prefilled one.
    pub fn email(&self) -> Option<String> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.as_deref())
            .and_then(normalize_email)
            .or_else(|| self.customer_email.as_deref().and_then(normalize_email))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    pub status: String,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub items: Option<SubscriptionItems>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItems {
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub price: Option<Price>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub lookup_key: Option<String>,
}

impl SubscriptionObject {
    fn first_item(&self) -> Option<&SubscriptionItem> {
        self.items.as_ref().and_then(|items| items.data.first())
    }

    /// Period end from the subscription, or from its first item on newer API
    /// versions where the field moved there.
    pub fn period_end(&self) -> Option<NaiveDateTime> {
        self.current_period_end
            .or_else(|| self.first_item().and_then(|item| item.current_period_end))
            .and_then(timestamp_to_naive)
    }

    /// Human-facing plan label: price nickname, then lookup key, then price id.
    pub fn plan_label(&self) -> Option<String> {
        let price = self.first_item()?.price.as_ref()?;
        price
            .nickname
            .clone()
            .or_else(|| price.lookup_key.clone())
            .or_else(|| Some(price.id.clone()))
    }
}

// ============================================================================
// InboundEvent
// ============================================================================

#[derive(Debug, Clone)]
pub enum InboundEvent {
    CheckoutCompleted {
        event_id: String,
        session: CheckoutSession,
    },
    SubscriptionUpdated {
        event_id: String,
        subscription: SubscriptionObject,
    },
    SubscriptionDeleted {
        event_id: String,
        subscription: SubscriptionObject,
    },
    Unrecognized {
        event_id: String,
        event_type: String,
    },
}

impl InboundEvent {
    /// Narrows the envelope to a typed event. Fails only when a recognized
    /// event type carries an object of the wrong shape.
    pub fn from_envelope(envelope: EventEnvelope) -> Result<Self, serde_json::Error> {
        let event_id = envelope.id;
        let event = match EventKind::from_type(&envelope.event_type) {
            EventKind::CheckoutCompleted => InboundEvent::CheckoutCompleted {
                event_id,
                session: serde_json::from_value(envelope.data.object)?,
            },
            EventKind::SubscriptionUpdated => InboundEvent::SubscriptionUpdated {
                event_id,
                subscription: serde_json::from_value(envelope.data.object)?,
            },
            EventKind::SubscriptionDeleted => InboundEvent::SubscriptionDeleted {
                event_id,
                subscription: serde_json::from_value(envelope.data.object)?,
            },
            EventKind::Unrecognized => InboundEvent::Unrecognized {
                event_id,
                event_type: envelope.event_type,
            },
        };
        Ok(event)
    }

    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::CheckoutCompleted { .. } => EventKind::CheckoutCompleted,
            InboundEvent::SubscriptionUpdated { .. } => EventKind::SubscriptionUpdated,
            InboundEvent::SubscriptionDeleted { .. } => EventKind::SubscriptionDeleted,
            InboundEvent::Unrecognized { .. } => EventKind::Unrecognized,
        }
    }

    pub fn event_id(&self) -> &str {
        match self {
            InboundEvent::CheckoutCompleted { event_id, .. }
            | InboundEvent::SubscriptionUpdated { event_id, .. }
            | InboundEvent::SubscriptionDeleted { event_id, .. }
            | InboundEvent::Unrecognized { event_id, .. } => event_id,
        }
    }

    pub fn stripe_customer_id(&self) -> Option<&str> {
        match self {
            InboundEvent::CheckoutCompleted { session, .. } => session.customer.as_deref(),
            InboundEvent::SubscriptionUpdated { subscription, .. }
            | InboundEvent::SubscriptionDeleted { subscription, .. } => {
                subscription.customer.as_deref()
            }
            InboundEvent::Unrecognized { .. } => None,
        }
    }

    pub fn stripe_subscription_id(&self) -> Option<&str> {
        match self {
            InboundEvent::CheckoutCompleted { session, .. } => session.subscription.as_deref(),
            InboundEvent::SubscriptionUpdated { subscription, .. }
            | InboundEvent::SubscriptionDeleted { subscription, .. } => Some(&subscription.id),
            InboundEvent::Unrecognized { .. } => None,
        }
    }
}
