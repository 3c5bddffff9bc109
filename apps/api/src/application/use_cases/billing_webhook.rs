use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::ports::payment_provider::{EventVerifier, SubscriptionSource},
    domain::entities::{
        account::Account,
        inbound_event::{CheckoutSession, InboundEvent, SubscriptionObject},
        subscription::{Subscription, SubscriptionStatus},
    },
};

// ============================================================================
// Repository traits
// ============================================================================

#[async_trait]
pub trait AccountRepo: Send + Sync {
    /// Returns `AppError::DuplicateAccount` if the email matches more than one row.
    async fn get_by_email(&self, email: &str) -> AppResult<Option<Account>>;

    /// Insert-or-return keyed by email. Concurrent calls for the same email
    /// must resolve to the same row.
    async fn find_or_create_by_email(&self, email: &str) -> AppResult<Account>;
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// Last-write-wins upsert keyed by account.
    async fn upsert_for_account(&self, input: &UpsertSubscriptionInput) -> AppResult<Subscription>;

    async fn update_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        update: &SubscriptionUpdate,
    ) -> AppResult<Option<Subscription>>;

    /// Updates the row for `stripe_customer_id` that has no provider
    /// subscription id yet. Rows bound to a subscription never match.
    /// At most one row is updated.
    async fn update_unbound_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
        update: &SubscriptionUpdate,
    ) -> AppResult<Option<Subscription>>;
}

// ============================================================================
// Inputs and outcomes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertSubscriptionInput {
    pub account_id: Uuid,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: String,
    pub plan: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<NaiveDateTime>,
    pub cancel_at_period_end: bool,
}

/// Changes carried by `customer.subscription.*` events. `None` fields keep
/// the stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub plan: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<NaiveDateTime>,
    pub cancel_at_period_end: bool,
}

impl SubscriptionUpdate {
    fn from_object(subscription: &SubscriptionObject, status: SubscriptionStatus) -> Self {
        Self {
            stripe_subscription_id: subscription.id.clone(),
            stripe_customer_id: subscription.customer.clone(),
            plan: subscription.plan_label(),
            status,
            current_period_end: subscription.period_end(),
            cancel_at_period_end: subscription.cancel_at_period_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingEmail,
    NoSubscription,
    UnknownSubscription,
    UnhandledEventType,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingEmail => "missing_email",
            SkipReason::NoSubscription => "no_subscription",
            SkipReason::UnknownSubscription => "unknown_subscription",
            SkipReason::UnhandledEventType => "unhandled_event_type",
        }
    }
}

/// What happened to an authenticated event. All three are acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Reconciled {
        account_id: Uuid,
        status: SubscriptionStatus,
    },
    Skipped(SkipReason),
    Failed,
}

// ============================================================================
// Use cases
// ============================================================================

#[derive(Clone)]
pub struct BillingWebhookUseCases {
    verifier: Arc<dyn EventVerifier>,
    accounts: Arc<dyn AccountRepo>,
    subscriptions: Arc<dyn SubscriptionRepo>,
    subscription_source: Option<Arc<dyn SubscriptionSource>>,
}

impl BillingWebhookUseCases {
    pub fn new(
        verifier: Arc<dyn EventVerifier>,
        accounts: Arc<dyn AccountRepo>,
        subscriptions: Arc<dyn SubscriptionRepo>,
        subscription_source: Option<Arc<dyn SubscriptionSource>>,
    ) -> Self {
        Self {
            verifier,
            accounts,
            subscriptions,
            subscription_source,
        }
    }

    /// Verify and apply one webhook delivery.
    ///
    /// Only verification failures are returned as errors. Once the event is
    /// trusted, processing failures are logged and reported as
    /// `WebhookOutcome::Failed` so the sender still gets an acknowledgement.
    #[instrument(skip_all, fields(payload_len = payload.len()))]
    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        let event = self.verifier.verify(payload, signature_header)?;

        let kind = event.kind();
        let event_id = event.event_id().to_string();
        let customer_id = event.stripe_customer_id().map(str::to_string);
        let subscription_id = event.stripe_subscription_id().map(str::to_string);

        let result = match event {
            InboundEvent::CheckoutCompleted { event_id, session } => {
                self.apply_checkout_completed(&event_id, session).await
            }
            InboundEvent::SubscriptionUpdated {
                event_id,
                subscription,
            } => {
                let status = SubscriptionStatus::from_stripe(&subscription.status);
                self.apply_subscription_change(&event_id, &subscription, status)
                    .await
            }
            InboundEvent::SubscriptionDeleted {
                event_id,
                subscription,
            } => {
                self.apply_subscription_change(
                    &event_id,
                    &subscription,
                    SubscriptionStatus::Canceled,
                )
                .await
            }
            InboundEvent::Unrecognized {
                event_id,
                event_type,
            } => {
                debug!(%event_id, %event_type, "Unhandled webhook event type");
                Ok(WebhookOutcome::Skipped(SkipReason::UnhandledEventType))
            }
        };

        match result {
            Ok(outcome) => {
                info!(
                    event_type = kind.as_str(),
                    %event_id,
                    outcome = ?outcome,
                    "Webhook processed"
                );
                Ok(outcome)
            }
            Err(err) => {
                error!(
                    error = %err,
                    event_type = kind.as_str(),
                    %event_id,
                    stripe_customer_id = customer_id.as_deref().unwrap_or(""),
                    stripe_subscription_id = subscription_id.as_deref().unwrap_or(""),
                    "Webhook processing failed, acknowledging anyway; replay manually"
                );
                Ok(WebhookOutcome::Failed)
            }
        }
    }

    async fn apply_checkout_completed(
        &self,
        event_id: &str,
        session: CheckoutSession,
    ) -> AppResult<WebhookOutcome> {
        let Some(email) = session.email() else {
            debug!(
                event_id,
                session_id = %session.id,
                "checkout.session.completed without email, nothing to reconcile"
            );
            return Ok(WebhookOutcome::Skipped(SkipReason::MissingEmail));
        };

        let Some(stripe_subscription_id) = session.subscription.clone() else {
            // One-time payment
            debug!(
                event_id,
                session_id = %session.id,
                "checkout.session.completed without subscription"
            );
            return Ok(WebhookOutcome::Skipped(SkipReason::NoSubscription));
        };

        let details = self
            .fetch_subscription_details(event_id, &stripe_subscription_id)
            .await;

        // The fetched object is authoritative; a redelivered checkout must not
        // revive a subscription that has since ended.
        let status = match &details {
            Some(d) => SubscriptionStatus::from_stripe(&d.status),
            None => SubscriptionStatus::Active,
        };

        let account = self.resolve_account(&email).await?;

        let input = UpsertSubscriptionInput {
            account_id: account.id,
            stripe_customer_id: session
                .customer
                .clone()
                .or_else(|| details.as_ref().and_then(|d| d.customer.clone())),
            stripe_subscription_id,
            plan: details.as_ref().and_then(SubscriptionObject::plan_label),
            status,
            current_period_end: details.as_ref().and_then(SubscriptionObject::period_end),
            cancel_at_period_end: details.as_ref().is_some_and(|d| d.cancel_at_period_end),
        };

        let subscription = self.subscriptions.upsert_for_account(&input).await?;

        Ok(WebhookOutcome::Reconciled {
            account_id: account.id,
            status: subscription.status,
        })
    }

    /// Resolved by provider subscription id; falls back to the provider
    /// customer id only for a row not yet bound to any subscription.
    async fn apply_subscription_change(
        &self,
        event_id: &str,
        subscription: &SubscriptionObject,
        status: SubscriptionStatus,
    ) -> AppResult<WebhookOutcome> {
        let update = SubscriptionUpdate::from_object(subscription, status);

        let mut updated = self
            .subscriptions
            .update_by_stripe_subscription_id(&subscription.id, &update)
            .await?;

        if updated.is_none() {
            if let Some(customer_id) = subscription.customer.as_deref() {
                updated = self
                    .subscriptions
                    .update_unbound_by_stripe_customer_id(customer_id, &update)
                    .await?;
            }
        }

        match updated {
            Some(row) => Ok(WebhookOutcome::Reconciled {
                account_id: row.account_id,
                status: row.status,
            }),
            None => {
                warn!(
                    event_id,
                    stripe_subscription_id = %subscription.id,
                    stripe_customer_id = subscription.customer.as_deref().unwrap_or(""),
                    "No subscription row for provider ids, skipping"
                );
                Ok(WebhookOutcome::Skipped(SkipReason::UnknownSubscription))
            }
        }
    }

    async fn resolve_account(&self, email: &str) -> AppResult<Account> {
        if let Some(account) = self.accounts.get_by_email(email).await? {
            return Ok(account);
        }
        let account = self.accounts.find_or_create_by_email(email).await?;
        info!(account_id = %account.id, "Account resolved for new subscriber");
        Ok(account)
    }

    /// The checkout session does not carry plan or period end; the
    /// subscription object does. Best effort.
    async fn fetch_subscription_details(
        &self,
        event_id: &str,
        stripe_subscription_id: &str,
    ) -> Option<SubscriptionObject> {
        let source = self.subscription_source.as_ref()?;
        match source.fetch_subscription(stripe_subscription_id).await {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                warn!(
                    error = %err,
                    event_id,
                    stripe_subscription_id,
                    "Could not fetch subscription details, writing row without plan and period end"
                );
                None
            }
        }
    }
}
