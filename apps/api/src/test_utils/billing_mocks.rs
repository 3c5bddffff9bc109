//! In-memory mock implementations for the reconciliation repositories and
//! the provider subscription source.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::payment_provider::SubscriptionSource,
        use_cases::billing_webhook::{
            AccountRepo, SubscriptionRepo, SubscriptionUpdate, UpsertSubscriptionInput,
        },
    },
    domain::entities::{
        account::Account,
        inbound_event::SubscriptionObject,
        subscription::{Subscription, SubscriptionStatus},
    },
};

fn now() -> Option<chrono::NaiveDateTime> {
    Some(chrono::Utc::now().naive_utc())
}

// ============================================================================
// InMemoryAccountRepo
// ============================================================================

/// Rows are kept in a `Vec` so tests can plant duplicate emails.
#[derive(Default)]
pub struct InMemoryAccountRepo {
    pub accounts: Mutex<Vec<Account>>,
    create_calls: AtomicUsize,
}

impl InMemoryAccountRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an account directly, bypassing the uniqueness the store enforces.
    pub fn insert(&self, email: &str) -> Account {
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: now(),
        };
        self.accounts.lock().unwrap().push(account.clone());
        account
    }

    pub fn get(&self, email: &str) -> Option<Account> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccountRepo for InMemoryAccountRepo {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        let found: Vec<Account> = self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.email.eq_ignore_ascii_case(email))
            .take(2)
            .cloned()
            .collect();

        // Lets a concurrent caller run between this lookup and whatever the
        // caller does next, like a round trip to the database would.
        tokio::task::yield_now().await;

        match found.as_slice() {
            [] => Ok(None),
            [account] => Ok(Some(account.clone())),
            _ => Err(AppError::DuplicateAccount {
                email: email.to_string(),
            }),
        }
    }

    async fn find_or_create_by_email(&self, email: &str) -> AppResult<Account> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut accounts = self.accounts.lock().unwrap();
        if let Some(existing) = accounts.iter().find(|a| a.email == email) {
            return Ok(existing.clone());
        }
        let account = Account {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: now(),
        };
        accounts.push(account.clone());
        Ok(account)
    }
}

// ============================================================================
// InMemorySubscriptionRepo
// ============================================================================

#[derive(Default)]
pub struct InMemorySubscriptionRepo {
    pub subscriptions: Mutex<HashMap<Uuid, Subscription>>,
    fail_writes: AtomicBool,
}

impl InMemorySubscriptionRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly.
    pub fn seed(
        &self,
        account_id: Uuid,
        stripe_customer_id: &str,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Subscription {
        let subscription = Subscription {
            account_id,
            stripe_customer_id: Some(stripe_customer_id.to_string()),
            stripe_subscription_id: Some(stripe_subscription_id.to_string()),
            plan: None,
            status,
            current_period_end: None,
            cancel_at_period_end: false,
            created_at: now(),
            updated_at: now(),
        };
        self.subscriptions
            .lock()
            .unwrap()
            .insert(account_id, subscription.clone());
        subscription
    }

    /// Insert a row that knows its customer but not yet its subscription.
    pub fn seed_unbound(
        &self,
        account_id: Uuid,
        stripe_customer_id: &str,
        status: SubscriptionStatus,
    ) -> Subscription {
        let mut subscription = self.seed(account_id, stripe_customer_id, "", status);
        subscription.stripe_subscription_id = None;
        self.subscriptions
            .lock()
            .unwrap()
            .insert(account_id, subscription.clone());
        subscription
    }

    /// Make every write fail with `AppError::Database`.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, account_id: Uuid) -> Option<Subscription> {
        self.subscriptions.lock().unwrap().get(&account_id).cloned()
    }

    pub fn count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    pub fn snapshot(&self) -> Vec<Subscription> {
        self.subscriptions.lock().unwrap().values().cloned().collect()
    }

    /// Rows with timestamps cleared and a stable order, for state comparisons.
    pub fn comparable(rows: &[Subscription]) -> Vec<Subscription> {
        let mut rows: Vec<Subscription> = rows
            .iter()
            .cloned()
            .map(|mut s| {
                s.created_at = None;
                s.updated_at = None;
                s
            })
            .collect();
        rows.sort_by_key(|s| s.account_id);
        rows
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("Database operation failed".into()));
        }
        Ok(())
    }

    fn update_where(
        &self,
        matches: impl Fn(&Subscription) -> bool,
        update: &SubscriptionUpdate,
    ) -> AppResult<Option<Subscription>> {
        self.check_writable()?;
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let Some(row) = subscriptions.values_mut().find(|s| matches(s)) else {
            return Ok(None);
        };
        row.stripe_subscription_id = Some(update.stripe_subscription_id.clone());
        if let Some(customer) = &update.stripe_customer_id {
            row.stripe_customer_id = Some(customer.clone());
        }
        if let Some(plan) = &update.plan {
            row.plan = Some(plan.clone());
        }
        row.status = update.status;
        if update.current_period_end.is_some() {
            row.current_period_end = update.current_period_end;
        }
        row.cancel_at_period_end = update.cancel_at_period_end;
        row.updated_at = now();
        Ok(Some(row.clone()))
    }
}

#[async_trait]
impl SubscriptionRepo for InMemorySubscriptionRepo {
    async fn upsert_for_account(&self, input: &UpsertSubscriptionInput) -> AppResult<Subscription> {
        self.check_writable()?;
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let created_at = subscriptions
            .get(&input.account_id)
            .and_then(|s| s.created_at)
            .or_else(now);
        let subscription = Subscription {
            account_id: input.account_id,
            stripe_customer_id: input.stripe_customer_id.clone(),
            stripe_subscription_id: Some(input.stripe_subscription_id.clone()),
            plan: input.plan.clone(),
            status: input.status,
            current_period_end: input.current_period_end,
            cancel_at_period_end: input.cancel_at_period_end,
            created_at,
            updated_at: now(),
        };
        subscriptions.insert(input.account_id, subscription.clone());
        Ok(subscription)
    }

    async fn update_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
        update: &SubscriptionUpdate,
    ) -> AppResult<Option<Subscription>> {
        self.update_where(
            |s| s.stripe_subscription_id.as_deref() == Some(stripe_subscription_id),
            update,
        )
    }

    async fn update_unbound_by_stripe_customer_id(
        &self,
        stripe_customer_id: &str,
        update: &SubscriptionUpdate,
    ) -> AppResult<Option<Subscription>> {
        self.update_where(
            |s| {
                s.stripe_subscription_id.is_none()
                    && s.stripe_customer_id.as_deref() == Some(stripe_customer_id)
            },
            update,
        )
    }
}

// ============================================================================
// StubSubscriptionSource
// ============================================================================

pub struct StubSubscriptionSource {
    subscription: Option<SubscriptionObject>,
    calls: AtomicUsize,
}

impl StubSubscriptionSource {
    pub fn with_subscription(subscription: SubscriptionObject) -> Self {
        Self {
            subscription: Some(subscription),
            calls: AtomicUsize::new(0),
        }
    }

    /// Every lookup fails with `AppError::Provider`.
    pub fn failing() -> Self {
        Self {
            subscription: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionSource for StubSubscriptionSource {
    async fn fetch_subscription(&self, subscription_id: &str) -> AppResult<SubscriptionObject> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.subscription.clone().ok_or_else(|| {
            AppError::Provider(format!("No such subscription: '{}'", subscription_id))
        })
    }
}
