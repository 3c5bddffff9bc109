use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

/// A billable newsletter reader, keyed externally by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub created_at: Option<NaiveDateTime>,
}

/// Canonical form of an email used as the account key.
///
/// Returns `None` for blank input.
pub fn normalize_email(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_lowercase())
}
