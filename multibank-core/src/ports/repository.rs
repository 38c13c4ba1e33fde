//! Repository ports - persistence abstraction
//!
//! The core depends only on these traits; SQL schema and query text belong
//! to the adapter side. All writes are upsert-style, last-write-wins.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::result::Result;
use crate::domain::{
    AccountConsent, Bank, BankToken, ConsentUpdate, RecommendationKey, RecommendationRule,
};

/// Read-only lookup of configured banks
#[async_trait]
pub trait BankDirectory: Send + Sync {
    /// All banks with the enabled flag set
    async fn list_enabled(&self) -> Result<Vec<Bank>>;

    /// Bank by internal id, NotFound if absent
    async fn get_by_id(&self, id: i64) -> Result<Bank>;

    /// Bank by short code, NotFound if absent
    async fn get_by_code(&self, code: &str) -> Result<Bank>;
}

/// Cached access tokens, one live record per bank
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert or overwrite the bank's token record
    async fn upsert(&self, bank_id: i64, token: &str, expires_at: DateTime<Utc>) -> Result<()>;

    /// Cached token for the bank, NotFound if absent
    async fn get(&self, bank_id: i64) -> Result<BankToken>;
}

/// Consent records
#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Persist a new consent record, returning its id
    async fn create(&self, consent: &AccountConsent) -> Result<i64>;

    /// Apply a partial update after a status check; `None` fields keep the
    /// stored value
    async fn update_after_check(&self, id: i64, update: &ConsentUpdate) -> Result<()>;

    /// Consent by id, NotFound if absent
    async fn get_by_id(&self, id: i64) -> Result<AccountConsent>;

    /// All consents for a user, optionally limited to one bank
    async fn list_by_user(&self, user_id: i64, bank_id: Option<i64>)
        -> Result<Vec<AccountConsent>>;

    /// Delete a consent record, NotFound if absent
    async fn delete_by_id(&self, id: i64) -> Result<()>;

    /// Up to `limit` consents that still need a status check, oldest first
    async fn list_needing_refresh(&self, limit: usize) -> Result<Vec<AccountConsent>>;
}

/// Explicitly recommended product keys
#[async_trait]
pub trait RecommendedStore: Send + Sync {
    /// Point-in-time set of all recommended keys, for membership lookups
    async fn snapshot(&self) -> Result<HashSet<RecommendationKey>>;

    /// All rules, newest first
    async fn list(&self) -> Result<Vec<RecommendationRule>>;

    /// Add a rule; adding an existing key is a no-op
    async fn upsert(&self, key: &RecommendationKey) -> Result<()>;

    /// Remove a rule, NotFound if absent
    async fn delete(&self, key: &RecommendationKey) -> Result<()>;
}
