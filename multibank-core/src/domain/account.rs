//! Aggregated account view
//!
//! Accounts are read-only, ephemeral value objects fetched per request from
//! each bank; they are never persisted.

use serde::{Deserialize, Serialize};

/// One account row in the aggregated listing
///
/// `amount`/`currency` come from the bank's InterimAvailable balance and are
/// carried as the bank's decimal strings; they stay blank when the balance
/// fetch for this account failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: String,
    pub nickname: String,
    /// Enabled/Disabled, as reported by the bank
    pub status: String,
    pub account_sub_type: String,
    /// YYYY-MM-DD, as reported by the bank
    pub opening_date: String,
    pub amount: String,
    pub currency: String,
    /// Owning bank, for attribution in merged results
    pub bank_code: String,
    pub client_id: String,
}
