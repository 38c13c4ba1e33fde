//! Bank domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A third-party Open Banking provider
///
/// Rows are immutable during a request; only administrative configuration
/// (seeding) mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    pub id: i64,
    pub name: String,
    /// Short unique code, e.g. "vtb" or "alpha"
    pub code: String,
    pub api_base_url: String,
    /// Client-credentials login for the bank's token endpoint.
    /// Never expose in API/CLI output; use a view struct instead.
    pub client_id: String,
    pub client_secret: String,
    pub is_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bank {
    /// Create a new enabled bank with required fields
    pub fn new(
        id: i64,
        name: impl Into<String>,
        code: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            code: code.into(),
            api_base_url: api_base_url.into(),
            client_id: String::new(),
            client_secret: String::new(),
            is_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate bank data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.code.trim().is_empty() {
            return Err("bank code cannot be empty");
        }
        if self.api_base_url.trim().is_empty() {
            return Err("bank api_base_url cannot be empty");
        }
        Ok(())
    }
}

/// Cached client-credentials access token for one bank
///
/// One live record per bank, overwritten in place on refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankToken {
    pub bank_id: i64,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
