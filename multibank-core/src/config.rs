//! Configuration management
//!
//! Loaded from `settings.json` in the data directory:
//! ```json
//! {
//!   "requestingBank": "multibank",
//!   "requestingBankName": "Multibank Aggregator",
//!   "consentReason": "Account aggregation",
//!   "expirySkewSecs": 120,
//!   "banks": [ { "name": "...", "code": "...", "apiBaseUrl": "...", ... } ]
//! }
//! ```
//! Missing fields fall back to defaults, so an empty or absent file yields a
//! usable configuration.

use std::path::Path;

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::result::Result;
use crate::domain::Permission;

/// Raw settings.json structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SettingsFile {
    requesting_bank: String,
    requesting_bank_name: String,
    consent_reason: String,
    permissions: Vec<Permission>,
    expiry_skew_secs: u64,
    http_timeout_secs: u64,
    bank_call_timeout_secs: u64,
    token_refresh_workers: usize,
    consent_refresh_workers: usize,
    consent_refresh_batch: usize,
    product_fanout: usize,
    refresh_interval_secs: u64,
    banks: Vec<BankSeed>,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            requesting_bank: "multibank".to_string(),
            requesting_bank_name: "Multibank Aggregator".to_string(),
            consent_reason: "Account aggregation".to_string(),
            permissions: vec![
                Permission::ReadAccountsDetail,
                Permission::ReadBalances,
                Permission::ReadTransactionsDetail,
            ],
            expiry_skew_secs: 120,
            http_timeout_secs: 10,
            bank_call_timeout_secs: 8,
            token_refresh_workers: 4,
            consent_refresh_workers: 4,
            consent_refresh_batch: 50,
            product_fanout: 8,
            refresh_interval_secs: 600,
            banks: Vec::new(),
        }
    }
}

/// A bank entry in the settings file, used for seeding the directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankSeed {
    pub name: String,
    pub code: String,
    pub api_base_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Multibank configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Our own code sent as `requesting_bank` on consent requests
    pub requesting_bank: String,
    pub requesting_bank_name: String,
    pub consent_reason: String,
    /// Fixed permission set attached to every consent request
    pub permissions: Vec<Permission>,
    /// Safety margin before a cached token counts as expired
    pub expiry_skew_secs: u64,
    pub http_timeout_secs: u64,
    /// Per-item timeout inside batch operations
    pub bank_call_timeout_secs: u64,
    pub token_refresh_workers: usize,
    pub consent_refresh_workers: usize,
    pub consent_refresh_batch: usize,
    pub product_fanout: usize,
    /// Background refresher tick interval
    pub refresh_interval_secs: u64,
    /// Banks to seed into the directory
    pub banks: Vec<BankSeed>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(SettingsFile::default())
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// The requesting-bank code can be overridden via the
    /// `MULTIBANK_REQUESTING_BANK` environment variable (for staging
    /// environments where a different code is registered with the banks).
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let mut config = Self::from_settings(raw);
        if let Ok(code) = std::env::var("MULTIBANK_REQUESTING_BANK") {
            if !code.trim().is_empty() {
                config.requesting_bank = code.trim().to_string();
            }
        }
        Ok(config)
    }

    fn from_settings(raw: SettingsFile) -> Self {
        Self {
            requesting_bank: raw.requesting_bank,
            requesting_bank_name: raw.requesting_bank_name,
            consent_reason: raw.consent_reason,
            permissions: raw.permissions,
            expiry_skew_secs: raw.expiry_skew_secs,
            http_timeout_secs: raw.http_timeout_secs,
            bank_call_timeout_secs: raw.bank_call_timeout_secs,
            token_refresh_workers: raw.token_refresh_workers.max(1),
            consent_refresh_workers: raw.consent_refresh_workers.max(1),
            consent_refresh_batch: raw.consent_refresh_batch.max(1),
            product_fanout: raw.product_fanout.max(1),
            refresh_interval_secs: raw.refresh_interval_secs.max(1),
            banks: raw.banks,
        }
    }

    /// Expiry skew as a chrono duration, for comparisons against timestamps
    pub fn expiry_skew(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.expiry_skew_secs as i64)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn bank_call_timeout(&self) -> Duration {
        Duration::from_secs(self.bank_call_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();

        assert_eq!(config.requesting_bank, "multibank");
        assert_eq!(config.expiry_skew_secs, 120);
        assert_eq!(config.product_fanout, 8);
        assert_eq!(config.permissions.len(), 3);
        assert!(config.banks.is_empty());
    }

    #[test]
    fn test_load_settings_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{
                "requestingBank": "team014",
                "expirySkewSecs": 60,
                "productFanout": 0,
                "banks": [
                    { "name": "Alpha", "code": "alpha", "apiBaseUrl": "https://alpha.example" }
                ]
            }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.requesting_bank, "team014");
        assert_eq!(config.expiry_skew_secs, 60);
        // worker/fan-out caps are clamped to at least one
        assert_eq!(config.product_fanout, 1);
        assert_eq!(config.banks.len(), 1);
        assert!(config.banks[0].enabled);
    }

    #[test]
    fn test_malformed_settings_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{not json").unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.requesting_bank, "multibank");
    }
}
