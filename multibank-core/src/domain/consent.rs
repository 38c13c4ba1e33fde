//! Consent domain model and status lifecycle
//!
//! A consent is a user-scoped, bank-scoped grant of read permissions tracked
//! through a status lifecycle:
//! `AwaitingAuthorisation -> {Authorised, Rejected}`, `Authorised -> Revoked`.
//! Rejected and Revoked are terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Consent lifecycle status as tracked internally
///
/// Unknown bank-reported strings are carried verbatim in `Other`; the core
/// never invents a status the bank (or local auto-approval detection) did not
/// report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentStatus {
    AwaitingAuthorisation,
    Authorised,
    Rejected,
    Revoked,
    /// Bank-reported status with no internal mapping, kept verbatim
    Other(String),
}

impl ConsentStatus {
    /// Canonical string form (Other keeps the bank's original spelling)
    pub fn as_str(&self) -> &str {
        match self {
            Self::AwaitingAuthorisation => "AwaitingAuthorisation",
            Self::Authorised => "Authorised",
            Self::Rejected => "Rejected",
            Self::Revoked => "Revoked",
            Self::Other(raw) => raw,
        }
    }

    /// Terminal statuses are never refreshed again
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Revoked)
    }

    /// Total mapping from a raw bank status plus the auto-approval flag.
    ///
    /// The explicit auto-approval flag wins over whatever string the bank
    /// sent; otherwise common synonyms are folded case-insensitively and
    /// anything unrecognized passes through verbatim. The bank status
    /// vocabulary is not fully specified upstream, so the synonym table may
    /// need extension as new banks are onboarded.
    pub fn normalize(raw: &str, auto_approved: Option<bool>) -> Self {
        if auto_approved == Some(true) {
            return Self::Authorised;
        }
        match raw.trim().to_lowercase().as_str() {
            "approved" | "authorised" | "authorized" => Self::Authorised,
            "pending" | "awaitingauthorization" | "awaitingauthorisation" => {
                Self::AwaitingAuthorisation
            }
            "rejected" => Self::Rejected,
            "revoked" => Self::Revoked,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Exact-name parse used for stored values (no synonym folding)
    pub fn from_stored(raw: &str) -> Self {
        match raw {
            "AwaitingAuthorisation" => Self::AwaitingAuthorisation,
            "Authorised" => Self::Authorised,
            "Rejected" => Self::Rejected,
            "Revoked" => Self::Revoked,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ConsentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConsentStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_stored(&raw))
    }
}

/// Open Banking account-information permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    ReadAccountsDetail,
    ReadBalances,
    ReadTransactionsDetail,
}

/// A data-sharing consent for one (user, bank) pair
///
/// Created once per request; mutated only through refresh (status, consent
/// id, bank-reported dates); a new request always yields a new record.
/// The external `request_id` is assigned at creation and immutable; the
/// external `consent_id`, once non-null, is never cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConsent {
    pub id: i64,
    pub user_id: i64,
    pub bank_id: i64,
    /// req-... identifier, returned immediately by the bank
    pub request_id: String,
    /// consent-... identifier, may only be assigned later
    pub consent_id: Option<String>,
    pub status: ConsentStatus,
    /// Unknown until the bank's immediate response carries the flag
    pub auto_approved: Option<bool>,
    /// Fixed permission set assigned at creation
    pub permissions: Vec<Permission>,
    pub reason: String,
    pub requesting_bank: String,
    pub requesting_bank_name: String,
    /// Client login at the bank, supplied by the caller
    pub client_id: String,

    // Bank-reported timestamps, null until the first successful status fetch
    pub creation_datetime: Option<DateTime<Utc>>,
    pub status_update_datetime: Option<DateTime<Utc>>,
    pub expiration_datetime: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountConsent {
    /// Key for detail lookups at the bank: consent id once known, else the
    /// request id
    pub fn lookup_key(&self) -> &str {
        match &self.consent_id {
            Some(cid) if !cid.is_empty() => cid,
            _ => &self.request_id,
        }
    }
}

/// Partial update applied after a status check against the bank
///
/// `None` fields keep the stored value (coalesce semantics), which is what
/// guarantees an assigned consent id is never cleared.
#[derive(Debug, Clone, Default)]
pub struct ConsentUpdate {
    pub consent_id: Option<String>,
    pub status: Option<ConsentStatus>,
    pub auto_approved: Option<bool>,
    pub creation_datetime: Option<DateTime<Utc>>,
    pub status_update_datetime: Option<DateTime<Utc>>,
    pub expiration_datetime: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_synonyms() {
        assert_eq!(
            ConsentStatus::normalize("Authorized", None),
            ConsentStatus::Authorised
        );
        assert_eq!(
            ConsentStatus::normalize("approved", None),
            ConsentStatus::Authorised
        );
        assert_eq!(
            ConsentStatus::normalize(" AwaitingAuthorization ", None),
            ConsentStatus::AwaitingAuthorisation
        );
        assert_eq!(
            ConsentStatus::normalize("pending", None),
            ConsentStatus::AwaitingAuthorisation
        );
        assert_eq!(
            ConsentStatus::normalize("REJECTED", None),
            ConsentStatus::Rejected
        );
        assert_eq!(
            ConsentStatus::normalize("revoked", None),
            ConsentStatus::Revoked
        );
    }

    #[test]
    fn test_normalize_auto_approved_wins() {
        assert_eq!(
            ConsentStatus::normalize("pending", Some(true)),
            ConsentStatus::Authorised
        );
        // flag explicitly false falls back to the string mapping
        assert_eq!(
            ConsentStatus::normalize("pending", Some(false)),
            ConsentStatus::AwaitingAuthorisation
        );
    }

    #[test]
    fn test_normalize_unknown_passes_through_verbatim() {
        let status = ConsentStatus::normalize("Expired", None);
        assert_eq!(status, ConsentStatus::Other("Expired".to_string()));
        assert_eq!(status.as_str(), "Expired");
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConsentStatus::Rejected.is_terminal());
        assert!(ConsentStatus::Revoked.is_terminal());
        assert!(!ConsentStatus::Authorised.is_terminal());
        assert!(!ConsentStatus::AwaitingAuthorisation.is_terminal());
        assert!(!ConsentStatus::Other("Expired".into()).is_terminal());
    }

    #[test]
    fn test_status_serde_round_trip() {
        for status in [
            ConsentStatus::AwaitingAuthorisation,
            ConsentStatus::Authorised,
            ConsentStatus::Other("SomethingElse".into()),
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let back: ConsentStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_lookup_key_prefers_consent_id() {
        let now = Utc::now();
        let mut consent = AccountConsent {
            id: 1,
            user_id: 1,
            bank_id: 1,
            request_id: "req-1".into(),
            consent_id: None,
            status: ConsentStatus::AwaitingAuthorisation,
            auto_approved: None,
            permissions: vec![Permission::ReadAccountsDetail],
            reason: "Account aggregation".into(),
            requesting_bank: "multibank".into(),
            requesting_bank_name: "Multibank".into(),
            client_id: "client-1".into(),
            creation_datetime: None,
            status_update_datetime: None,
            expiration_datetime: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(consent.lookup_key(), "req-1");

        consent.consent_id = Some(String::new());
        assert_eq!(consent.lookup_key(), "req-1");

        consent.consent_id = Some("consent-9".into());
        assert_eq!(consent.lookup_key(), "consent-9");
    }
}
