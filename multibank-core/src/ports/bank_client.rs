//! Bank API client port
//!
//! Defines the interface for the per-bank Open Banking HTTP surface the core
//! consumes: the client-credentials token exchange, consent request/view,
//! account and balance listing, and the product catalogue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::result::Result;
use crate::domain::{Bank, Permission};

/// Token grant from `POST /auth/bank-token`
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds, relative to the time of the exchange
    pub expires_in: i64,
}

/// Consent request payload for `POST /account-consents/request`
#[derive(Debug, Clone)]
pub struct NewConsentRequest {
    pub client_id: String,
    pub permissions: Vec<Permission>,
    pub reason: String,
    pub requesting_bank: String,
    pub requesting_bank_name: String,
}

/// Immediate reply to a consent request
#[derive(Debug, Clone)]
pub struct ConsentRequestReply {
    pub request_id: String,
    /// May be absent until the bank assigns one
    pub consent_id: Option<String>,
    pub status: String,
    pub auto_approved: Option<bool>,
}

/// Detailed consent view from `GET /account-consents/{id}`
#[derive(Debug, Clone)]
pub struct ConsentView {
    pub consent_id: String,
    /// Raw bank status, e.g. "Authorized" or "AwaitingAuthorization"
    pub status: String,
    pub creation_datetime: Option<DateTime<Utc>>,
    pub status_update_datetime: Option<DateTime<Utc>>,
    pub expiration_datetime: Option<DateTime<Utc>>,
}

/// Credentials accompanying account-scope calls
#[derive(Debug, Clone)]
pub struct ConsentAccess {
    pub client_id: String,
    pub bearer: String,
    pub consent_id: String,
    pub requesting_bank: String,
}

/// One account row from `GET /accounts`
#[derive(Debug, Clone)]
pub struct BankAccount {
    pub account_id: String,
    pub nickname: String,
    pub status: String,
    pub account_sub_type: String,
    pub opening_date: String,
}

/// InterimAvailable balance for one account
///
/// Amount and currency are the bank's decimal strings; both are blank when
/// the bank reported no InterimAvailable entry.
#[derive(Debug, Clone, Default)]
pub struct BalanceAmount {
    pub amount: String,
    pub currency: String,
}

/// One product row from `GET /products`
#[derive(Debug, Clone)]
pub struct BankProduct {
    pub product_id: String,
    pub product_type: String,
    pub product_name: String,
    pub description: Option<String>,
    /// Rates/amounts arrive as nullable decimal strings
    pub interest_rate: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub term_months: Option<i32>,
}

/// Bank Open Banking API client trait
///
/// Implementations perform the actual HTTP calls. Services use this trait so
/// that network IO can be mocked at the trait level or pointed at a mock
/// bank server.
#[async_trait]
pub trait BankApiClient: Send + Sync {
    /// Client-credentials exchange against the bank's token endpoint
    async fn request_token(&self, bank: &Bank) -> Result<TokenGrant>;

    /// Ask the bank for a new data-sharing consent
    async fn request_consent(
        &self,
        bank: &Bank,
        request: &NewConsentRequest,
        bearer: &str,
    ) -> Result<ConsentRequestReply>;

    /// Detailed consent view, keyed by consent id or request id
    async fn get_consent(
        &self,
        bank: &Bank,
        key: &str,
        bearer: &str,
        interaction_id: &str,
    ) -> Result<ConsentView>;

    /// Accounts visible under the consent
    async fn list_accounts(&self, bank: &Bank, access: &ConsentAccess)
        -> Result<Vec<BankAccount>>;

    /// InterimAvailable balance for one account
    async fn get_interim_available_balance(
        &self,
        bank: &Bank,
        account_id: &str,
        access: &ConsentAccess,
    ) -> Result<BalanceAmount>;

    /// Product catalogue, optionally filtered by type
    async fn list_products(
        &self,
        bank: &Bank,
        bearer: &str,
        product_type: Option<&str>,
    ) -> Result<Vec<BankProduct>>;
}
