//! Open Banking HTTP client
//!
//! Performs the actual per-bank HTTP calls behind the [`BankApiClient`]
//! port: the client-credentials token exchange, consent request/view,
//! account and balance listing, and the product catalogue.
//!
//! All banks in the sandbox expose the same surface:
//! - POST /auth/bank-token?client_id=&client_secret=
//! - POST /account-consents/request
//! - GET  /account-consents/{id}
//! - GET  /accounts?client_id=  and  GET /accounts/{id}/balances
//! - GET  /products?product_type=

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::domain::result::{Error, Result};
use crate::domain::{Bank, Permission};
use crate::ports::{
    BankAccount, BankApiClient, BankProduct, BalanceAmount, ConsentAccess, ConsentRequestReply,
    ConsentView, NewConsentRequest, TokenGrant,
};

// =============================================================================
// API Response Models (matching the sandbox bank API spec)
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    /// seconds
    expires_in: i64,
}

#[derive(Debug, Clone, Serialize)]
struct ConsentRequestBody<'a> {
    client_id: &'a str,
    permissions: &'a [Permission],
    reason: &'a str,
    requesting_bank: &'a str,
    requesting_bank_name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct ConsentRequestResponse {
    request_id: String,
    #[serde(default)]
    consent_id: Option<String>,
    status: String,
    #[serde(default)]
    auto_approved: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
struct ConsentViewWrapper {
    data: ConsentViewData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConsentViewData {
    #[serde(default)]
    consent_id: String,
    status: String,
    #[serde(default)]
    creation_date_time: Option<String>,
    #[serde(default)]
    status_update_date_time: Option<String>,
    #[serde(default)]
    expiration_date_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ListAccountsResponse {
    data: ListAccountsData,
}

#[derive(Debug, Clone, Deserialize)]
struct ListAccountsData {
    #[serde(default)]
    account: Vec<AccountEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountEntry {
    account_id: String,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    account_sub_type: String,
    #[serde(default)]
    opening_date: String,
}

#[derive(Debug, Clone, Deserialize)]
struct BalancesResponse {
    data: BalancesData,
}

#[derive(Debug, Clone, Deserialize)]
struct BalancesData {
    #[serde(default)]
    balance: Vec<BalanceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BalanceEntry {
    #[serde(rename = "type")]
    balance_type: String,
    amount: AmountEntry,
}

#[derive(Debug, Clone, Deserialize)]
struct AmountEntry {
    amount: String,
    currency: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ProductsResponse {
    data: ProductsData,
}

#[derive(Debug, Clone, Deserialize)]
struct ProductsData {
    #[serde(default)]
    product: Vec<ProductEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductEntry {
    product_id: String,
    product_type: String,
    product_name: String,
    #[serde(default)]
    description: Option<String>,
    /// string or null
    #[serde(default)]
    interest_rate: Option<String>,
    #[serde(default)]
    min_amount: Option<String>,
    #[serde(default)]
    max_amount: Option<String>,
    #[serde(default)]
    term_months: Option<i32>,
}

// =============================================================================
// URL helpers
// =============================================================================

/// Normalize a bank's configured base URL: trim whitespace, default the
/// scheme to https, and drop any trailing slash so endpoint paths can be
/// appended uniformly.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::config("bank api_base_url is empty"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| Error::config(format!("invalid bank api_base_url '{}': {}", raw, e)))?;

    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Render a URL for logging with the client_secret query value masked
fn mask_secret(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "client_secret") {
        return url.to_string();
    }
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "client_secret" {
                "******".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    masked
        .query_pairs_mut()
        .clear()
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    masked.to_string()
}

/// Parse a bank-reported RFC 3339 timestamp; unparseable or missing values
/// stay `None` rather than failing the call
fn parse_datetime(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// =============================================================================
// Open Banking HTTP Client
// =============================================================================

/// Reqwest-backed implementation of the [`BankApiClient`] port
#[derive(Debug, Clone)]
pub struct OpenBankingClient {
    client: Client,
}

impl OpenBankingClient {
    /// Create a client with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Map request errors to upstream errors with readable causes
    fn map_request_error(&self, context: &str, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::upstream(format!("{}: request timed out", context))
        } else if error.is_connect() {
            Error::upstream(format!("{}: unable to connect to bank", context))
        } else {
            Error::upstream(format!("{}: {}", context, error))
        }
    }

    /// Turn non-2xx responses into upstream errors carrying status and body
    async fn check_status(&self, context: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        warn!(context, status = status.as_u16(), body = %body, "bank returned non-2xx");
        Err(Error::upstream(format!(
            "{} {}: {}",
            context,
            status.as_u16(),
            body
        )))
    }
}

#[async_trait]
impl BankApiClient for OpenBankingClient {
    async fn request_token(&self, bank: &Bank) -> Result<TokenGrant> {
        let base = normalize_base_url(&bank.api_base_url)?;
        let mut url = Url::parse(&format!("{}/auth/bank-token", base))
            .map_err(|e| Error::config(format!("invalid token url: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("client_id", &bank.client_id)
            .append_pair("client_secret", &bank.client_secret);

        debug!(bank_id = bank.id, url = %mask_secret(&url), "requesting bank token");

        // POST with credentials in the query, no payload
        let resp = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.map_request_error("bank-token", e))?;
        let resp = self.check_status("bank-token", resp).await?;

        let parsed: TokenEndpointResponse = resp
            .json()
            .await
            .map_err(|e| Error::upstream(format!("bank-token: decode failed: {}", e)))?;

        Ok(TokenGrant {
            access_token: parsed.access_token,
            expires_in: parsed.expires_in,
        })
    }

    async fn request_consent(
        &self,
        bank: &Bank,
        request: &NewConsentRequest,
        bearer: &str,
    ) -> Result<ConsentRequestReply> {
        let base = normalize_base_url(&bank.api_base_url)?;
        let url = format!("{}/account-consents/request", base);

        let body = ConsentRequestBody {
            client_id: &request.client_id,
            permissions: &request.permissions,
            reason: &request.reason,
            requesting_bank: &request.requesting_bank,
            requesting_bank_name: &request.requesting_bank_name,
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(bearer)
            .header("X-Requesting-Bank", &request.requesting_bank)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_request_error("consents request", e))?;
        let resp = self.check_status("consents request", resp).await?;

        let parsed: ConsentRequestResponse = resp
            .json()
            .await
            .map_err(|e| Error::upstream(format!("consents request: decode failed: {}", e)))?;

        Ok(ConsentRequestReply {
            request_id: parsed.request_id,
            consent_id: parsed.consent_id.filter(|c| !c.is_empty()),
            status: parsed.status,
            auto_approved: parsed.auto_approved,
        })
    }

    async fn get_consent(
        &self,
        bank: &Bank,
        key: &str,
        bearer: &str,
        interaction_id: &str,
    ) -> Result<ConsentView> {
        let base = normalize_base_url(&bank.api_base_url)?;
        let url = format!("{}/account-consents/{}", base, key);

        let mut req = self
            .client
            .get(&url)
            .bearer_auth(bearer)
            .header("Accept", "application/json");
        if interaction_id.is_empty() {
            warn!(bank_id = bank.id, "x-fapi-interaction-id is blank");
        } else {
            req = req.header("x-fapi-interaction-id", interaction_id);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| self.map_request_error("consents get", e))?;
        let resp = self.check_status("consents get", resp).await?;

        let parsed: ConsentViewWrapper = resp
            .json()
            .await
            .map_err(|e| Error::upstream(format!("consents get: decode failed: {}", e)))?;

        Ok(ConsentView {
            consent_id: parsed.data.consent_id,
            status: parsed.data.status,
            creation_datetime: parse_datetime(parsed.data.creation_date_time.as_deref()),
            status_update_datetime: parse_datetime(parsed.data.status_update_date_time.as_deref()),
            expiration_datetime: parse_datetime(parsed.data.expiration_date_time.as_deref()),
        })
    }

    async fn list_accounts(
        &self,
        bank: &Bank,
        access: &ConsentAccess,
    ) -> Result<Vec<BankAccount>> {
        let base = normalize_base_url(&bank.api_base_url)?;
        let url = format!("{}/accounts", base);

        let resp = self
            .client
            .get(&url)
            .query(&[("client_id", access.client_id.as_str())])
            .bearer_auth(&access.bearer)
            .header("x-consent-id", &access.consent_id)
            .header("x-requesting-bank", &access.requesting_bank)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.map_request_error("list accounts", e))?;
        let resp = self.check_status("list accounts", resp).await?;

        let parsed: ListAccountsResponse = resp
            .json()
            .await
            .map_err(|e| Error::upstream(format!("list accounts: decode failed: {}", e)))?;

        Ok(parsed
            .data
            .account
            .into_iter()
            .map(|a| BankAccount {
                account_id: a.account_id,
                nickname: a.nickname,
                status: a.status,
                account_sub_type: a.account_sub_type,
                opening_date: a.opening_date,
            })
            .collect())
    }

    async fn get_interim_available_balance(
        &self,
        bank: &Bank,
        account_id: &str,
        access: &ConsentAccess,
    ) -> Result<BalanceAmount> {
        let base = normalize_base_url(&bank.api_base_url)?;
        let url = format!("{}/accounts/{}/balances", base, account_id);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&access.bearer)
            .header("x-consent-id", &access.consent_id)
            .header("x-requesting-bank", &access.requesting_bank)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.map_request_error("get balances", e))?;
        let resp = self.check_status("get balances", resp).await?;

        let parsed: BalancesResponse = resp
            .json()
            .await
            .map_err(|e| Error::upstream(format!("get balances: decode failed: {}", e)))?;

        // InterimAvailable only; a bank reporting none yields blank fields
        Ok(parsed
            .data
            .balance
            .into_iter()
            .find(|b| b.balance_type == "InterimAvailable")
            .map(|b| BalanceAmount {
                amount: b.amount.amount,
                currency: b.amount.currency,
            })
            .unwrap_or_default())
    }

    async fn list_products(
        &self,
        bank: &Bank,
        bearer: &str,
        product_type: Option<&str>,
    ) -> Result<Vec<BankProduct>> {
        let base = normalize_base_url(&bank.api_base_url)?;
        let url = format!("{}/products", base);

        let mut req = self
            .client
            .get(&url)
            .bearer_auth(bearer)
            .header("Accept", "application/json");
        if let Some(ptype) = product_type.filter(|p| !p.is_empty()) {
            req = req.query(&[("product_type", ptype)]);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| self.map_request_error("products", e))?;
        let resp = self.check_status("products", resp).await?;

        let parsed: ProductsResponse = resp
            .json()
            .await
            .map_err(|e| Error::upstream(format!("products: decode failed: {}", e)))?;

        Ok(parsed
            .data
            .product
            .into_iter()
            .map(|p| BankProduct {
                product_id: p.product_id,
                product_type: p.product_type,
                product_name: p.product_name,
                description: p.description,
                interest_rate: p.interest_rate,
                min_amount: p.min_amount,
                max_amount: p.max_amount,
                term_months: p.term_months,
            })
            .collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://bank.example/").unwrap(),
            "https://bank.example"
        );
        assert_eq!(
            normalize_base_url(" bank.example ").unwrap(),
            "https://bank.example"
        );
        assert_eq!(
            normalize_base_url("http://localhost:8081/api/").unwrap(),
            "http://localhost:8081/api"
        );
        assert!(normalize_base_url("").is_err());
        assert!(normalize_base_url("   ").is_err());
    }

    #[test]
    fn test_mask_secret() {
        let url =
            Url::parse("https://bank.example/auth/bank-token?client_id=abc&client_secret=hunter2")
                .unwrap();
        let masked = mask_secret(&url);
        assert!(masked.contains("client_secret=%2A%2A%2A%2A%2A%2A") || masked.contains("client_secret=******"));
        assert!(!masked.contains("hunter2"));

        let plain = Url::parse("https://bank.example/products").unwrap();
        assert_eq!(mask_secret(&plain), plain.to_string());
    }

    #[test]
    fn test_parse_datetime() {
        let parsed = parse_datetime(Some("2025-06-01T14:30:00+02:00")).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-06-01T12:30:00+00:00");
        assert!(parse_datetime(Some("not a date")).is_none());
        assert!(parse_datetime(Some("")).is_none());
        assert!(parse_datetime(None).is_none());
    }

    #[test]
    fn test_decode_products_with_null_rates() {
        let json = r#"{
            "data": { "product": [
                { "productId": "p1", "productType": "card", "productName": "Gold Card",
                  "description": null, "interestRate": "12,5", "minAmount": null,
                  "maxAmount": "100000", "termMonths": 24 }
            ]}
        }"#;
        let parsed: ProductsResponse = serde_json::from_str(json).unwrap();
        let product = &parsed.data.product[0];
        assert_eq!(product.product_id, "p1");
        assert_eq!(product.interest_rate.as_deref(), Some("12,5"));
        assert!(product.min_amount.is_none());
        assert_eq!(product.term_months, Some(24));
    }

    #[test]
    fn test_decode_balances_picks_interim_available() {
        let json = r#"{
            "data": { "balance": [
                { "accountId": "a1", "type": "ClosingBooked",
                  "amount": { "amount": "10.00", "currency": "EUR" } },
                { "accountId": "a1", "type": "InterimAvailable",
                  "amount": { "amount": "1234.56", "currency": "EUR" } }
            ]}
        }"#;
        let parsed: BalancesResponse = serde_json::from_str(json).unwrap();
        let interim = parsed
            .data
            .balance
            .into_iter()
            .find(|b| b.balance_type == "InterimAvailable")
            .unwrap();
        assert_eq!(interim.amount.amount, "1234.56");
    }

    #[test]
    fn test_decode_consent_view() {
        let json = r#"{
            "data": {
                "consentId": "consent-7",
                "status": "Authorized",
                "creationDateTime": "2025-06-01T12:00:00Z",
                "statusUpdateDateTime": "2025-06-01T12:00:05Z",
                "expirationDateTime": "2025-12-01T12:00:00Z"
            }
        }"#;
        let parsed: ConsentViewWrapper = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data.consent_id, "consent-7");
        assert_eq!(parsed.data.status, "Authorized");
        assert!(parse_datetime(parsed.data.expiration_date_time.as_deref()).is_some());
    }
}
