//! Mock bank API server for testing
//!
//! This module provides a mock HTTP server that simulates one sandbox bank,
//! allowing for comprehensive testing without live bank credentials.
//!
//! The mock server implements the same response structure as the real bank
//! API surface:
//! - POST /auth/bank-token returns { access_token, expires_in }
//! - POST /account-consents/request returns { request_id, consent_id, status, auto_approved }
//! - GET /account-consents/{id} returns { data: { consentId, status, ...DateTime fields } }
//! - GET /accounts returns { data: { account: [...] } }
//! - GET /accounts/{id}/balances returns { data: { balance: [...] } }
//! - GET /products returns { data: { product: [...] } }

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{Duration, Utc};
use serde::Serialize;

/// Configuration for mock bank behavior
#[derive(Debug, Clone)]
pub struct MockBankConfig {
    /// Credentials the token endpoint accepts
    pub client_id: String,
    pub client_secret: String,
    /// Lifetime reported with each issued token, in seconds
    pub token_expires_in: i64,
    /// Status returned by the immediate consent-request response
    pub request_status: String,
    /// Raw status returned by the detailed consent view
    pub view_status: String,
    /// Whether consent requests are auto-approved
    pub auto_approve: bool,
    /// Number of accounts to generate
    pub num_accounts: usize,
    /// Product catalogue served by /products
    pub products: Vec<MockProduct>,
    /// Per-endpoint failure switches (respond 500)
    pub fail_token: bool,
    pub fail_consent_view: bool,
    pub fail_accounts: bool,
    pub fail_balances: bool,
    pub fail_products: bool,
    /// Delay in milliseconds before responding
    pub delay_ms: u64,
}

impl Default for MockBankConfig {
    fn default() -> Self {
        Self {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            token_expires_in: 3600,
            request_status: "AwaitingAuthorisation".to_string(),
            view_status: "Authorized".to_string(),
            auto_approve: false,
            num_accounts: 2,
            products: vec![MockProduct::new("prod-1", "deposit", "Demo Deposit")],
            fail_token: false,
            fail_consent_view: false,
            fail_accounts: false,
            fail_balances: false,
            fail_products: false,
            delay_ms: 0,
        }
    }
}

/// One product served by the mock catalogue
#[derive(Debug, Clone)]
pub struct MockProduct {
    pub product_id: String,
    pub product_type: String,
    pub product_name: String,
    pub interest_rate: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub term_months: Option<i32>,
}

impl MockProduct {
    pub fn new(id: &str, product_type: &str, name: &str) -> Self {
        Self {
            product_id: id.to_string(),
            product_type: product_type.to_string(),
            product_name: name.to_string(),
            interest_rate: Some("5.5".to_string()),
            min_amount: Some("1000".to_string()),
            max_amount: Some("100000".to_string()),
            term_months: Some(12),
        }
    }
}

/// Per-endpoint hit counters, shared with the test
#[derive(Debug, Default)]
pub struct MockBankCounters {
    pub token_requests: AtomicUsize,
    pub consent_requests: AtomicUsize,
    pub consent_views: AtomicUsize,
    pub account_lists: AtomicUsize,
    pub balance_fetches: AtomicUsize,
    pub product_lists: AtomicUsize,
}

/// Mock bank server for testing
pub struct MockBankServer {
    port: u16,
    running: Arc<AtomicBool>,
    counters: Arc<MockBankCounters>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

// Response structures matching the real API

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
}

#[derive(Serialize)]
struct ConsentRequestResponse {
    request_id: String,
    consent_id: Option<String>,
    status: String,
    auto_approved: bool,
}

#[derive(Serialize)]
struct ConsentViewResponse {
    data: ConsentViewData,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsentViewData {
    consent_id: String,
    status: String,
    creation_date_time: String,
    status_update_date_time: String,
    expiration_date_time: String,
    permissions: Vec<String>,
}

#[derive(Serialize)]
struct AccountsResponse {
    data: AccountsData,
}

#[derive(Serialize)]
struct AccountsData {
    account: Vec<AccountData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountData {
    account_id: String,
    status: String,
    currency: String,
    account_type: String,
    account_sub_type: String,
    nickname: String,
    opening_date: String,
}

#[derive(Serialize)]
struct BalancesResponse {
    data: BalancesData,
}

#[derive(Serialize)]
struct BalancesData {
    balance: Vec<BalanceData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceData {
    account_id: String,
    #[serde(rename = "type")]
    balance_type: String,
    date_time: String,
    amount: AmountData,
    credit_debit_indicator: String,
}

#[derive(Serialize)]
struct AmountData {
    amount: String,
    currency: String,
}

#[derive(Serialize)]
struct ProductsResponse {
    data: ProductsData,
}

#[derive(Serialize)]
struct ProductsData {
    product: Vec<ProductData>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProductData {
    product_id: String,
    product_type: String,
    product_name: String,
    description: Option<String>,
    interest_rate: Option<String>,
    min_amount: Option<String>,
    max_amount: Option<String>,
    term_months: Option<i32>,
}

impl MockBankServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockBankConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        let counters = Arc::new(MockBankCounters::default());
        let counters_clone = counters.clone();

        // Non-blocking accept loop for graceful shutdown
        listener.set_nonblocking(true)?;

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        let counters = counters_clone.clone();
                        thread::spawn(move || {
                            handle_connection(stream, &cfg, &counters);
                        });
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            counters,
            thread_handle: Some(thread_handle),
        })
    }

    /// Get the base URL for this mock server
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Per-endpoint hit counters
    pub fn counters(&self) -> &MockBankCounters {
        &self.counters
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockBankServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_connection(mut stream: TcpStream, config: &MockBankConfig, counters: &MockBankCounters) {
    let mut buffer = [0; 8192];

    let Ok(n) = stream.read(&mut buffer) else {
        return;
    };
    let request = String::from_utf8_lossy(&buffer[..n]).to_string();

    if config.delay_ms > 0 {
        thread::sleep(std::time::Duration::from_millis(config.delay_ms));
    }

    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_response(&mut stream, 400, "Bad Request", r#"{"error":"invalid request"}"#);
        return;
    }

    let method = parts[0];
    let path = parts[1];
    let path_without_query = path.split('?').next().unwrap_or(path);
    let query = path.splitn(2, '?').nth(1).unwrap_or("");

    match (method, path_without_query) {
        ("POST", "/auth/bank-token") => {
            counters.token_requests.fetch_add(1, Ordering::SeqCst);
            handle_token(&mut stream, config, counters, query);
        }
        ("POST", "/account-consents/request") => {
            counters.consent_requests.fetch_add(1, Ordering::SeqCst);
            handle_consent_request(&mut stream, config, counters, &request);
        }
        ("GET", p) if p.starts_with("/account-consents/") => {
            counters.consent_views.fetch_add(1, Ordering::SeqCst);
            let key = p.trim_start_matches("/account-consents/");
            handle_consent_view(&mut stream, config, key);
        }
        ("GET", "/accounts") => {
            counters.account_lists.fetch_add(1, Ordering::SeqCst);
            handle_accounts(&mut stream, config, &request);
        }
        ("GET", p) if p.starts_with("/accounts/") && p.ends_with("/balances") => {
            counters.balance_fetches.fetch_add(1, Ordering::SeqCst);
            let account_id = p
                .trim_start_matches("/accounts/")
                .trim_end_matches("/balances")
                .to_string();
            handle_balances(&mut stream, config, &account_id);
        }
        ("GET", "/products") => {
            counters.product_lists.fetch_add(1, Ordering::SeqCst);
            handle_products(&mut stream, config, query);
        }
        _ => {
            send_response(&mut stream, 404, "Not Found", r#"{"error":"endpoint not found"}"#);
        }
    }
}

fn query_param<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

fn has_bearer(request: &str) -> bool {
    request
        .lines()
        .any(|l| l.to_lowercase().starts_with("authorization: bearer "))
}

fn handle_token(
    stream: &mut TcpStream,
    config: &MockBankConfig,
    counters: &MockBankCounters,
    query: &str,
) {
    if config.fail_token {
        send_response(stream, 503, "Service Unavailable", r#"{"error":"token service down"}"#);
        return;
    }

    let client_id = query_param(query, "client_id").unwrap_or("");
    let client_secret = query_param(query, "client_secret").unwrap_or("");
    if client_id != config.client_id || client_secret != config.client_secret {
        send_response(stream, 401, "Unauthorized", r#"{"error":"invalid client credentials"}"#);
        return;
    }

    // Unique token per issuance so cache hits are observable
    let serial = counters.token_requests.load(Ordering::SeqCst);
    let response = TokenResponse {
        access_token: format!("token-{}", serial),
        token_type: "Bearer".to_string(),
        expires_in: config.token_expires_in,
    };
    send_json(stream, &response);
}

fn handle_consent_request(
    stream: &mut TcpStream,
    config: &MockBankConfig,
    counters: &MockBankCounters,
    request: &str,
) {
    if !has_bearer(request) {
        send_response(stream, 401, "Unauthorized", r#"{"error":"missing bearer token"}"#);
        return;
    }

    let serial = counters.consent_requests.load(Ordering::SeqCst);
    let response = ConsentRequestResponse {
        request_id: format!("req-{}", serial),
        consent_id: config.auto_approve.then(|| format!("consent-{}", serial)),
        status: config.request_status.clone(),
        auto_approved: config.auto_approve,
    };
    send_json(stream, &response);
}

fn handle_consent_view(stream: &mut TcpStream, config: &MockBankConfig, key: &str) {
    if config.fail_consent_view {
        send_response(stream, 500, "Internal Server Error", r#"{"error":"consent view failed"}"#);
        return;
    }

    // A view keyed by request id reveals the assigned consent id
    let consent_id = if key.starts_with("consent-") {
        key.to_string()
    } else {
        key.replacen("req-", "consent-", 1)
    };

    let now = Utc::now();
    let response = ConsentViewResponse {
        data: ConsentViewData {
            consent_id,
            status: config.view_status.clone(),
            creation_date_time: now.to_rfc3339(),
            status_update_date_time: now.to_rfc3339(),
            expiration_date_time: (now + Duration::days(90)).to_rfc3339(),
            permissions: vec![
                "ReadAccountsDetail".to_string(),
                "ReadBalances".to_string(),
            ],
        },
    };
    send_json(stream, &response);
}

fn handle_accounts(stream: &mut TcpStream, config: &MockBankConfig, request: &str) {
    if config.fail_accounts {
        send_response(stream, 500, "Internal Server Error", r#"{"error":"accounts failed"}"#);
        return;
    }
    if !has_bearer(request) {
        send_response(stream, 401, "Unauthorized", r#"{"error":"missing bearer token"}"#);
        return;
    }

    let accounts: Vec<AccountData> = (0..config.num_accounts)
        .map(|i| AccountData {
            account_id: format!("acc-{}", i + 1),
            status: "Enabled".to_string(),
            currency: "EUR".to_string(),
            account_type: "Personal".to_string(),
            account_sub_type: "CurrentAccount".to_string(),
            nickname: format!("Account {}", i + 1),
            opening_date: "2020-01-15".to_string(),
        })
        .collect();

    send_json(
        stream,
        &AccountsResponse {
            data: AccountsData { account: accounts },
        },
    );
}

fn handle_balances(stream: &mut TcpStream, config: &MockBankConfig, account_id: &str) {
    if config.fail_balances {
        send_response(stream, 500, "Internal Server Error", r#"{"error":"balances failed"}"#);
        return;
    }

    // Deterministic balance derived from the account number
    let serial: i64 = account_id
        .rsplit('-')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1);
    let amount = format!("{}.00", 1000 + serial * 250);

    let response = BalancesResponse {
        data: BalancesData {
            balance: vec![BalanceData {
                account_id: account_id.to_string(),
                balance_type: "InterimAvailable".to_string(),
                date_time: Utc::now().to_rfc3339(),
                amount: AmountData {
                    amount,
                    currency: "EUR".to_string(),
                },
                credit_debit_indicator: "Credit".to_string(),
            }],
        },
    };
    send_json(stream, &response);
}

fn handle_products(stream: &mut TcpStream, config: &MockBankConfig, query: &str) {
    if config.fail_products {
        send_response(stream, 500, "Internal Server Error", r#"{"error":"products failed"}"#);
        return;
    }

    let type_filter = query_param(query, "product_type");
    let products: Vec<ProductData> = config
        .products
        .iter()
        .filter(|p| type_filter.map_or(true, |t| p.product_type == t))
        .map(|p| ProductData {
            product_id: p.product_id.clone(),
            product_type: p.product_type.clone(),
            product_name: p.product_name.clone(),
            description: Some(format!("{} product", p.product_name)),
            interest_rate: p.interest_rate.clone(),
            min_amount: p.min_amount.clone(),
            max_amount: p.max_amount.clone(),
            term_months: p.term_months,
        })
        .collect();

    send_json(
        stream,
        &ProductsResponse {
            data: ProductsData { product: products },
        },
    );
}

fn send_json<T: Serialize>(stream: &mut TcpStream, body: &T) {
    match serde_json::to_string(body) {
        Ok(json) => send_response(stream, 200, "OK", &json),
        Err(_) => send_response(stream, 500, "Internal Server Error", r#"{"error":"encode failed"}"#),
    }
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::OpenBankingClient;
    use crate::domain::Bank;
    use crate::ports::{BankApiClient, ConsentAccess};
    use std::time::Duration as StdDuration;

    fn bank_for(server: &MockBankServer) -> Bank {
        let mut bank = Bank::new(1, "Mock Bank", "mock", server.base_url());
        bank.client_id = "client".to_string();
        bank.client_secret = "secret".to_string();
        bank
    }

    fn client() -> OpenBankingClient {
        OpenBankingClient::new(StdDuration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_token_endpoint() {
        let server = MockBankServer::start(MockBankConfig::default()).unwrap();
        let grant = client().request_token(&bank_for(&server)).await.unwrap();

        assert!(grant.access_token.starts_with("token-"));
        assert_eq!(grant.expires_in, 3600);
        assert_eq!(server.counters().token_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_token_endpoint_rejects_bad_credentials() {
        let server = MockBankServer::start(MockBankConfig::default()).unwrap();
        let mut bank = bank_for(&server);
        bank.client_secret = "wrong".to_string();

        let err = client().request_token(&bank).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_consent_round_trip() {
        let server = MockBankServer::start(MockBankConfig {
            auto_approve: true,
            request_status: "Authorised".to_string(),
            ..Default::default()
        })
        .unwrap();
        let bank = bank_for(&server);
        let c = client();

        let request = crate::ports::NewConsentRequest {
            client_id: "user-client".to_string(),
            permissions: vec![],
            reason: "Account aggregation".to_string(),
            requesting_bank: "multibank".to_string(),
            requesting_bank_name: "Multibank".to_string(),
        };
        let reply = c.request_consent(&bank, &request, "tok").await.unwrap();
        assert!(reply.consent_id.is_some());
        assert_eq!(reply.auto_approved, Some(true));

        let view = c
            .get_consent(&bank, reply.consent_id.as_deref().unwrap(), "tok", "multibank")
            .await
            .unwrap();
        assert_eq!(view.status, "Authorized");
        assert!(view.expiration_datetime.is_some());
    }

    #[tokio::test]
    async fn test_accounts_and_balances() {
        let server = MockBankServer::start(MockBankConfig {
            num_accounts: 3,
            ..Default::default()
        })
        .unwrap();
        let bank = bank_for(&server);
        let c = client();

        let access = ConsentAccess {
            client_id: "user-client".to_string(),
            bearer: "tok".to_string(),
            consent_id: "consent-1".to_string(),
            requesting_bank: "multibank".to_string(),
        };
        let accounts = c.list_accounts(&bank, &access).await.unwrap();
        assert_eq!(accounts.len(), 3);

        let balance = c
            .get_interim_available_balance(&bank, &accounts[0].account_id, &access)
            .await
            .unwrap();
        assert_eq!(balance.amount, "1250.00");
        assert_eq!(balance.currency, "EUR");
    }

    #[tokio::test]
    async fn test_products_type_filter_applied_server_side() {
        let server = MockBankServer::start(MockBankConfig {
            products: vec![
                MockProduct::new("p1", "card", "Gold Card"),
                MockProduct::new("p2", "card", "Silver Card"),
                MockProduct::new("p3", "loan", "Cash Loan"),
            ],
            ..Default::default()
        })
        .unwrap();
        let bank = bank_for(&server);
        let c = client();

        let all = c.list_products(&bank, "tok", None).await.unwrap();
        assert_eq!(all.len(), 3);

        let cards = c.list_products(&bank, "tok", Some("card")).await.unwrap();
        assert_eq!(cards.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let server = MockBankServer::start(MockBankConfig {
            fail_token: true,
            fail_products: true,
            ..Default::default()
        })
        .unwrap();
        let bank = bank_for(&server);
        let c = client();

        assert!(c.request_token(&bank).await.is_err());
        assert!(c.list_products(&bank, "tok", None).await.is_err());
    }
}
