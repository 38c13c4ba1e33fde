//! Integration tests for account and product aggregation
//!
//! Exercises the fan-out services against several mock banks at once,
//! including partial-failure scenarios where individual banks are down.
//!
//! Run with: cargo test --test aggregation_tests -- --nocapture

use std::sync::Arc;

use multibank_core::adapters::{
    MemoryStore, MockBankConfig, MockBankServer, MockProduct, OpenBankingClient,
};
use multibank_core::config::{BankSeed, Config};
use multibank_core::{MultibankContext, ProductFilter, RecommendationKey};

// ============================================================================
// Test Helpers
// ============================================================================

fn create_context(servers: &[&MockBankServer]) -> (MultibankContext, Vec<i64>) {
    let config = Config::default();
    let storage = Arc::new(MemoryStore::new());

    let mut bank_ids = Vec::new();
    for (i, server) in servers.iter().enumerate() {
        let bank = storage
            .upsert_bank(&BankSeed {
                name: format!("Bank {}", i + 1),
                code: format!("bank{}", i + 1),
                api_base_url: server.base_url(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                enabled: true,
            })
            .expect("Failed to seed bank");
        bank_ids.push(bank.id);
    }

    let client = Arc::new(OpenBankingClient::new(config.http_timeout()).unwrap());
    (
        MultibankContext::with_parts(config, storage, client),
        bank_ids,
    )
}

/// Auto-approving bank config, so one consent request yields a usable consent
fn auto_approving(config: MockBankConfig) -> MockBankConfig {
    MockBankConfig {
        auto_approve: true,
        request_status: "Approved".to_string(),
        view_status: "Authorized".to_string(),
        ..config
    }
}

// ============================================================================
// Account aggregation
// ============================================================================

#[tokio::test]
async fn test_accounts_merged_across_banks_with_balances() {
    let bank_a = MockBankServer::start(auto_approving(MockBankConfig {
        num_accounts: 2,
        ..Default::default()
    }))
    .unwrap();
    let bank_b = MockBankServer::start(auto_approving(MockBankConfig {
        num_accounts: 1,
        ..Default::default()
    }))
    .unwrap();
    let (ctx, _) = create_context(&[&bank_a, &bank_b]);

    ctx.consent_service.request(1, "bank1", "login").await.unwrap();
    ctx.consent_service.request(1, "bank2", "login").await.unwrap();

    let accounts = ctx.account_service.list_user_accounts(1, None).await.unwrap();
    assert_eq!(accounts.len(), 3);

    // Every aggregated account is attributable to exactly one bank
    let from_a = accounts.iter().filter(|a| a.bank_code == "bank1").count();
    let from_b = accounts.iter().filter(|a| a.bank_code == "bank2").count();
    assert_eq!(from_a, 2);
    assert_eq!(from_b, 1);

    // Balances came through as the bank's decimal strings
    assert!(accounts.iter().all(|a| !a.amount.is_empty()));
    assert!(accounts.iter().all(|a| a.currency == "EUR"));
}

#[tokio::test]
async fn test_balance_failure_emits_account_with_blank_amount() {
    let server = MockBankServer::start(auto_approving(MockBankConfig {
        num_accounts: 2,
        fail_balances: true,
        ..Default::default()
    }))
    .unwrap();
    let (ctx, _) = create_context(&[&server]);

    ctx.consent_service.request(1, "bank1", "login").await.unwrap();

    let accounts = ctx.account_service.list_user_accounts(1, None).await.unwrap();

    // Accounts are still emitted, with blank amount/currency
    assert_eq!(accounts.len(), 2);
    assert!(accounts.iter().all(|a| a.amount.is_empty()));
    assert!(accounts.iter().all(|a| a.currency.is_empty()));
}

#[tokio::test]
async fn test_bank_level_failure_skips_that_consent_only() {
    let healthy = MockBankServer::start(auto_approving(MockBankConfig {
        num_accounts: 2,
        ..Default::default()
    }))
    .unwrap();
    let broken = MockBankServer::start(auto_approving(MockBankConfig {
        num_accounts: 2,
        fail_accounts: true,
        ..Default::default()
    }))
    .unwrap();
    let (ctx, _) = create_context(&[&healthy, &broken]);

    ctx.consent_service.request(1, "bank1", "login").await.unwrap();
    ctx.consent_service.request(1, "bank2", "login").await.unwrap();

    let accounts = ctx
        .account_service
        .list_user_accounts(1, None)
        .await
        .expect("one broken bank must not fail the aggregate");

    assert_eq!(accounts.len(), 2);
    assert!(accounts.iter().all(|a| a.bank_code == "bank1"));
}

#[tokio::test]
async fn test_consent_without_assigned_id_is_not_usable() {
    // Bank leaves the consent pending, so no consent id is ever assigned
    let server = MockBankServer::start(MockBankConfig {
        auto_approve: false,
        request_status: "pending".to_string(),
        num_accounts: 2,
        ..Default::default()
    })
    .unwrap();
    let (ctx, _) = create_context(&[&server]);

    ctx.consent_service.request(1, "bank1", "login").await.unwrap();

    let accounts = ctx.account_service.list_user_accounts(1, None).await.unwrap();
    assert!(accounts.is_empty());
}

#[tokio::test]
async fn test_accounts_filtered_to_one_bank() {
    let bank_a = MockBankServer::start(auto_approving(MockBankConfig {
        num_accounts: 2,
        ..Default::default()
    }))
    .unwrap();
    let bank_b = MockBankServer::start(auto_approving(MockBankConfig {
        num_accounts: 3,
        ..Default::default()
    }))
    .unwrap();
    let (ctx, bank_ids) = create_context(&[&bank_a, &bank_b]);

    ctx.consent_service.request(1, "bank1", "login").await.unwrap();
    ctx.consent_service.request(1, "bank2", "login").await.unwrap();

    let accounts = ctx
        .account_service
        .list_user_accounts(1, Some(bank_ids[1]))
        .await
        .unwrap();
    assert_eq!(accounts.len(), 3);
    assert!(accounts.iter().all(|a| a.bank_code == "bank2"));
}

// ============================================================================
// Product aggregation
// ============================================================================

#[tokio::test]
async fn test_products_merged_and_tagged_per_bank() {
    let bank_a = MockBankServer::start(MockBankConfig {
        products: vec![
            MockProduct::new("a1", "deposit", "Alpha Deposit"),
            MockProduct::new("a2", "loan", "Alpha Loan"),
        ],
        ..Default::default()
    })
    .unwrap();
    let bank_b = MockBankServer::start(MockBankConfig {
        products: vec![MockProduct::new("b1", "card", "Beta Card")],
        ..Default::default()
    })
    .unwrap();
    let (ctx, bank_ids) = create_context(&[&bank_a, &bank_b]);

    let products = ctx
        .product_service
        .list(&ProductFilter::default(), None)
        .await
        .unwrap();

    assert_eq!(products.len(), 3);
    let beta = products.iter().find(|p| p.product_id == "b1").unwrap();
    assert_eq!(beta.bank_id, bank_ids[1]);
    assert_eq!(beta.bank_code, "bank2");
    assert_eq!(beta.bank_name, "Bank 2");
    // Decimal strings parsed into native numbers
    assert!((beta.interest_rate - 5.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_failed_token_skips_that_bank_only() {
    let bank_a = MockBankServer::start(MockBankConfig {
        products: vec![MockProduct::new("a1", "deposit", "Alpha Deposit")],
        ..Default::default()
    })
    .unwrap();
    let bank_b = MockBankServer::start(MockBankConfig {
        fail_token: true,
        products: vec![MockProduct::new("b1", "deposit", "Beta Deposit")],
        ..Default::default()
    })
    .unwrap();
    let bank_c = MockBankServer::start(MockBankConfig {
        products: vec![MockProduct::new("c1", "deposit", "Gamma Deposit")],
        ..Default::default()
    })
    .unwrap();
    let (ctx, _) = create_context(&[&bank_a, &bank_b, &bank_c]);

    let products = ctx
        .product_service
        .list(&ProductFilter::default(), None)
        .await
        .expect("a failing bank must not fail the aggregate");

    assert!(!products.is_empty());
    let codes: Vec<&str> = products.iter().map(|p| p.bank_code.as_str()).collect();
    assert!(codes.contains(&"bank1"));
    assert!(codes.contains(&"bank3"));
    assert!(!codes.contains(&"bank2"));
}

#[tokio::test]
async fn test_type_filter_yields_only_matching_products() {
    // Bank A offers 2 cards, bank B offers 1 loan
    let bank_a = MockBankServer::start(MockBankConfig {
        products: vec![
            MockProduct::new("a1", "card", "Gold Card"),
            MockProduct::new("a2", "card", "Silver Card"),
        ],
        ..Default::default()
    })
    .unwrap();
    let bank_b = MockBankServer::start(MockBankConfig {
        products: vec![MockProduct::new("b1", "loan", "Cash Loan")],
        ..Default::default()
    })
    .unwrap();
    let (ctx, _) = create_context(&[&bank_a, &bank_b]);

    let filter = ProductFilter {
        product_type: Some("card".to_string()),
        bank_ids: Vec::new(),
    };
    let products = ctx.product_service.list(&filter, None).await.unwrap();

    assert_eq!(products.len(), 2);
    assert!(products.iter().all(|p| p.product_type == "card"));
    assert!(products.iter().all(|p| p.bank_code == "bank1"));
}

#[tokio::test]
async fn test_bank_id_filter_restricts_fanout() {
    let bank_a = MockBankServer::start(MockBankConfig::default()).unwrap();
    let bank_b = MockBankServer::start(MockBankConfig::default()).unwrap();
    let (ctx, bank_ids) = create_context(&[&bank_a, &bank_b]);

    let filter = ProductFilter {
        product_type: None,
        bank_ids: vec![bank_ids[0]],
    };
    let products = ctx.product_service.list(&filter, None).await.unwrap();

    assert!(!products.is_empty());
    assert!(products.iter().all(|p| p.bank_id == bank_ids[0]));
    assert_eq!(
        bank_b
            .counters()
            .product_lists
            .load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[tokio::test]
async fn test_recommendation_snapshot_marks_matching_products() {
    let server = MockBankServer::start(MockBankConfig {
        products: vec![
            MockProduct::new("p1", "card", "Gold Card"),
            MockProduct::new("p2", "card", "Silver Card"),
        ],
        ..Default::default()
    })
    .unwrap();
    let (ctx, _) = create_context(&[&server]);

    ctx.recommended_service
        .upsert(&RecommendationKey::new("p1", "bank1", "card"))
        .await
        .unwrap();
    // Same product id under a different type must not match
    ctx.recommended_service
        .upsert(&RecommendationKey::new("p2", "bank1", "loan"))
        .await
        .unwrap();

    let products = ctx
        .product_service
        .list(&ProductFilter::default(), None)
        .await
        .unwrap();

    let p1 = products.iter().find(|p| p.product_id == "p1").unwrap();
    let p2 = products.iter().find(|p| p.product_id == "p2").unwrap();
    assert!(p1.is_recommended);
    assert!(!p2.is_recommended);
}
