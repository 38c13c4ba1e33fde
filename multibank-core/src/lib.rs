//! Multibank Core - business logic for Open Banking account aggregation
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Bank, AccountConsent, Product, etc.)
//! - **ports**: Trait definitions for external dependencies (stores, BankApiClient)
//! - **services**: Business logic orchestration (token broker, consent
//!   lifecycle, bounded-concurrency aggregation)
//! - **adapters**: Concrete implementations (in-memory store, Open Banking
//!   HTTP client, mock bank server)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use adapters::{MemoryStore, OpenBankingClient};
use config::Config;
use ports::BankApiClient;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result};
pub use domain::{
    AccountConsent, AccountSummary, Bank, BankToken, ConsentStatus, Permission, Product,
    ProductFilter, RecommendationKey,
};

/// Main context for Multibank operations
///
/// This is the primary entry point for all business logic. It holds the
/// configuration, the backing store, and all services.
pub struct MultibankContext {
    pub config: Config,
    pub storage: Arc<MemoryStore>,
    pub token_service: TokenService,
    pub consent_service: ConsentService,
    pub account_service: AccountService,
    pub product_service: ProductService,
    pub recommended_service: RecommendedService,
}

impl MultibankContext {
    /// Create a context backed by the data directory (settings.json +
    /// state.json) and a live HTTP client
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let storage = Arc::new(MemoryStore::open(data_dir)?);
        let client = Arc::new(OpenBankingClient::new(config.http_timeout())?);
        Ok(Self::with_parts(config, storage, client))
    }

    /// Wire the services around an explicit store and bank client.
    /// Used by tests to substitute trait-level or mock-server clients.
    pub fn with_parts(
        config: Config,
        storage: Arc<MemoryStore>,
        client: Arc<dyn BankApiClient>,
    ) -> Self {
        let token_service =
            TokenService::new(storage.clone(), storage.clone(), client.clone(), &config);
        let consent_service = ConsentService::new(
            storage.clone(),
            storage.clone(),
            token_service.clone(),
            client.clone(),
            &config,
        );
        let account_service = AccountService::new(
            storage.clone(),
            storage.clone(),
            token_service.clone(),
            client.clone(),
        );
        let product_service = ProductService::new(
            storage.clone(),
            storage.clone(),
            token_service.clone(),
            client,
            &config,
        );
        let recommended_service = RecommendedService::new(storage.clone());

        Self {
            config,
            storage,
            token_service,
            consent_service,
            account_service,
            product_service,
            recommended_service,
        }
    }

    /// Start the background token/consent refresher for this context
    pub fn start_refresher(&self) -> RefreshScheduler {
        RefreshScheduler::start(
            self.token_service.clone(),
            self.consent_service.clone(),
            RefreshOptions::from_config(&self.config),
        )
    }
}
