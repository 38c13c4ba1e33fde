//! Adapter implementations for the core ports
//!
//! Concrete implementations of the repository and bank-client ports: the
//! in-memory (optionally file-backed) store, the reqwest Open Banking
//! client, and a mock bank server for tests.

pub mod memory;
pub mod mock_bank;
pub mod openbanking;

pub use memory::MemoryStore;
pub use mock_bank::{MockBankConfig, MockBankServer, MockProduct};
pub use openbanking::{normalize_base_url, OpenBankingClient};
