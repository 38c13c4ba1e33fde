//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod bank_client;
mod repository;

pub use bank_client::{
    BankAccount, BankApiClient, BankProduct, BalanceAmount, ConsentAccess, ConsentRequestReply,
    ConsentView, NewConsentRequest, TokenGrant,
};
pub use repository::{BankDirectory, ConsentStore, RecommendedStore, TokenStore};
