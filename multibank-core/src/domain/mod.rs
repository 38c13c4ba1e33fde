//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod bank;
mod consent;
mod product;
pub mod result;

pub use account::AccountSummary;
pub use bank::{Bank, BankToken};
pub use consent::{AccountConsent, ConsentStatus, ConsentUpdate, Permission};
pub use product::{
    parse_amount_or_zero, Product, ProductFilter, RecommendationKey, RecommendationRule,
};
