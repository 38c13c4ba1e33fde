//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
mod consent;
mod product;
mod recommended;
mod scheduler;
mod token;

pub use account::AccountService;
pub use consent::ConsentService;
pub use product::ProductService;
pub use recommended::RecommendedService;
pub use scheduler::{RefreshOptions, RefreshScheduler};
pub use token::{EnsureTokensSummary, TokenService, TokenStatus};
