//! CLI command implementations

pub mod accounts;
pub mod banks;
pub mod consents;
pub mod products;
pub mod recommended;
pub mod seed;
pub mod tokens;

use std::path::PathBuf;

use anyhow::{Context, Result};
use multibank_core::MultibankContext;

/// Get the multibank data directory from environment or default
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MULTIBANK_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .expect("Could not find home directory")
            .join(".multibank")
    }
}

/// Get or create the multibank context
pub fn get_context() -> Result<MultibankContext> {
    let data_dir = get_data_dir();

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    MultibankContext::new(&data_dir).context("Failed to initialize multibank context")
}

/// Persist store state after a command that may have mutated it
/// (token refreshes happen implicitly inside aggregation commands too)
pub fn persist(ctx: &MultibankContext) -> Result<()> {
    ctx.storage.persist().context("Failed to persist state")
}
