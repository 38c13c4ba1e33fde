//! Recommended-product rule management

use std::sync::Arc;

use crate::domain::result::Result;
use crate::domain::{RecommendationKey, RecommendationRule};
use crate::ports::RecommendedStore;

/// Manages the rules behind the recommendation snapshot
#[derive(Clone)]
pub struct RecommendedService {
    store: Arc<dyn RecommendedStore>,
}

impl RecommendedService {
    pub fn new(store: Arc<dyn RecommendedStore>) -> Self {
        Self { store }
    }

    /// All rules, newest first
    pub async fn list(&self) -> Result<Vec<RecommendationRule>> {
        self.store.list().await
    }

    pub async fn upsert(&self, key: &RecommendationKey) -> Result<()> {
        self.store.upsert(key).await
    }

    pub async fn delete(&self, key: &RecommendationKey) -> Result<()> {
        self.store.delete(key).await
    }
}
