//! Product service - concurrent product aggregation across banks
//!
//! Fans one logical request out to every relevant bank on a
//! concurrency-bounded task group, tolerates individual bank failures, and
//! merges the per-bank results. Matching products are marked against a
//! point-in-time snapshot of explicitly recommended keys; the snapshot read
//! is independent of the fan-out, so a rule added mid-aggregation may or
//! may not be reflected.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::warn;

use crate::config::Config;
use crate::domain::result::Result;
use crate::domain::{parse_amount_or_zero, Product, ProductFilter};
use crate::ports::{BankApiClient, BankDirectory, RecommendedStore};
use crate::services::TokenService;

/// Product aggregation service
#[derive(Clone)]
pub struct ProductService {
    directory: Arc<dyn BankDirectory>,
    recommended: Arc<dyn RecommendedStore>,
    tokens: TokenService,
    client: Arc<dyn BankApiClient>,
    fanout: usize,
    bank_call_timeout: StdDuration,
}

impl ProductService {
    pub fn new(
        directory: Arc<dyn BankDirectory>,
        recommended: Arc<dyn RecommendedStore>,
        tokens: TokenService,
        client: Arc<dyn BankApiClient>,
        config: &Config,
    ) -> Self {
        Self {
            directory,
            recommended,
            tokens,
            client,
            fanout: config.product_fanout.max(1),
            bank_call_timeout: config.bank_call_timeout(),
        }
    }

    /// Aggregate products from all enabled banks, optionally restricted to a
    /// bank id set and product type. Bank failures (token or catalogue) are
    /// logged and skip that bank only. When the deadline expires, in-flight
    /// bank calls are abandoned and the partial result is returned.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        deadline: Option<StdDuration>,
    ) -> Result<Vec<Product>> {
        let mut banks = self.directory.list_enabled().await?;
        if !filter.bank_ids.is_empty() {
            let wanted: HashSet<i64> = filter.bank_ids.iter().copied().collect();
            banks.retain(|b| wanted.contains(&b.id));
        }

        let deadline = deadline.map(|d| Instant::now() + d);
        let semaphore = Arc::new(Semaphore::new(self.fanout));
        let mut handles = Vec::with_capacity(banks.len());

        for bank in banks {
            let permit = match deadline {
                Some(at) => match timeout_at(at, semaphore.clone().acquire_owned()).await {
                    Ok(Ok(permit)) => permit,
                    _ => {
                        warn!("product fan-out hit deadline");
                        break;
                    }
                },
                None => match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let service = self.clone();
            let product_type = filter.product_type.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let fetch = timeout(
                    service.bank_call_timeout,
                    service.fetch_bank_products(&bank, product_type.as_deref()),
                );
                match deadline {
                    Some(at) => timeout_at(at, fetch)
                        .await
                        .ok()
                        .and_then(|inner| inner.ok())
                        .unwrap_or_default(),
                    None => fetch.await.unwrap_or_default(),
                }
            }));
        }

        // Per-task local buffers, concatenated after all tasks join
        let mut out: Vec<Product> = Vec::new();
        for handle in handles {
            if let Ok(products) = handle.await {
                out.extend(products);
            }
        }

        // Mark recommended products from a snapshot taken after the fan-out;
        // a snapshot failure degrades to "nothing recommended"
        let snapshot = match self.recommended.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "recommended snapshot failed");
                HashSet::new()
            }
        };
        for product in &mut out {
            if snapshot.contains(&product.recommendation_key()) {
                product.is_recommended = true;
            }
        }

        Ok(out)
    }

    /// One bank's contribution; failures are absorbed here so the fan-out
    /// only ever merges successes
    async fn fetch_bank_products(
        &self,
        bank: &crate::domain::Bank,
        product_type: Option<&str>,
    ) -> Vec<Product> {
        let token = match self.tokens.get_or_refresh(bank.id).await {
            Ok((token, _)) => token,
            Err(e) => {
                warn!(bank_id = bank.id, code = %bank.code, error = %e, "cannot get token for products");
                return Vec::new();
            }
        };

        let items = match self.client.list_products(bank, &token, product_type).await {
            Ok(items) => items,
            Err(e) => {
                warn!(bank_id = bank.id, code = %bank.code, error = %e, "products fetch failed");
                return Vec::new();
            }
        };

        let fetched_at = Utc::now();
        items
            .into_iter()
            .map(|item| Product {
                product_id: item.product_id,
                product_type: item.product_type,
                product_name: item.product_name,
                description: item.description.unwrap_or_default(),
                interest_rate: parse_amount_or_zero(item.interest_rate.as_deref()),
                min_amount: parse_amount_or_zero(item.min_amount.as_deref()),
                max_amount: parse_amount_or_zero(item.max_amount.as_deref()),
                term_months: item.term_months.unwrap_or(0),
                bank_id: bank.id,
                bank_code: bank.code.clone(),
                bank_name: bank.name.clone(),
                fetched_at,
                is_recommended: false,
            })
            .collect()
    }
}
