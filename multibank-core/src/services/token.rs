//! Token service - cached client-credentials tokens per bank
//!
//! Owns one short-lived access token per bank, refreshed through the bank's
//! token endpoint when the cached record comes within the expiry skew. Bulk
//! refresh across all enabled banks runs on a bounded worker pool and never
//! fails the caller because a single bank is down.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Semaphore;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::result::{Error, Result};
use crate::ports::{BankApiClient, BankDirectory, TokenStore};

/// Validity probe result, exposing expiry without the token itself
#[derive(Debug, Clone)]
pub struct TokenStatus {
    pub valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Outcome of a bulk token refresh
#[derive(Debug, Clone, Default)]
pub struct EnsureTokensSummary {
    /// Banks for which a refresh was actually attempted
    pub attempted: usize,
    pub refreshed: usize,
    pub failed: usize,
    /// Banks not attempted because the deadline expired first
    pub skipped: usize,
}

/// Token broker for bank access tokens
#[derive(Clone)]
pub struct TokenService {
    directory: Arc<dyn BankDirectory>,
    tokens: Arc<dyn TokenStore>,
    client: Arc<dyn BankApiClient>,
    expiry_skew: ChronoDuration,
    bank_call_timeout: StdDuration,
}

impl TokenService {
    pub fn new(
        directory: Arc<dyn BankDirectory>,
        tokens: Arc<dyn TokenStore>,
        client: Arc<dyn BankApiClient>,
        config: &Config,
    ) -> Self {
        Self {
            directory,
            tokens,
            client,
            expiry_skew: config.expiry_skew(),
            bank_call_timeout: config.bank_call_timeout(),
        }
    }

    /// Return the cached token while it is still comfortably valid, otherwise
    /// perform a client-credentials exchange and overwrite the cache entry.
    ///
    /// The skew keeps a token from expiring mid-request: a cached record is
    /// reused only while `now + skew < expires_at`.
    pub async fn get_or_refresh(&self, bank_id: i64) -> Result<(String, DateTime<Utc>)> {
        if let Ok(cached) = self.tokens.get(bank_id).await {
            if Utc::now() + self.expiry_skew < cached.expires_at {
                return Ok((cached.access_token, cached.expires_at));
            }
        }

        let bank = self.directory.get_by_id(bank_id).await?;
        let grant = self.client.request_token(&bank).await?;
        if grant.access_token.is_empty() || grant.expires_in <= 0 {
            return Err(Error::upstream("bank-token: invalid response"));
        }

        let expires_at = Utc::now() + ChronoDuration::seconds(grant.expires_in);
        self.tokens
            .upsert(bank_id, &grant.access_token, expires_at)
            .await?;

        info!(bank_id, code = %bank.code, "bank token refreshed");
        Ok((grant.access_token, expires_at))
    }

    /// Whether the bank currently holds a valid cached token, judged with
    /// the same skew as [`get_or_refresh`]. Never exposes the token value and
    /// never fails on a missing record.
    pub async fn token_status(&self, bank_id: i64) -> TokenStatus {
        match self.tokens.get(bank_id).await {
            Ok(token) if !token.access_token.is_empty() => TokenStatus {
                valid: Utc::now() + self.expiry_skew < token.expires_at,
                expires_at: Some(token.expires_at),
            },
            _ => TokenStatus {
                valid: false,
                expires_at: None,
            },
        }
    }

    /// Best-effort bulk refresh across all enabled banks.
    ///
    /// Runs up to `workers` refreshes concurrently, each bounded by the
    /// per-bank call timeout. A failure for one bank is logged and counted,
    /// never propagated. When the deadline expires, no new work is launched
    /// and the partial summary is returned.
    pub async fn ensure_all_enabled(
        &self,
        workers: usize,
        deadline: Option<StdDuration>,
    ) -> Result<EnsureTokensSummary> {
        let banks = self.directory.list_enabled().await?;
        let mut summary = EnsureTokensSummary::default();
        if banks.is_empty() {
            return Ok(summary);
        }

        let deadline = deadline.map(|d| Instant::now() + d);
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let total = banks.len();
        let mut handles = Vec::with_capacity(total);

        for (launched, bank) in banks.into_iter().enumerate() {
            let permit = match acquire_until(&semaphore, deadline).await {
                Some(permit) => permit,
                None => {
                    summary.skipped = total - launched;
                    warn!(skipped = summary.skipped, "bulk token refresh hit deadline");
                    break;
                }
            };

            let service = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let call = timeout(service.bank_call_timeout, service.get_or_refresh(bank.id));
                // None = timed out (per-call or batch deadline), in-flight work abandoned
                let outcome = match deadline {
                    Some(at) => timeout_at(at, call).await.ok().and_then(|inner| inner.ok()),
                    None => call.await.ok(),
                };
                match outcome {
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        warn!(bank_id = bank.id, code = %bank.code, error = %e, "failed to refresh bank token");
                        false
                    }
                    None => {
                        warn!(bank_id = bank.id, code = %bank.code, "bank token refresh timed out");
                        false
                    }
                }
            }));
        }

        for handle in handles {
            match handle.await {
                Ok(true) => summary.refreshed += 1,
                _ => summary.failed += 1,
            }
        }
        summary.attempted = summary.refreshed + summary.failed;
        Ok(summary)
    }
}

/// Acquire a worker slot, giving up once the deadline passes
async fn acquire_until(
    semaphore: &Arc<Semaphore>,
    deadline: Option<Instant>,
) -> Option<tokio::sync::OwnedSemaphorePermit> {
    match deadline {
        Some(at) => timeout_at(at, semaphore.clone().acquire_owned())
            .await
            .ok()?
            .ok(),
        None => semaphore.clone().acquire_owned().await.ok(),
    }
}
