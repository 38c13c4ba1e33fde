//! Background refresher - periodic token and consent maintenance
//!
//! Runs the same bounded-concurrency, per-item-failure-tolerant batch calls
//! as the on-demand APIs on a fixed interval. The task is owned: it carries
//! an explicit stop signal and is awaited on shutdown rather than detached.

use std::time::Duration as StdDuration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::config::Config;
use crate::services::{ConsentService, TokenService};

/// Scheduling knobs for the refresher
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    pub interval: StdDuration,
    pub token_workers: usize,
    pub consent_workers: usize,
    pub consent_batch: usize,
}

impl RefreshOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.refresh_interval(),
            token_workers: config.token_refresh_workers,
            consent_workers: config.consent_refresh_workers,
            consent_batch: config.consent_refresh_batch,
        }
    }
}

/// Handle to the running background refresher
pub struct RefreshScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Start the refresher. The first pass runs immediately; each later pass
    /// runs one interval apart and gets half the interval as its deadline.
    pub fn start(tokens: TokenService, consents: ConsentService, options: RefreshOptions) -> Self {
        let (shutdown, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(options.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let deadline = Some(options.interval / 2);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match tokens.ensure_all_enabled(options.token_workers, deadline).await {
                            Ok(summary) => info!(
                                refreshed = summary.refreshed,
                                failed = summary.failed,
                                skipped = summary.skipped,
                                "scheduled bank token ensure"
                            ),
                            Err(e) => warn!(error = %e, "scheduled bank token ensure failed"),
                        }
                        match consents
                            .refresh_stale(options.consent_batch, options.consent_workers, deadline)
                            .await
                        {
                            Ok(count) => info!(refreshed = count, "scheduled consent refresh"),
                            Err(e) => warn!(error = %e, "scheduled consent refresh failed"),
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            info!("refresh scheduler stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the task to stop and wait for the in-progress pass to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapters::{MemoryStore, MockBankConfig, MockBankServer};
    use crate::config::BankSeed;
    use crate::adapters::OpenBankingClient;
    use crate::ports::TokenStore;

    #[tokio::test]
    async fn test_scheduler_refreshes_on_start_and_stops() {
        let server = MockBankServer::start(MockBankConfig::default()).unwrap();
        let store = Arc::new(MemoryStore::new());
        let bank = store
            .upsert_bank(&BankSeed {
                name: "Mock Bank".into(),
                code: "mock".into(),
                api_base_url: server.base_url(),
                client_id: "client".into(),
                client_secret: "secret".into(),
                enabled: true,
            })
            .unwrap();

        let config = crate::config::Config::default();
        let client = Arc::new(OpenBankingClient::new(config.http_timeout()).unwrap());
        let tokens = TokenService::new(store.clone(), store.clone(), client.clone(), &config);
        let consents =
            ConsentService::new(store.clone(), store.clone(), tokens.clone(), client, &config);

        let scheduler = RefreshScheduler::start(
            tokens,
            consents,
            RefreshOptions {
                interval: StdDuration::from_secs(60),
                token_workers: 2,
                consent_workers: 2,
                consent_batch: 10,
            },
        );

        // The first pass fires immediately; poll until the token lands
        let mut refreshed = false;
        for _ in 0..50 {
            if TokenStore::get(store.as_ref(), bank.id).await.is_ok() {
                refreshed = true;
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(20)).await;
        }
        assert!(refreshed, "scheduler should refresh the token on start");

        // Stop must return promptly even with a long interval remaining
        scheduler.stop().await;
    }
}
