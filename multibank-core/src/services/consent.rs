//! Consent service - data-sharing consent lifecycle
//!
//! Requests a consent per (user, bank, client), normalizes bank-reported
//! statuses into the internal enum, detects auto-approval, and refreshes
//! stale consents in bounded-concurrency batches.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::result::Result;
use crate::domain::{AccountConsent, ConsentStatus, ConsentUpdate, Permission};
use crate::ports::{BankApiClient, BankDirectory, ConsentStore, NewConsentRequest};
use crate::services::TokenService;

/// Consent lifecycle manager
#[derive(Clone)]
pub struct ConsentService {
    consents: Arc<dyn ConsentStore>,
    directory: Arc<dyn BankDirectory>,
    tokens: TokenService,
    client: Arc<dyn BankApiClient>,

    // Fixed requesting-party metadata attached to every request
    permissions: Vec<Permission>,
    requesting_bank: String,
    requesting_bank_name: String,
    reason: String,

    /// Per-item timeout inside batch refresh
    refresh_timeout: StdDuration,
}

impl ConsentService {
    pub fn new(
        consents: Arc<dyn ConsentStore>,
        directory: Arc<dyn BankDirectory>,
        tokens: TokenService,
        client: Arc<dyn BankApiClient>,
        config: &Config,
    ) -> Self {
        Self {
            consents,
            directory,
            tokens,
            client,
            permissions: config.permissions.clone(),
            requesting_bank: config.requesting_bank.clone(),
            requesting_bank_name: config.requesting_bank_name.clone(),
            reason: config.consent_reason.clone(),
            refresh_timeout: config.bank_call_timeout(),
        }
    }

    /// Request a new consent at the bank and persist one record for it,
    /// returning the record id.
    ///
    /// The immediate response status is normalized (the explicit
    /// auto-approval flag wins over the status string). When the bank
    /// auto-approved, the detailed view is fetched right away to populate
    /// the bank-reported dates; a failure there is logged and tolerated, the
    /// consent is still persisted.
    pub async fn request(&self, user_id: i64, bank_code: &str, client_id: &str) -> Result<i64> {
        info!(bank_code, "requesting a new consent");

        let bank = self.directory.get_by_code(bank_code).await?;
        let (token, _) = self.tokens.get_or_refresh(bank.id).await?;

        let request = NewConsentRequest {
            client_id: client_id.to_string(),
            permissions: self.permissions.clone(),
            reason: self.reason.clone(),
            requesting_bank: self.requesting_bank.clone(),
            requesting_bank_name: self.requesting_bank_name.clone(),
        };
        let reply = self.client.request_consent(&bank, &request, &token).await?;

        let mut status = ConsentStatus::normalize(&reply.status, reply.auto_approved);
        let mut consent_id = reply.consent_id.clone();
        let mut creation_datetime = None;
        let mut status_update_datetime = None;
        let mut expiration_datetime = None;

        if reply.auto_approved == Some(true) {
            let key = consent_id
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| reply.request_id.clone());

            match self.tokens.get_or_refresh(bank.id).await {
                Ok((token, _)) => match self
                    .client
                    .get_consent(&bank, &key, &token, &self.requesting_bank)
                    .await
                {
                    Ok(view) => {
                        status = ConsentStatus::normalize(&view.status, None);
                        creation_datetime = view.creation_datetime;
                        status_update_datetime = view.status_update_datetime;
                        expiration_datetime = view.expiration_datetime;
                        if !view.consent_id.is_empty() {
                            consent_id = Some(view.consent_id);
                        }
                    }
                    Err(e) => {
                        warn!(bank_id = bank.id, error = %e, "auto-approved but failed to fetch detailed consent");
                    }
                },
                Err(e) => {
                    warn!(bank_id = bank.id, error = %e, "auto-approved but failed to refresh bank token");
                }
            }
        }

        let now = Utc::now();
        let consent = AccountConsent {
            id: 0,
            user_id,
            bank_id: bank.id,
            request_id: reply.request_id,
            consent_id,
            status,
            auto_approved: reply.auto_approved,
            permissions: self.permissions.clone(),
            reason: self.reason.clone(),
            requesting_bank: self.requesting_bank.clone(),
            requesting_bank_name: self.requesting_bank_name.clone(),
            client_id: client_id.to_string(),
            creation_datetime,
            status_update_datetime,
            expiration_datetime,
            created_at: now,
            updated_at: now,
        };
        self.consents.create(&consent).await
    }

    /// Re-check one consent against the bank and overwrite status, consent
    /// id (if newly known), and the bank-reported dates.
    ///
    /// Returns the freshly reloaded record, not the in-memory patch, so the
    /// caller sees exactly what is stored.
    pub async fn refresh(&self, id: i64) -> Result<AccountConsent> {
        let consent = self.consents.get_by_id(id).await?;
        let bank = self.directory.get_by_id(consent.bank_id).await?;
        let (token, _) = self.tokens.get_or_refresh(bank.id).await?;

        let view = self
            .client
            .get_consent(&bank, consent.lookup_key(), &token, &self.requesting_bank)
            .await?;

        let update = ConsentUpdate {
            consent_id: Some(view.consent_id).filter(|c| !c.is_empty()),
            status: Some(ConsentStatus::normalize(&view.status, None)),
            auto_approved: None,
            creation_datetime: view.creation_datetime,
            status_update_datetime: view.status_update_datetime,
            expiration_datetime: view.expiration_datetime,
        };
        self.consents.update_after_check(id, &update).await?;
        self.consents.get_by_id(id).await
    }

    pub async fn get(&self, id: i64) -> Result<AccountConsent> {
        self.consents.get_by_id(id).await
    }

    pub async fn list_for_user(
        &self,
        user_id: i64,
        bank_id: Option<i64>,
    ) -> Result<Vec<AccountConsent>> {
        self.consents.list_by_user(user_id, bank_id).await
    }

    /// Delete the local record. The bank-side consent is left to expire;
    /// revocation through the bank API is not part of this surface.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.consents.delete_by_id(id).await
    }

    /// Refresh up to `batch_limit` consents that still need attention, using
    /// a bounded worker pool. Each worker's failure is logged and counted as
    /// zero; the total number of successfully refreshed consents is
    /// returned. When the deadline expires, no new work is launched and the
    /// partial count is returned.
    pub async fn refresh_stale(
        &self,
        batch_limit: usize,
        workers: usize,
        deadline: Option<StdDuration>,
    ) -> Result<usize> {
        let items = self.consents.list_needing_refresh(batch_limit.max(1)).await?;
        if items.is_empty() {
            return Ok(0);
        }

        let deadline = deadline.map(|d| Instant::now() + d);
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let mut handles = Vec::with_capacity(items.len());

        for item in items {
            let permit = match deadline {
                Some(at) => match timeout_at(at, semaphore.clone().acquire_owned()).await {
                    Ok(Ok(permit)) => permit,
                    _ => {
                        warn!("stale consent refresh hit deadline");
                        break;
                    }
                },
                None => match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let service = self.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let call = timeout(service.refresh_timeout, service.refresh(item.id));
                let outcome = match deadline {
                    Some(at) => timeout_at(at, call).await.ok().and_then(|inner| inner.ok()),
                    None => call.await.ok(),
                };
                match outcome {
                    Some(Ok(_)) => true,
                    Some(Err(e)) => {
                        warn!(id = item.id, error = %e, "consent refresh failed");
                        false
                    }
                    None => {
                        warn!(id = item.id, "consent refresh timed out");
                        false
                    }
                }
            }));
        }

        let mut refreshed = 0;
        for handle in handles {
            if let Ok(true) = handle.await {
                refreshed += 1;
            }
        }
        Ok(refreshed)
    }
}
