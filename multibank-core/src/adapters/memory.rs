//! In-memory store adapter
//!
//! Implements every repository port against process-local state, optionally
//! snapshotted to a JSON file so bank rows, cached tokens, and consents
//! survive restarts. A SQL-backed adapter can replace this behind the same
//! ports without touching the services.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BankSeed;
use crate::domain::result::{Error, Result};
use crate::domain::{
    AccountConsent, Bank, BankToken, ConsentStatus, ConsentUpdate, RecommendationKey,
    RecommendationRule,
};
use crate::ports::{BankDirectory, ConsentStore, RecommendedStore, TokenStore};

/// Serialized store state
#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    banks: Vec<Bank>,
    tokens: HashMap<i64, BankToken>,
    consents: BTreeMap<i64, AccountConsent>,
    recommended: Vec<RecommendationRule>,
    next_bank_id: i64,
    next_consent_id: i64,
}

/// In-memory repository backing all store ports
pub struct MemoryStore {
    state: RwLock<State>,
    path: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with no backing file
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            path: None,
        }
    }

    /// Open a store backed by `state.json` under the data directory,
    /// restoring any previously persisted snapshot
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("state.json");
        let state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            State::default()
        };
        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    /// Write the current snapshot to the backing file, if any
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let content = {
            let state = self.read()?;
            serde_json::to_string_pretty(&*state)?
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Insert or update a bank from a seed entry, matched by code.
    /// Administrative operation, deliberately not part of the directory port.
    pub fn upsert_bank(&self, seed: &BankSeed) -> Result<Bank> {
        let mut state = self.write()?;
        let now = Utc::now();

        if let Some(existing) = state.banks.iter_mut().find(|b| b.code == seed.code) {
            existing.name = seed.name.clone();
            existing.api_base_url = seed.api_base_url.clone();
            existing.client_id = seed.client_id.clone();
            existing.client_secret = seed.client_secret.clone();
            existing.is_enabled = seed.enabled;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        state.next_bank_id += 1;
        let bank = Bank {
            id: state.next_bank_id,
            name: seed.name.clone(),
            code: seed.code.clone(),
            api_base_url: seed.api_base_url.clone(),
            client_id: seed.client_id.clone(),
            client_secret: seed.client_secret.clone(),
            is_enabled: seed.enabled,
            created_at: now,
            updated_at: now,
        };
        bank.validate().map_err(Error::config)?;
        state.banks.push(bank.clone());
        Ok(bank)
    }

    /// All banks, including disabled ones (for administrative listings)
    pub fn list_all_banks(&self) -> Result<Vec<Bank>> {
        Ok(self.read()?.banks.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| Error::storage("state lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| Error::storage("state lock poisoned"))
    }
}

#[async_trait]
impl BankDirectory for MemoryStore {
    async fn list_enabled(&self) -> Result<Vec<Bank>> {
        let state = self.read()?;
        Ok(state
            .banks
            .iter()
            .filter(|b| b.is_enabled)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: i64) -> Result<Bank> {
        let state = self.read()?;
        state
            .banks
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("bank {}", id)))
    }

    async fn get_by_code(&self, code: &str) -> Result<Bank> {
        let state = self.read()?;
        state
            .banks
            .iter()
            .find(|b| b.code == code)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("bank with code '{}'", code)))
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn upsert(&self, bank_id: i64, token: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let mut state = self.write()?;
        let now = Utc::now();
        let created_at = state
            .tokens
            .get(&bank_id)
            .map(|t| t.created_at)
            .unwrap_or(now);
        state.tokens.insert(
            bank_id,
            BankToken {
                bank_id,
                access_token: token.to_string(),
                expires_at,
                created_at,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn get(&self, bank_id: i64) -> Result<BankToken> {
        let state = self.read()?;
        state
            .tokens
            .get(&bank_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("token for bank {}", bank_id)))
    }
}

#[async_trait]
impl ConsentStore for MemoryStore {
    async fn create(&self, consent: &AccountConsent) -> Result<i64> {
        let mut state = self.write()?;
        state.next_consent_id += 1;
        let id = state.next_consent_id;
        let mut record = consent.clone();
        record.id = id;
        state.consents.insert(id, record);
        Ok(id)
    }

    async fn update_after_check(&self, id: i64, update: &ConsentUpdate) -> Result<()> {
        let mut state = self.write()?;
        let record = state
            .consents
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("consent {}", id)))?;

        // Coalesce semantics: an assigned consent id is never cleared
        if let Some(cid) = &update.consent_id {
            if !cid.is_empty() {
                record.consent_id = Some(cid.clone());
            }
        }
        if let Some(status) = &update.status {
            record.status = status.clone();
        }
        if let Some(auto) = update.auto_approved {
            record.auto_approved = Some(auto);
        }
        if let Some(dt) = update.creation_datetime {
            record.creation_datetime = Some(dt);
        }
        if let Some(dt) = update.status_update_datetime {
            record.status_update_datetime = Some(dt);
        }
        if let Some(dt) = update.expiration_datetime {
            record.expiration_datetime = Some(dt);
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn get_by_id(&self, id: i64) -> Result<AccountConsent> {
        let state = self.read()?;
        state
            .consents
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("consent {}", id)))
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        bank_id: Option<i64>,
    ) -> Result<Vec<AccountConsent>> {
        let state = self.read()?;
        Ok(state
            .consents
            .values()
            .filter(|c| c.user_id == user_id)
            .filter(|c| bank_id.map_or(true, |id| c.bank_id == id))
            .cloned()
            .collect())
    }

    async fn delete_by_id(&self, id: i64) -> Result<()> {
        let mut state = self.write()?;
        state
            .consents
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("consent {}", id)))
    }

    async fn list_needing_refresh(&self, limit: usize) -> Result<Vec<AccountConsent>> {
        let state = self.read()?;
        // Non-terminal consents that are still awaiting authorisation, carry
        // an unmapped status, or lack an external consent id.
        let mut due: Vec<AccountConsent> = state
            .consents
            .values()
            .filter(|c| !c.status.is_terminal())
            .filter(|c| {
                matches!(
                    c.status,
                    ConsentStatus::AwaitingAuthorisation | ConsentStatus::Other(_)
                ) || c.consent_id.as_deref().map_or(true, str::is_empty)
            })
            .cloned()
            .collect();
        due.sort_by_key(|c| c.updated_at);
        due.truncate(limit);
        Ok(due)
    }
}

#[async_trait]
impl RecommendedStore for MemoryStore {
    async fn snapshot(&self) -> Result<HashSet<RecommendationKey>> {
        let state = self.read()?;
        Ok(state.recommended.iter().map(|r| r.key.clone()).collect())
    }

    async fn list(&self) -> Result<Vec<RecommendationRule>> {
        let state = self.read()?;
        let mut rules = state.recommended.clone();
        rules.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rules)
    }

    async fn upsert(&self, key: &RecommendationKey) -> Result<()> {
        let mut state = self.write()?;
        if state.recommended.iter().any(|r| &r.key == key) {
            return Ok(());
        }
        state.recommended.push(RecommendationRule {
            key: key.clone(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn delete(&self, key: &RecommendationKey) -> Result<()> {
        let mut state = self.write()?;
        let before = state.recommended.len();
        state.recommended.retain(|r| &r.key != key);
        if state.recommended.len() == before {
            return Err(Error::not_found(format!(
                "recommendation {}/{}/{}",
                key.product_id, key.bank_code, key.product_type
            )));
        }
        Ok(())
    }
}
