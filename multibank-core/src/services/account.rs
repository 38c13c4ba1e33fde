//! Account service - aggregated account listing across banks
//!
//! Collects accounts under the user's consents. A bank-level failure (bank
//! lookup, token, or account listing) skips that consent entirely; a
//! balance failure for one account still emits the account with blank
//! amount/currency. A bank outage therefore degrades the merged listing
//! instead of failing the whole request.

use std::sync::Arc;

use tracing::warn;

use crate::domain::result::Result;
use crate::domain::AccountSummary;
use crate::ports::{BankApiClient, BankDirectory, ConsentAccess, ConsentStore};
use crate::services::TokenService;

/// Aggregated account listing service
#[derive(Clone)]
pub struct AccountService {
    consents: Arc<dyn ConsentStore>,
    directory: Arc<dyn BankDirectory>,
    tokens: TokenService,
    client: Arc<dyn BankApiClient>,
}

impl AccountService {
    pub fn new(
        consents: Arc<dyn ConsentStore>,
        directory: Arc<dyn BankDirectory>,
        tokens: TokenService,
        client: Arc<dyn BankApiClient>,
    ) -> Self {
        Self {
            consents,
            directory,
            tokens,
            client,
        }
    }

    /// Collect accounts for every usable consent of the user, optionally
    /// limited to one bank. Within a bank, the account listing completes
    /// before that bank's balance calls.
    pub async fn list_user_accounts(
        &self,
        user_id: i64,
        bank_id: Option<i64>,
    ) -> Result<Vec<AccountSummary>> {
        let consents = self.consents.list_by_user(user_id, bank_id).await?;
        let mut out = Vec::with_capacity(16);

        for consent in consents {
            // Not usable until the bank has assigned a consent id
            let Some(consent_id) = consent.consent_id.clone().filter(|c| !c.is_empty()) else {
                continue;
            };

            let bank = match self.directory.get_by_id(consent.bank_id).await {
                Ok(bank) => bank,
                Err(e) => {
                    warn!(bank_id = consent.bank_id, error = %e, "get bank failed");
                    continue;
                }
            };
            let token = match self.tokens.get_or_refresh(bank.id).await {
                Ok((token, _)) => token,
                Err(e) => {
                    warn!(bank_id = bank.id, error = %e, "get token failed");
                    continue;
                }
            };

            let access = ConsentAccess {
                client_id: consent.client_id.clone(),
                bearer: token,
                consent_id,
                requesting_bank: consent.requesting_bank.clone(),
            };

            let accounts = match self.client.list_accounts(&bank, &access).await {
                Ok(accounts) => accounts,
                Err(e) => {
                    warn!(bank_id = bank.id, error = %e, "list accounts failed");
                    continue;
                }
            };

            for account in accounts {
                let balance = match self
                    .client
                    .get_interim_available_balance(&bank, &account.account_id, &access)
                    .await
                {
                    Ok(balance) => balance,
                    Err(e) => {
                        // Emit the account anyway, with blank amount/currency
                        warn!(
                            bank_id = bank.id,
                            account_id = %account.account_id,
                            error = %e,
                            "get balance failed"
                        );
                        Default::default()
                    }
                };

                out.push(AccountSummary {
                    account_id: account.account_id,
                    nickname: account.nickname,
                    status: account.status,
                    account_sub_type: account.account_sub_type,
                    opening_date: account.opening_date,
                    amount: balance.amount,
                    currency: balance.currency,
                    bank_code: bank.code.clone(),
                    client_id: consent.client_id.clone(),
                });
            }
        }
        Ok(out)
    }
}
