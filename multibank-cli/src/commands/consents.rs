//! Consents command - consent lifecycle management

use anyhow::Result;
use clap::Subcommand;
use multibank_core::AccountConsent;

use super::{get_context, persist};
use crate::output;

#[derive(Subcommand)]
pub enum ConsentCommands {
    /// Request a new consent at a bank
    Request {
        /// Bank code, e.g. "alpha"
        bank_code: String,
        /// User id the consent belongs to
        #[arg(long)]
        user: i64,
        /// Client login at the bank
        #[arg(long)]
        client_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-check one consent against its bank
    Refresh {
        /// Consent record id
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Refresh a batch of consents that still need attention
    RefreshStale {
        /// Maximum candidates to process (defaults to settings)
        #[arg(long)]
        limit: Option<usize>,
        /// Worker pool size (defaults to settings)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// List a user's consents
    List {
        /// User id
        #[arg(long)]
        user: i64,
        /// Restrict to one bank id
        #[arg(long)]
        bank: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a consent record
    Delete {
        /// Consent record id
        id: i64,
    },
}

pub async fn run(command: ConsentCommands) -> Result<()> {
    match command {
        ConsentCommands::Request {
            bank_code,
            user,
            client_id,
            json,
        } => request(&bank_code, user, &client_id, json).await,
        ConsentCommands::Refresh { id, json } => refresh(id, json).await,
        ConsentCommands::RefreshStale { limit, workers } => refresh_stale(limit, workers).await,
        ConsentCommands::List { user, bank, json } => list(user, bank, json).await,
        ConsentCommands::Delete { id } => delete(id).await,
    }
}

async fn request(bank_code: &str, user: i64, client_id: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let id = ctx.consent_service.request(user, bank_code, client_id).await?;
    let consent = ctx.consent_service.get(id).await?;
    persist(&ctx)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&consent)?);
        return Ok(());
    }
    output::success(&format!(
        "Consent {} created ({}, request {})",
        id, consent.status, consent.request_id
    ));
    Ok(())
}

async fn refresh(id: i64, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let consent = ctx.consent_service.refresh(id).await?;
    persist(&ctx)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&consent)?);
        return Ok(());
    }
    output::success(&format!("Consent {} is now {}", id, consent.status));
    Ok(())
}

async fn refresh_stale(limit: Option<usize>, workers: Option<usize>) -> Result<()> {
    let ctx = get_context()?;
    let limit = limit.unwrap_or(ctx.config.consent_refresh_batch);
    let workers = workers.unwrap_or(ctx.config.consent_refresh_workers);

    let refreshed = ctx.consent_service.refresh_stale(limit, workers, None).await?;
    persist(&ctx)?;

    output::success(&format!("Refreshed {} consents", refreshed));
    Ok(())
}

async fn list(user: i64, bank: Option<i64>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let consents = ctx.consent_service.list_for_user(user, bank).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&consents)?);
        return Ok(());
    }

    if consents.is_empty() {
        output::warning("No consents found");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec![
        "ID",
        "Bank",
        "Status",
        "Consent ID",
        "Auto",
        "Expires",
    ]);
    for consent in &consents {
        table.add_row(consent_row(consent));
    }
    println!("{}", table);
    Ok(())
}

fn consent_row(consent: &AccountConsent) -> Vec<String> {
    vec![
        consent.id.to_string(),
        consent.bank_id.to_string(),
        consent.status.to_string(),
        output::dash_if_empty(consent.consent_id.as_deref().unwrap_or("")),
        consent
            .auto_approved
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string()),
        consent
            .expiration_datetime
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string()),
    ]
}

async fn delete(id: i64) -> Result<()> {
    let ctx = get_context()?;
    ctx.consent_service.delete(id).await?;
    persist(&ctx)?;
    output::success(&format!("Consent {} deleted", id));
    Ok(())
}
