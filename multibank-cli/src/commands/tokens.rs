//! Tokens command - bulk access-token refresh

use anyhow::Result;
use clap::Subcommand;

use super::{get_context, persist};
use crate::output;

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Refresh tokens for all enabled banks (best-effort)
    Refresh {
        /// Worker pool size (defaults to settings)
        #[arg(long)]
        workers: Option<usize>,
        /// Overall deadline in seconds (partial results on expiry)
        #[arg(long)]
        deadline: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(command: TokenCommands) -> Result<()> {
    match command {
        TokenCommands::Refresh {
            workers,
            deadline,
            json,
        } => refresh(workers, deadline, json).await,
    }
}

async fn refresh(workers: Option<usize>, deadline: Option<u64>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let workers = workers.unwrap_or(ctx.config.token_refresh_workers);
    let deadline = deadline.map(std::time::Duration::from_secs);

    let summary = ctx
        .token_service
        .ensure_all_enabled(workers, deadline)
        .await?;
    persist(&ctx)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "attempted": summary.attempted,
                "refreshed": summary.refreshed,
                "failed": summary.failed,
                "skipped": summary.skipped,
            }))?
        );
        return Ok(());
    }

    if summary.failed > 0 {
        output::warning(&format!(
            "Refreshed {} of {} bank tokens ({} failed, {} skipped)",
            summary.refreshed, summary.attempted, summary.failed, summary.skipped
        ));
    } else {
        output::success(&format!(
            "Refreshed {} bank tokens",
            summary.refreshed
        ));
    }
    Ok(())
}
