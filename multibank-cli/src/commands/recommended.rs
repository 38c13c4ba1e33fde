//! Recommended command - recommendation rule management

use anyhow::Result;
use clap::Subcommand;
use multibank_core::RecommendationKey;

use super::{get_context, persist};
use crate::output;

#[derive(Subcommand)]
pub enum RecommendedCommands {
    /// List recommendation rules
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a recommendation rule
    Add {
        product_id: String,
        bank_code: String,
        product_type: String,
    },

    /// Remove a recommendation rule
    Remove {
        product_id: String,
        bank_code: String,
        product_type: String,
    },
}

pub async fn run(command: RecommendedCommands) -> Result<()> {
    match command {
        RecommendedCommands::List { json } => list(json).await,
        RecommendedCommands::Add {
            product_id,
            bank_code,
            product_type,
        } => add(product_id, bank_code, product_type).await,
        RecommendedCommands::Remove {
            product_id,
            bank_code,
            product_type,
        } => remove(product_id, bank_code, product_type).await,
    }
}

async fn list(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let rules = ctx.recommended_service.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    if rules.is_empty() {
        output::warning("No recommendation rules");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Product", "Bank", "Type", "Created"]);
    for rule in &rules {
        table.add_row(vec![
            rule.key.product_id.clone(),
            rule.key.bank_code.clone(),
            rule.key.product_type.clone(),
            rule.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}

async fn add(product_id: String, bank_code: String, product_type: String) -> Result<()> {
    let ctx = get_context()?;
    let key = RecommendationKey::new(product_id, bank_code, product_type);
    ctx.recommended_service.upsert(&key).await?;
    persist(&ctx)?;
    output::success("Recommendation rule added");
    Ok(())
}

async fn remove(product_id: String, bank_code: String, product_type: String) -> Result<()> {
    let ctx = get_context()?;
    let key = RecommendationKey::new(product_id, bank_code, product_type);
    ctx.recommended_service.delete(&key).await?;
    persist(&ctx)?;
    output::success("Recommendation rule removed");
    Ok(())
}
