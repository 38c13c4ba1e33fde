//! Seed command - upsert banks from settings.json into the directory

use anyhow::Result;

use super::{get_context, persist};
use crate::output;

pub async fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;

    if ctx.config.banks.is_empty() {
        output::warning("No banks configured in settings.json");
        return Ok(());
    }

    let mut seeded = Vec::new();
    for seed in &ctx.config.banks {
        let bank = ctx.storage.upsert_bank(seed)?;
        seeded.push(bank);
    }
    persist(&ctx)?;

    if json {
        let view: Vec<serde_json::Value> = seeded
            .iter()
            .map(|b| {
                serde_json::json!({
                    "id": b.id,
                    "name": b.name,
                    "code": b.code,
                    "apiBaseUrl": b.api_base_url,
                    "enabled": b.is_enabled,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Name", "Code", "Base URL", "Enabled"]);
    for bank in &seeded {
        table.add_row(vec![
            bank.id.to_string(),
            bank.name.clone(),
            bank.code.clone(),
            bank.api_base_url.clone(),
            bank.is_enabled.to_string(),
        ]);
    }
    println!("{}", table);
    output::success(&format!("Seeded {} banks", seeded.len()));
    Ok(())
}
