//! Banks command - list banks with token status

use anyhow::Result;

use super::get_context;
use crate::output;

pub async fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let banks = ctx.storage.list_all_banks()?;

    if banks.is_empty() {
        output::warning("No banks configured. Use 'mb seed' to add some.");
        return Ok(());
    }

    let mut rows = Vec::with_capacity(banks.len());
    for bank in &banks {
        let status = ctx.token_service.token_status(bank.id).await;
        rows.push((bank, status));
    }

    if json {
        let view: Vec<serde_json::Value> = rows
            .iter()
            .map(|(b, s)| {
                serde_json::json!({
                    "id": b.id,
                    "name": b.name,
                    "code": b.code,
                    "apiBaseUrl": b.api_base_url,
                    "enabled": b.is_enabled,
                    "tokenValid": s.valid,
                    "tokenExpiresAt": s.expires_at.map(|t| t.to_rfc3339()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Name", "Code", "Enabled", "Token", "Expires"]);
    for (bank, status) in &rows {
        table.add_row(vec![
            bank.id.to_string(),
            bank.name.clone(),
            bank.code.clone(),
            bank.is_enabled.to_string(),
            if status.valid { "valid" } else { "missing/expired" }.to_string(),
            status
                .expires_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{}", table);
    Ok(())
}
