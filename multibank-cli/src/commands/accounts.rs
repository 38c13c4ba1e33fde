//! Accounts command - aggregated account listing

use anyhow::Result;

use super::{get_context, persist};
use crate::output;

pub async fn run(user: i64, bank: Option<i64>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let accounts = ctx.account_service.list_user_accounts(user, bank).await?;
    persist(&ctx)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
        return Ok(());
    }

    if accounts.is_empty() {
        output::warning("No accounts found (missing or unauthorised consents?)");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec![
        "Bank", "Account", "Nickname", "Type", "Status", "Balance", "Currency",
    ]);
    for account in &accounts {
        table.add_row(vec![
            account.bank_code.clone(),
            account.account_id.clone(),
            output::dash_if_empty(&account.nickname),
            output::dash_if_empty(&account.account_sub_type),
            output::dash_if_empty(&account.status),
            output::dash_if_empty(&account.amount),
            output::dash_if_empty(&account.currency),
        ]);
    }
    println!("{}", table);
    Ok(())
}
