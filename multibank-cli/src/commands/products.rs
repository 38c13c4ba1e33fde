//! Products command - aggregated product listing

use anyhow::Result;
use multibank_core::ProductFilter;

use super::{get_context, persist};
use crate::output;

pub async fn run(product_type: Option<String>, banks: Vec<i64>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let filter = ProductFilter {
        product_type,
        bank_ids: banks,
    };
    let products = ctx.product_service.list(&filter, None).await?;
    persist(&ctx)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&products)?);
        return Ok(());
    }

    if products.is_empty() {
        output::warning("No products returned by any bank");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec![
        "Bank", "Product", "Type", "Name", "Rate", "Min", "Max", "Months", "Rec",
    ]);
    for product in &products {
        table.add_row(vec![
            product.bank_code.clone(),
            product.product_id.clone(),
            product.product_type.clone(),
            product.product_name.clone(),
            format!("{:.2}", product.interest_rate),
            format!("{:.0}", product.min_amount),
            format!("{:.0}", product.max_amount),
            product.term_months.to_string(),
            if product.is_recommended { "*" } else { "" }.to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}
