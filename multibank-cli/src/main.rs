//! Multibank CLI - Open Banking aggregation in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{accounts, banks, consents, products, recommended, seed, tokens};

/// Multibank - aggregate accounts, consents and products across banks
#[derive(Parser)]
#[command(name = "mb", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed banks from settings.json into the directory
    Seed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List banks and their token status
    Banks {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage bank access tokens
    Tokens {
        #[command(subcommand)]
        command: tokens::TokenCommands,
    },

    /// Manage data-sharing consents
    Consents {
        #[command(subcommand)]
        command: consents::ConsentCommands,
    },

    /// List aggregated accounts for a user
    Accounts {
        /// User id to aggregate for
        #[arg(long)]
        user: i64,
        /// Restrict to one bank id
        #[arg(long)]
        bank: Option<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List aggregated products across banks
    Products {
        /// Restrict to one product type (deposit, loan, card, account)
        #[arg(long = "type")]
        product_type: Option<String>,
        /// Restrict to these bank ids
        #[arg(long, value_delimiter = ',')]
        banks: Vec<i64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage recommended-product rules
    Recommended {
        #[command(subcommand)]
        command: recommended::RecommendedCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Seed { json } => seed::run(json).await,
        Commands::Banks { json } => banks::run(json).await,
        Commands::Tokens { command } => tokens::run(command).await,
        Commands::Consents { command } => consents::run(command).await,
        Commands::Accounts { user, bank, json } => accounts::run(user, bank, json).await,
        Commands::Products {
            product_type,
            banks,
            json,
        } => products::run(product_type, banks, json).await,
        Commands::Recommended { command } => recommended::run(command).await,
    }
}
