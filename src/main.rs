mod cli;

use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use stockathon::application::services::ledger_service::{
    LedgerService, StartupError, MEMORY_BACKEND_URL,
};
use stockathon::config::LedgerConfig;
use stockathon::domain::services::trade_error::TradeError;
use stockathon::persistence::is_memory_url;
use thiserror::Error;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, InvestorCommand, StockCommand};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error(transparent)]
    Trade(#[from] TradeError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Startup(_) | CliError::Usage(_) => 2,
            CliError::Trade(e) if e.http_status() >= 500 => 4,
            CliError::Trade(_) => 3,
            CliError::Serialization(_) => 5,
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            CliError::Trade(e) => serde_json::json!({ "error": e.to_payload() }),
            CliError::Startup(e) => serde_json::json!({
                "error": { "kind": "startup", "message": e.to_string() }
            }),
            CliError::Serialization(e) => serde_json::json!({
                "error": { "kind": "serialization", "message": e.to_string() }
            }),
            CliError::Usage(message) => serde_json::json!({
                "error": { "kind": "usage", "message": message }
            }),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockathon=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(&cli).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let CliError::Startup(_) | CliError::Serialization(_) = &e {
                error!("{}", e);
            }
            eprintln!("{}", e.to_json());
            ExitCode::from(e.exit_code())
        }
    }
}

fn render<T: Serialize>(value: &T, pretty: bool) -> Result<String, CliError> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(text)
}

/// Each invocation is its own process, so a store that dies with it would
/// forget every investor and stock between commands.
fn ensure_persistent(database_url: &str) -> Result<(), CliError> {
    if database_url == MEMORY_BACKEND_URL || is_memory_url(database_url) {
        return Err(CliError::Usage(format!(
            "database '{}' does not outlive a single command; use a file such as sqlite://data/stockathon.db",
            database_url
        )));
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<String, CliError> {
    let mut config = LedgerConfig::from_env();
    if let Some(url) = &cli.database_url {
        config.database.url = url.clone();
    }
    debug!("Loaded configuration: {:?}", config);
    ensure_persistent(&config.database.url)?;

    let ledger = LedgerService::open(&config).await?;

    match &cli.command {
        Command::Investor(InvestorCommand::Add { name }) => {
            render(&ledger.register_investor(name).await?, cli.pretty)
        }
        Command::Investor(InvestorCommand::List) => {
            render(&ledger.list_investors().await?, cli.pretty)
        }
        Command::Stock(StockCommand::Issue { name, price, shares }) => {
            render(&ledger.issue_stock(name, *price, *shares).await?, cli.pretty)
        }
        Command::Stock(StockCommand::List) => render(&ledger.list_stocks().await?, cli.pretty),
        Command::Buy(args) => render(
            &ledger.buy(&args.investor_id, &args.stock_id, args.shares).await?,
            cli.pretty,
        ),
        Command::Sell(args) => render(
            &ledger.sell(&args.investor_id, &args.stock_id, args.shares).await?,
            cli.pretty,
        ),
        Command::Portfolio(args) => render(&ledger.portfolio(&args.investor_id).await?, cli.pretty),
        Command::Transactions(args) => {
            render(&ledger.transactions(&args.query()).await?, cli.pretty)
        }
    }
}
