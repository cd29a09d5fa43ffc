//! CLI argument definitions for Stockathon.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `investor add|list` | Register or list investors |
//! | `stock issue|list` | Issue or list stocks |
//! | `buy` | Buy shares at the current price |
//! | `sell` | Sell held shares at the current price |
//! | `portfolio` | Holdings valued at current prices |
//! | `transactions` | Query the transaction log |
//!
//! # Examples
//!
//! ```bash
//! stockathon investor add alice
//! stockathon stock issue Acme --price 100 --shares 1000
//! stockathon buy <investor-id> <stock-id> 10
//! stockathon transactions --investor <investor-id> --type sell --desc --limit 5
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use stockathon::domain::entities::transaction::TradeType;
use stockathon::domain::repositories::ledger_store::TransactionQuery;

/// Stockathon - stock market simulation ledger
#[derive(Debug, Parser)]
#[command(name = "stockathon", author, version, about = "Stock market simulation ledger")]
pub struct Cli {
    /// SQLite database URL; overrides DATABASE_URL. Must name a file, since
    /// every command runs in its own process.
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage investors.
    #[command(subcommand)]
    Investor(InvestorCommand),

    /// Manage stocks.
    #[command(subcommand)]
    Stock(StockCommand),

    /// Buy shares of a stock.
    ///
    ///   stockathon buy <investor-id> <stock-id> 10
    Buy(TradeArgs),

    /// Sell shares of a stock.
    Sell(TradeArgs),

    /// Show an investor's holdings valued at current prices.
    Portfolio(PortfolioArgs),

    /// Query the transaction log.
    Transactions(TransactionsArgs),
}

#[derive(Debug, Subcommand)]
pub enum InvestorCommand {
    /// Register an investor with the default opening balance.
    Add {
        name: String,
    },
    /// List all investors.
    List,
}

#[derive(Debug, Subcommand)]
pub enum StockCommand {
    /// Issue a new stock.
    Issue {
        name: String,

        /// Opening price per share (defaults to DEFAULT_STOCK_PRICE).
        #[arg(long)]
        price: Option<f64>,

        /// Shares to issue (defaults to DEFAULT_STOCK_SHARES).
        #[arg(long)]
        shares: Option<u64>,
    },
    /// List all stocks.
    List,
}

/// Arguments for the `buy` and `sell` commands.
#[derive(Debug, Args)]
pub struct TradeArgs {
    pub investor_id: String,

    pub stock_id: String,

    /// Number of shares; must be a positive integer.
    #[arg(allow_negative_numbers = true)]
    pub shares: i64,
}

#[derive(Debug, Args)]
pub struct PortfolioArgs {
    pub investor_id: String,
}

/// Trade side filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl From<TradeSide> for TradeType {
    fn from(side: TradeSide) -> Self {
        match side {
            TradeSide::Buy => TradeType::Buy,
            TradeSide::Sell => TradeType::Sell,
        }
    }
}

/// Arguments for the `transactions` command.
#[derive(Debug, Args)]
pub struct TransactionsArgs {
    /// Only trades by this investor.
    #[arg(long)]
    pub investor: Option<String>,

    /// Only trades of this stock.
    #[arg(long)]
    pub stock: Option<String>,

    /// Only buys or only sells.
    #[arg(long = "type", value_enum)]
    pub trade_type: Option<TradeSide>,

    /// Newest first.
    #[arg(long, default_value_t = false)]
    pub desc: bool,

    /// Maximum number of transactions to return.
    #[arg(long)]
    pub limit: Option<usize>,
}

impl TransactionsArgs {
    pub fn query(&self) -> TransactionQuery {
        let mut query = TransactionQuery::all();
        if let Some(investor) = &self.investor {
            query = query.for_investor(investor);
        }
        if let Some(stock) = &self.stock {
            query = query.for_stock(stock);
        }
        if let Some(side) = self.trade_type {
            query = query.of_type(side.into());
        }
        if self.desc {
            query = query.newest_first();
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        query
    }
}
