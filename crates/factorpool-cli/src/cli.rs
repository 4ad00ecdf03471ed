//! CLI argument definitions for factorpool.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sync-securities` | Download the security master (listed, delisted, paused) |
//! | `sync-calendar` | Download exchange trading days |
//! | `sync` | Incrementally ingest one dataset for many codes |
//! | `rebalance-dates` | List rebalance dates from the stored calendar |
//! | `sample` | Build point-in-time universe samples |
//! | `coverage` | Show stored date coverage per code |
//! | `sql` | Query the local DuckDB warehouse |
//!
//! # Examples
//!
//! ```bash
//! factorpool sync-securities
//! factorpool sync daily-trading --codes 600000.SH 000001.SZ
//! factorpool sample --date 20190430 --pretty
//! factorpool sql "SELECT count(*) FROM daily_trading"
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use factorpool_core::SyncMode;

#[derive(Debug, Parser)]
#[command(
    name = "factorpool",
    author,
    version,
    about = "A-share market data warehouse and point-in-time universe builder"
)]
pub struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download listed, delisted and paused securities into the security master.
    SyncSecurities,

    /// Download trading calendar days for an exchange.
    SyncCalendar(SyncCalendarArgs),

    /// Ingest one dataset for a set of codes under the vendor rate limit.
    ///
    /// Codes default to every stored security (or the benchmark index for
    /// `index-daily`).
    ///
    /// # Examples
    ///
    ///   factorpool sync daily-trading
    ///   factorpool sync income --codes 600000.SH --mode top-up
    Sync(SyncArgs),

    /// List rebalance dates selected from the stored trading calendar.
    RebalanceDates,

    /// Build universe samples for one date or every rebalance date.
    Sample(SampleArgs),

    /// Show stored min/max date and row count per code for a dataset.
    Coverage(CoverageArgs),

    /// Run SQL against the local warehouse.
    ///
    ///   factorpool sql "SELECT code, count(*) FROM daily_trading GROUP BY code"
    Sql(SqlArgs),
}

#[derive(Debug, Args)]
pub struct SyncCalendarArgs {
    /// Exchange code; defaults to `sampling.exchange`.
    #[arg(long)]
    pub exchange: Option<String>,

    /// First day (YYYYMMDD); defaults to `sampling.start_date`.
    #[arg(long)]
    pub start: Option<String>,

    /// Last day (YYYYMMDD); defaults to `sampling.end_date`.
    #[arg(long)]
    pub end: Option<String>,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Dataset to ingest, e.g. `daily-trading` or `balance-sheet`.
    pub dataset: String,

    #[arg(long, num_args = 1..)]
    pub codes: Vec<String>,

    /// Overrides `ingestion.sync_mode`.
    #[arg(long, value_enum)]
    pub mode: Option<SyncModeArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SyncModeArg {
    OneShot,
    TopUp,
}

impl From<SyncModeArg> for SyncMode {
    fn from(value: SyncModeArg) -> Self {
        match value {
            SyncModeArg::OneShot => SyncMode::OneShot,
            SyncModeArg::TopUp => SyncMode::TopUp,
        }
    }
}

#[derive(Debug, Args)]
pub struct SampleArgs {
    /// Single trade date (YYYYMMDD). Omit to sample every rebalance date.
    #[arg(long)]
    pub date: Option<String>,
}

#[derive(Debug, Args)]
pub struct CoverageArgs {
    pub dataset: String,
}

#[derive(Debug, Args)]
pub struct SqlArgs {
    pub query: String,

    #[arg(long, default_value_t = 10_000)]
    pub max_rows: usize,

    #[arg(long, default_value_t = 5_000)]
    pub query_timeout_ms: u64,
}
