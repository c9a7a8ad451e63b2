use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "msetrack")]
#[command(version, about = "Malawi Stock Exchange daily quote tracker")]
#[command(
    long_about = "Scrape the MSE mainboard once a day, store closing prices in SQLite and an Excel workbook, and email a success/failure summary after each run."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Path to the config file (default: ~/.msetrack/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the quote database
    Init,

    /// Execute one scrape run now (fetch, store, notify)
    Run {
        /// Fetch and preview the parsed rows without writing or emailing
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Run the scraper once per day at the configured time
    Watch {
        /// Skip the immediate run on startup
        #[arg(long)]
        no_immediate: bool,
    },

    /// Show stored quotes for a trading date
    Show {
        /// Trading date (YYYY-MM-DD, default: latest stored date)
        #[arg(long)]
        date: Option<String>,
    },

    /// Per-symbol metrics over the accumulated store (returns, moving
    /// averages, volatility)
    Analyze {
        /// Restrict the report to one symbol
        #[arg(short, long)]
        symbol: Option<String>,

        /// Also export the full series to an Excel workbook at this path
        #[arg(long)]
        export: Option<PathBuf>,
    },
}
