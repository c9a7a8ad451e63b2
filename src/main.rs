use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use colored::Colorize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use msetrack::cli::{formatters, Cli, Commands};
use msetrack::config::Config;
use msetrack::notify::{EmailNotifier, Notifier};
use msetrack::scraping::{MseScraper, QuoteSource};
use msetrack::{db, pipeline, reports, scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => {
            db::init_database(Some(config.db_path.clone()))?;
            println!(
                "{} Database initialized at {}",
                "✓".green().bold(),
                config.db_path.display()
            );
            Ok(())
        }

        Commands::Run { dry_run } => handle_run(&config, dry_run).await,

        Commands::Watch { no_immediate } => {
            let scraper = MseScraper::new(&config.url)?;
            let notifier = build_notifier(&config);
            scheduler::run_daily(&config, &scraper, notifier.as_deref(), !no_immediate).await
        }

        Commands::Show { date } => handle_show(&config, date.as_deref(), cli.json),

        Commands::Analyze { symbol, export } => {
            handle_analyze(&config, symbol.as_deref(), export.as_deref(), cli.json)
        }
    }
}

fn build_notifier(config: &Config) -> Option<Box<dyn Notifier>> {
    config
        .email
        .clone()
        .map(|settings| Box::new(EmailNotifier::new(settings)) as Box<dyn Notifier>)
}

/// Handle the run command
async fn handle_run(config: &Config, dry_run: bool) -> Result<()> {
    let trade_date = Local::now().date_naive();
    let scraper = MseScraper::new(&config.url)?;

    if dry_run {
        let quotes = scraper.fetch_quotes(trade_date).await?;
        println!(
            "\n{} Found {} quotes",
            "✓".green().bold(),
            quotes.len()
        );
        println!("{}", formatters::format_quotes_table(trade_date, &quotes));
        println!("{} Dry run - no changes saved", "ℹ".blue().bold());
        return Ok(());
    }

    let notifier = build_notifier(config);
    if notifier.is_none() {
        info!("Email credentials not configured; run notifications disabled");
    }

    let report = pipeline::run_once(config, &scraper, notifier.as_deref(), trade_date).await?;

    println!(
        "\n{} Daily update complete for {}",
        "✓".green().bold(),
        report.trade_date
    );
    println!("  Rows stored: {}", report.rows.to_string().green());
    println!("  Database: {}", config.db_path.display());
    println!("  Workbook: {}", config.workbook_path.display());

    Ok(())
}

/// Handle the show command
fn handle_show(config: &Config, date: Option<&str>, json: bool) -> Result<()> {
    db::init_database(Some(config.db_path.clone()))?;
    let conn = db::open_db(Some(config.db_path.clone()))?;

    let date = match date {
        Some(raw) => Some(
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))?,
        ),
        None => db::latest_trade_date(&conn)?,
    };

    let Some(date) = date else {
        println!("No quotes found - run `msetrack run` first");
        return Ok(());
    };

    let quotes = db::quotes_for_date(&conn, date)?;
    if quotes.is_empty() {
        println!("No quotes found for {}", date);
        return Ok(());
    }

    if json {
        println!("{}", formatters::format_quotes_json(date, &quotes));
    } else {
        println!("{}", formatters::format_quotes_table(date, &quotes));
    }

    Ok(())
}

/// Handle the analyze command
fn handle_analyze(
    config: &Config,
    symbol: Option<&str>,
    export: Option<&std::path::Path>,
    json: bool,
) -> Result<()> {
    db::init_database(Some(config.db_path.clone()))?;
    let conn = db::open_db(Some(config.db_path.clone()))?;

    let quotes = db::all_quotes(&conn)?;
    if quotes.is_empty() {
        println!("No quotes found - run `msetrack run` first");
        return Ok(());
    }

    let mut stats = reports::compute_stats(&quotes);
    if let Some(symbol) = symbol {
        let wanted = symbol.to_uppercase();
        stats.retain(|s| s.symbol == wanted);
        if stats.is_empty() {
            println!("No quotes found for symbol {}", wanted);
            return Ok(());
        }
    }

    if json {
        println!("{}", formatters::format_stats_json(&stats));
    } else {
        println!("{}", formatters::format_stats_table(&stats));
    }

    if let Some(path) = export {
        reports::export_stats(path, &stats)?;
        println!("{} Exported analysis to {}", "✓".green().bold(), path.display());
    }

    Ok(())
}
