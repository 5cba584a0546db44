//! value-screener: value-investing analysis, screening and backtesting over a
//! local data directory.
//!
//! Usage:
//!   value-screener analyze KO --summary
//!   value-screener screen AAPL BAC KO CVX OXY --max-pe 15 --max-pb 3
//!   value-screener performance AAPL BAC KO CVX OXY
//!   value-screener buffett
//!   value-screener backtest AAPL --start 2020-01-01 --end 2023-12-31

mod commands;
mod config;
mod storage;

use std::path::PathBuf;

use analysis_orchestrator::ScreeningCriteria;
use anyhow::Result;
use backtest_engine::ValueStrategy;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::config::CliConfig;

/// Value-investing metrics, screening and backtesting.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding historical_<T>.csv, financials_<T>.json and the
    /// metric tables. Overrides VALUE_DATA_DIR.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one symbol and print the result as JSON.
    Analyze {
        symbol: String,

        /// Print the plain-text report instead of JSON.
        #[arg(long)]
        summary: bool,
    },

    /// Screen symbols against value criteria and write screening_results.csv.
    Screen(ScreenArgs),

    /// Compute per-ticker performance metrics and write performance_metrics.csv.
    Performance {
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Also print monthly and annual returns.
        #[arg(long)]
        periods: bool,
    },

    /// Score value_metrics.csv by Buffett criteria, join performance_metrics.csv
    /// and write final_analysis.csv.
    Buffett {
        #[arg(long, default_value = "value_metrics.csv")]
        value_metrics: PathBuf,

        #[arg(long, default_value = "performance_metrics.csv")]
        performance_metrics: PathBuf,

        #[arg(long, default_value = "final_analysis.csv")]
        output: PathBuf,
    },

    /// Backtest the P/E and P/B value strategy over a symbol's history.
    Backtest {
        symbol: String,

        /// First day of the backtest (YYYY-MM-DD).
        #[arg(long)]
        start: NaiveDate,

        /// Last day of the backtest (YYYY-MM-DD).
        #[arg(long)]
        end: NaiveDate,

        #[arg(long, default_value_t = 15.0)]
        max_pe: f64,

        #[arg(long, default_value_t = 1.5)]
        max_pb: f64,

        /// Print the full result, equity curve included, as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ScreenArgs {
    #[arg(required = true)]
    symbols: Vec<String>,

    /// JSON object of criteria, e.g. {"max_pe": 15, "min_roe": 10}.
    #[arg(long)]
    criteria: Option<PathBuf>,

    #[arg(long)]
    max_pe: Option<f64>,

    #[arg(long)]
    max_pb: Option<f64>,

    #[arg(long)]
    max_debt_to_equity: Option<f64>,

    /// Minimum ROE in percent.
    #[arg(long)]
    min_roe: Option<f64>,

    /// Minimum revenue CAGR as a fraction (0.05 = 5%).
    #[arg(long)]
    min_revenue_growth: Option<f64>,

    /// Minimum earnings CAGR as a fraction (0.05 = 5%).
    #[arg(long)]
    min_earnings_growth: Option<f64>,

    #[arg(long, default_value = "screening_results.csv")]
    output: PathBuf,
}

impl ScreenArgs {
    fn flag_criteria(&self) -> ScreeningCriteria {
        ScreeningCriteria {
            max_pe: self.max_pe,
            max_pb: self.max_pb,
            max_debt_to_equity: self.max_debt_to_equity,
            min_roe: self.min_roe,
            min_revenue_growth: self.min_revenue_growth,
            min_earnings_growth: self.min_earnings_growth,
        }
    }
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "value_screener=info,analysis_orchestrator=info,backtest_engine=info".into()
        })
    };

    // Logs go to stderr so CSV and JSON output on stdout stays clean.
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter())
            .init();
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = CliConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    tracing::debug!("Using data directory {}", config.data_dir.display());

    match cli.command {
        Commands::Analyze { symbol, summary } => commands::analyze(&config, &symbol, summary)?,
        Commands::Screen(args) => {
            let criteria =
                commands::resolve_criteria(&config, args.criteria.as_deref(), &args.flag_criteria())?;
            let output = config.data_dir.join(&args.output);
            commands::screen(&config, &args.symbols, &criteria, &output)?;
        }
        Commands::Performance { tickers, periods } => {
            let output = config.data_dir.join("performance_metrics.csv");
            commands::performance(&config, &tickers, &output, periods)?;
        }
        Commands::Buffett {
            value_metrics,
            performance_metrics,
            output,
        } => {
            let dir = &config.data_dir;
            commands::buffett(
                &dir.join(value_metrics),
                &dir.join(performance_metrics),
                &dir.join(output),
            )?;
        }
        Commands::Backtest {
            symbol,
            start,
            end,
            max_pe,
            max_pb,
            json,
        } => {
            let result = commands::backtest(
                &config,
                &symbol,
                start,
                end,
                ValueStrategy { max_pe, max_pb },
            )?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
        }
    }

    Ok(())
}
