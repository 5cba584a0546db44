use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use analysis_core::RetryPolicy;
use analysis_orchestrator::ScreeningCriteria;
use anyhow::{Context, Result};
use backtest_engine::BacktestConfig;

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub data_dir: PathBuf,

    // Backtesting
    pub initial_capital: f64,
    pub commission_rate: f64,

    // Provider retries
    pub provider_max_attempts: u32,
    pub provider_backoff_ms: u64,

    /// Default screening thresholds; command-line criteria override these.
    pub criteria: ScreeningCriteria,
}

impl CliConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            data_dir: lookup("VALUE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            initial_capital: parse_or(&lookup, "BACKTEST_INITIAL_CAPITAL", 100_000.0)?,
            commission_rate: parse_or(&lookup, "BACKTEST_COMMISSION_RATE", 0.0)?,
            provider_max_attempts: parse_or(&lookup, "PROVIDER_MAX_ATTEMPTS", 3)?,
            provider_backoff_ms: parse_or(&lookup, "PROVIDER_BACKOFF_MS", 500)?,
            criteria: ScreeningCriteria {
                max_pe: parse_opt(&lookup, "SCREEN_MAX_PE")?,
                max_pb: parse_opt(&lookup, "SCREEN_MAX_PB")?,
                max_debt_to_equity: parse_opt(&lookup, "SCREEN_MAX_DEBT_TO_EQUITY")?,
                min_roe: parse_opt(&lookup, "SCREEN_MIN_ROE")?,
                min_revenue_growth: parse_opt(&lookup, "SCREEN_MIN_REVENUE_GROWTH")?,
                min_earnings_growth: parse_opt(&lookup, "SCREEN_MIN_EARNINGS_GROWTH")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.initial_capital.is_nan() || self.initial_capital <= 0.0 {
            anyhow::bail!(
                "BACKTEST_INITIAL_CAPITAL must be positive, got {}",
                self.initial_capital
            );
        }
        if !(0.0..1.0).contains(&self.commission_rate) {
            anyhow::bail!(
                "BACKTEST_COMMISSION_RATE must be in [0, 1), got {}",
                self.commission_rate
            );
        }
        self.criteria
            .validate()
            .context("Invalid SCREEN_* criteria")?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.provider_max_attempts,
            Duration::from_millis(self.provider_backoff_ms),
        )
    }

    pub fn backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            initial_capital: self.initial_capital,
            commission_rate: self.commission_rate,
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(parse_opt(lookup, name)?.unwrap_or(default))
}

fn parse_opt<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: '{}'", name, raw)),
        _ => Ok(None),
    }
}
