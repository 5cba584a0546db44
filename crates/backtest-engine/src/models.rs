use std::collections::BTreeMap;

use analysis_core::PriceBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Configuration for a backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Charged on traded notional, as decimal (0.001 = 0.1%).
    #[serde(default)]
    pub commission_rate: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            commission_rate: 0.0,
        }
    }
}

/// One day of market data as a strategy sees it.
///
/// `extra` carries any additional numeric columns of the source (for example
/// `pe_ratio` and `pb_ratio`) so strategies can read them by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, f64>,
}

impl MarketRow {
    pub fn field(&self, name: &str) -> Option<f64> {
        self.extra.get(name).copied().filter(|v| !v.is_nan())
    }

    pub fn with_field(mut self, name: &str, value: f64) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }
}

impl From<PriceBar> for MarketRow {
    fn from(bar: PriceBar) -> Self {
        Self {
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            extra: BTreeMap::new(),
        }
    }
}

/// What a strategy wants held after the current row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub buy: bool,
    /// Fraction of equity to hold when `buy` is set; clamped to [0, 1].
    pub position_size: f64,
}

impl TradeSignal {
    pub fn buy(position_size: f64) -> Self {
        Self {
            buy: true,
            position_size,
        }
    }

    /// Exit any position and stay in cash.
    pub fn flat() -> Self {
        Self {
            buy: false,
            position_size: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// A rebalancing fill at the row close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub date: NaiveDate,
    pub side: TradeSide,
    pub shares: f64,
    pub price: f64,
    pub commission: f64,
}

/// A point on the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub cash: f64,
    pub shares: f64,
    pub equity: f64,
}

/// Result of a completed backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,
    /// Cumulative-return drawdown, always <= 0.
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub total_commission: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<BacktestTrade>,
}

/// Risk/return summary of one ticker's price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(rename = "Ticker")]
    pub ticker: String,
    #[serde(rename = "Annual Return")]
    pub annual_return: f64,
    #[serde(rename = "Volatility")]
    pub volatility: f64,
    #[serde(rename = "Sharpe Ratio")]
    pub sharpe_ratio: f64,
    #[serde(rename = "Max Drawdown")]
    pub max_drawdown: f64,
}

impl PerformanceMetrics {
    /// Export column names, in field order.
    pub const COLUMNS: [&'static str; 5] = [
        "Ticker",
        "Annual Return",
        "Volatility",
        "Sharpe Ratio",
        "Max Drawdown",
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnPeriod {
    Monthly,
    Annual,
}

/// Close-to-close return between the last closes of two consecutive
/// calendar periods that have data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodReturn {
    pub year: i32,
    /// `None` for annual periods.
    pub month: Option<u32>,
    pub last_close: f64,
    /// Fractional (0.05 = 5%).
    pub pct_change: f64,
}
