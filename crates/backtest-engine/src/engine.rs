use analysis_core::AnalysisError;
use chrono::NaiveDate;

use crate::models::*;
use crate::performance::{max_drawdown, pct_changes, sharpe_ratio};

/// Turns one market row into the position the strategy wants held.
pub trait Strategy {
    fn signal(&self, row: &MarketRow) -> TradeSignal;
}

impl<F> Strategy for F
where
    F: Fn(&MarketRow) -> TradeSignal,
{
    fn signal(&self, row: &MarketRow) -> TradeSignal {
        self(row)
    }
}

/// Buy while the stock trades below P/E and P/B ceilings, read from the
/// row's `pe_ratio` and `pb_ratio` fields. Rows missing either field are
/// treated as not cheap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueStrategy {
    pub max_pe: f64,
    pub max_pb: f64,
}

impl Default for ValueStrategy {
    fn default() -> Self {
        Self {
            max_pe: 15.0,
            max_pb: 1.5,
        }
    }
}

impl Strategy for ValueStrategy {
    fn signal(&self, row: &MarketRow) -> TradeSignal {
        let cheap_earnings = row.field("pe_ratio").is_some_and(|pe| pe < self.max_pe);
        let cheap_book = row.field("pb_ratio").is_some_and(|pb| pb < self.max_pb);
        if cheap_earnings && cheap_book {
            TradeSignal::buy(1.0)
        } else {
            TradeSignal::flat()
        }
    }
}

/// Single-instrument backtester. Each row's signal is executed at that
/// row's close by rebalancing to the requested exposure.
pub struct BacktestEngine {
    config: BacktestConfig,
}

/// Cash and share ledger for one run.
struct Ledger {
    cash: f64,
    shares: f64,
    commission_rate: f64,
    total_commission: f64,
}

impl Ledger {
    fn equity(&self, price: f64) -> f64 {
        self.cash + self.shares * price
    }

    /// Move the position to `target_fraction` of current equity. Returns the
    /// fill, if any.
    fn rebalance(&mut self, date: NaiveDate, price: f64, target_fraction: f64) -> Option<BacktestTrade> {
        let equity = self.equity(price);
        let target_value = equity * target_fraction;
        let current_value = self.shares * price;
        let delta = target_value - current_value;

        // Sub-cent drift is not worth a trade.
        if delta.abs() < 1e-6 {
            return None;
        }

        if delta > 0.0 {
            // Leave room for commission so cash never goes negative.
            let notional = delta.min(self.cash / (1.0 + self.commission_rate));
            if notional <= 0.0 {
                return None;
            }
            let commission = notional * self.commission_rate;
            let shares = notional / price;
            self.shares += shares;
            self.cash -= notional + commission;
            self.total_commission += commission;
            Some(BacktestTrade {
                date,
                side: TradeSide::Buy,
                shares,
                price,
                commission,
            })
        } else {
            let shares = if target_fraction <= 0.0 {
                self.shares
            } else {
                (-delta / price).min(self.shares)
            };
            let notional = shares * price;
            let commission = notional * self.commission_rate;
            self.shares -= shares;
            self.cash += notional - commission;
            self.total_commission += commission;
            Some(BacktestTrade {
                date,
                side: TradeSide::Sell,
                shares,
                price,
                commission,
            })
        }
    }
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    /// Run `strategy` over the rows dated within `[start, end]`.
    ///
    /// Rows need not be sorted; they are ordered by date (stable for equal
    /// dates). Rows with a non-positive close are not traded and are
    /// valued at the last good close.
    pub fn run_backtest<S>(
        &self,
        rows: &[MarketRow],
        strategy: &S,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BacktestResult, AnalysisError>
    where
        S: Strategy + ?Sized,
    {
        self.validate(start, end)?;

        let mut window: Vec<&MarketRow> = rows
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .collect();
        window.sort_by_key(|r| r.date);

        tracing::info!(
            "Running backtest over {} rows ({} to {})",
            window.len(),
            start,
            end
        );

        let initial_capital = self.config.initial_capital;
        let mut ledger = Ledger {
            cash: initial_capital,
            shares: 0.0,
            commission_rate: self.config.commission_rate,
            total_commission: 0.0,
        };
        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(window.len());
        let mut last_price: Option<f64> = None;

        for row in window {
            let signal = strategy.signal(row);

            let price = if row.close > 0.0 && row.close.is_finite() {
                row.close
            } else {
                tracing::warn!("Skipping trade on {}: invalid close {}", row.date, row.close);
                equity_curve.push(EquityPoint {
                    date: row.date,
                    cash: ledger.cash,
                    shares: ledger.shares,
                    equity: ledger.equity(last_price.unwrap_or(0.0)),
                });
                continue;
            };
            last_price = Some(price);

            let target_fraction = if signal.buy && !signal.position_size.is_nan() {
                signal.position_size.clamp(0.0, 1.0)
            } else {
                0.0
            };
            if let Some(trade) = ledger.rebalance(row.date, price, target_fraction) {
                tracing::debug!(
                    "{} {:?} {:.4} shares @ {:.2}",
                    trade.date,
                    trade.side,
                    trade.shares,
                    trade.price
                );
                trades.push(trade);
            }

            equity_curve.push(EquityPoint {
                date: row.date,
                cash: ledger.cash,
                shares: ledger.shares,
                equity: ledger.equity(price),
            });
        }

        let final_equity = equity_curve
            .last()
            .map_or(initial_capital, |p| p.equity);

        let equity_values: Vec<f64> = std::iter::once(initial_capital)
            .chain(equity_curve.iter().map(|p| p.equity))
            .collect();
        let returns = pct_changes(&equity_values);

        let result = BacktestResult {
            initial_capital,
            final_equity,
            total_return: (final_equity - initial_capital) / initial_capital,
            max_drawdown: max_drawdown(&returns),
            sharpe_ratio: sharpe_ratio(&returns),
            total_commission: ledger.total_commission,
            equity_curve,
            trades,
        };

        tracing::info!(
            "Backtest complete: return {:.2}%, max drawdown {:.2}%, sharpe {:.2}, {} trades",
            result.total_return * 100.0,
            result.max_drawdown * 100.0,
            result.sharpe_ratio,
            result.trades.len()
        );

        Ok(result)
    }

    fn validate(&self, start: NaiveDate, end: NaiveDate) -> Result<(), AnalysisError> {
        if start > end {
            return Err(AnalysisError::ValidationError(format!(
                "Backtest start {} is after end {}",
                start, end
            )));
        }
        let capital = self.config.initial_capital;
        if !(capital > 0.0 && capital.is_finite()) {
            return Err(AnalysisError::ValidationError(format!(
                "Initial capital must be positive, got {}",
                capital
            )));
        }
        let rate = self.config.commission_rate;
        if !(0.0..1.0).contains(&rate) {
            return Err(AnalysisError::ValidationError(format!(
                "Commission rate must be in [0, 1), got {}",
                rate
            )));
        }
        Ok(())
    }
}

impl Default for BacktestEngine {
    fn default() -> Self {
        Self::new(BacktestConfig::default())
    }
}
