//! Return series statistics shared by the backtester and the per-ticker
//! performance report.

use analysis_core::stats::cumulative_sum;
use analysis_core::{AnalysisError, PriceBar};
use chrono::Datelike;
use statrs::statistics::Statistics;

use crate::models::{PerformanceMetrics, PeriodReturn, ReturnPeriod};

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// Percentage changes between consecutive values. A non-positive base
/// yields a 0.0 return for that step.
pub fn pct_changes(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// `min(cumsum(r) - cummax(cumsum(r)))`: drawdown measured on summed (not
/// compounded) returns. Always <= 0; 0.0 for an empty series.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let cumulative = cumulative_sum(returns);
    let Some(&first) = cumulative.first() else {
        return 0.0;
    };

    let mut running_max = first;
    let mut worst = 0.0_f64;
    for &value in &cumulative {
        running_max = running_max.max(value);
        worst = worst.min(value - running_max);
    }
    worst
}

/// Annualized Sharpe ratio with a zero risk-free rate, from population
/// standard deviation. 0.0 for no returns or zero dispersion.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    annualized_sharpe(returns.mean(), returns.population_std_dev())
}

fn annualized_sharpe(mean: f64, std_dev: f64) -> f64 {
    if std_dev == 0.0 || !std_dev.is_finite() {
        return 0.0;
    }
    (mean * TRADING_DAYS) / (std_dev * TRADING_DAYS.sqrt())
}

/// Annual return, volatility, Sharpe ratio and max drawdown of daily
/// close-to-close returns. Volatility uses the sample standard deviation.
///
/// Bars are sorted by date first. Needs at least three bars so that the
/// sample standard deviation is defined.
pub fn performance_metrics(
    ticker: &str,
    bars: &[PriceBar],
) -> Result<PerformanceMetrics, AnalysisError> {
    let closes = sorted_closes(bars);
    if closes.len() < 3 {
        return Err(AnalysisError::InsufficientData(format!(
            "{} has {} price bars, need at least 3",
            ticker,
            closes.len()
        )));
    }

    let returns = pct_changes(&closes);
    let mean = returns.as_slice().mean();
    let std_dev = returns.as_slice().std_dev();

    Ok(PerformanceMetrics {
        ticker: ticker.to_string(),
        annual_return: mean * TRADING_DAYS,
        volatility: std_dev * TRADING_DAYS.sqrt(),
        sharpe_ratio: annualized_sharpe(mean, std_dev),
        max_drawdown: max_drawdown(&returns),
    })
}

/// Returns between the last closes of consecutive calendar months or years.
/// Periods with no bars are not represented; the first period has no
/// predecessor and is omitted.
pub fn period_returns(bars: &[PriceBar], period: ReturnPeriod) -> Vec<PeriodReturn> {
    let mut sorted: Vec<&PriceBar> = bars.iter().collect();
    sorted.sort_by_key(|b| b.date);

    let mut last_closes: Vec<(i32, Option<u32>, f64)> = Vec::new();
    for bar in sorted {
        let key = match period {
            ReturnPeriod::Monthly => (bar.date.year(), Some(bar.date.month())),
            ReturnPeriod::Annual => (bar.date.year(), None),
        };
        match last_closes.last_mut() {
            Some(last) if (last.0, last.1) == key => last.2 = bar.close,
            _ => last_closes.push((key.0, key.1, bar.close)),
        }
    }

    last_closes
        .windows(2)
        .map(|w| {
            let (year, month, last_close) = w[1];
            let previous = w[0].2;
            let pct_change = if previous > 0.0 {
                (last_close - previous) / previous
            } else {
                0.0
            };
            PeriodReturn {
                year,
                month,
                last_close,
                pct_change,
            }
        })
        .collect()
}

fn sorted_closes(bars: &[PriceBar]) -> Vec<f64> {
    let mut sorted: Vec<&PriceBar> = bars.iter().collect();
    sorted.sort_by_key(|b| b.date);
    sorted.iter().map(|b| b.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn bar(y: i32, m: u32, d: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn test_pct_changes() {
        let r = pct_changes(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert_relative_eq!(r[0], 0.1);
        assert_relative_eq!(r[1], -0.1);
        assert!(pct_changes(&[100.0]).is_empty());
    }

    #[test]
    fn test_max_drawdown_on_summed_returns() {
        // cumsum: 0.1, 0.05, 0.25, 0.05 -> worst gap is 0.05 - 0.25.
        assert_relative_eq!(max_drawdown(&[0.1, -0.05, 0.2, -0.2]), -0.2);
        assert_eq!(max_drawdown(&[0.01, 0.02]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn test_max_drawdown_includes_first_step() {
        // The running max starts at the first cumulative value, not at zero.
        assert_relative_eq!(max_drawdown(&[-0.1, -0.1]), -0.1);
    }

    #[test]
    fn test_sharpe_ratio() {
        assert_eq!(sharpe_ratio(&[]), 0.0);
        assert_eq!(sharpe_ratio(&[0.25, 0.25, 0.25]), 0.0);

        let returns = [0.01, -0.01, 0.02];
        let mean = 0.02 / 3.0;
        let var = [0.01_f64, -0.01, 0.02]
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / 3.0;
        let expected = mean * 252.0 / (var.sqrt() * 252.0_f64.sqrt());
        assert_relative_eq!(sharpe_ratio(&returns), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_performance_metrics() {
        let bars = vec![
            bar(2023, 1, 4, 110.0),
            bar(2023, 1, 3, 100.0),
            bar(2023, 1, 5, 99.0),
            bar(2023, 1, 6, 108.9),
        ];
        let metrics = performance_metrics("KO", &bars).unwrap();
        assert_eq!(metrics.ticker, "KO");
        // Returns after sorting: +10%, -10%, +10%.
        assert_relative_eq!(metrics.annual_return, 0.1 / 3.0 * 252.0, epsilon = 1e-9);
        assert!(metrics.volatility > 0.0);
        assert!(metrics.sharpe_ratio > 0.0);
        assert_relative_eq!(metrics.max_drawdown, -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_performance_metrics_needs_history() {
        let bars = vec![bar(2023, 1, 3, 100.0), bar(2023, 1, 4, 101.0)];
        assert!(matches!(
            performance_metrics("KO", &bars),
            Err(AnalysisError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_flat_prices_have_zero_sharpe() {
        let bars: Vec<PriceBar> = (1..=5).map(|d| bar(2023, 3, d, 50.0)).collect();
        let metrics = performance_metrics("FLAT", &bars).unwrap();
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.volatility, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
    }

    #[test]
    fn test_monthly_returns_use_last_close() {
        let bars = vec![
            bar(2023, 1, 3, 90.0),
            bar(2023, 1, 31, 100.0),
            bar(2023, 2, 15, 95.0),
            bar(2023, 2, 28, 110.0),
            bar(2023, 4, 3, 121.0),
        ];
        let monthly = period_returns(&bars, ReturnPeriod::Monthly);
        assert_eq!(monthly.len(), 2);
        assert_eq!((monthly[0].year, monthly[0].month), (2023, Some(2)));
        assert_relative_eq!(monthly[0].pct_change, 0.1);
        // March has no bars, so April compares to February.
        assert_eq!(monthly[1].month, Some(4));
        assert_relative_eq!(monthly[1].pct_change, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_annual_returns() {
        let bars = vec![
            bar(2022, 6, 1, 80.0),
            bar(2022, 12, 30, 100.0),
            bar(2023, 12, 29, 125.0),
        ];
        let annual = period_returns(&bars, ReturnPeriod::Annual);
        assert_eq!(annual.len(), 1);
        assert_eq!(annual[0].year, 2023);
        assert_eq!(annual[0].month, None);
        assert_relative_eq!(annual[0].pct_change, 0.25);
        assert!(period_returns(&bars[..1], ReturnPeriod::Annual).is_empty());
    }
}
