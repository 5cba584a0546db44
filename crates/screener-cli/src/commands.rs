use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use analysis_core::{FinancialDataProvider, RetryingProvider};
use analysis_orchestrator::{
    buffett_score, merge_final_analysis, AnalysisOrchestrator, ScreeningCriteria, ScreeningReport,
    ScreeningResultRow, ValueScreener,
};
use anyhow::{Context, Result};
use backtest_engine::{
    performance_metrics, period_returns, BacktestEngine, BacktestResult, PerformanceMetrics,
    ReturnPeriod, ValueStrategy,
};
use chrono::NaiveDate;

use crate::config::CliConfig;
use crate::storage::{self, CsvDataProvider};

type Provider = RetryingProvider<CsvDataProvider>;

fn provider(config: &CliConfig) -> Provider {
    RetryingProvider::new(
        CsvDataProvider::new(&config.data_dir),
        config.retry_policy(),
    )
}

pub fn analyze(config: &CliConfig, symbol: &str, summary: bool) -> Result<()> {
    let orchestrator = AnalysisOrchestrator::new(provider(config));
    let analysis = orchestrator
        .analyze(symbol)
        .with_context(|| format!("Failed to analyze {}", symbol))?;

    if summary {
        print!("{}", analysis.summary());
    } else {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    }
    Ok(())
}

/// Criteria precedence: environment, then the criteria file, then flags.
pub fn resolve_criteria(
    config: &CliConfig,
    criteria_file: Option<&Path>,
    flags: &ScreeningCriteria,
) -> Result<ScreeningCriteria> {
    let mut criteria = config.criteria.clone();
    if let Some(path) = criteria_file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read criteria file {}", path.display()))?;
        let map: HashMap<String, f64> = serde_json::from_str(&raw)
            .with_context(|| format!("Criteria file {} is not a name -> number object", path.display()))?;
        criteria = overlay(criteria, ScreeningCriteria::from_map(&map)?);
    }
    criteria = overlay(criteria, flags.clone());
    criteria.validate()?;
    Ok(criteria)
}

fn overlay(base: ScreeningCriteria, top: ScreeningCriteria) -> ScreeningCriteria {
    ScreeningCriteria {
        max_pe: top.max_pe.or(base.max_pe),
        max_pb: top.max_pb.or(base.max_pb),
        max_debt_to_equity: top.max_debt_to_equity.or(base.max_debt_to_equity),
        min_roe: top.min_roe.or(base.min_roe),
        min_revenue_growth: top.min_revenue_growth.or(base.min_revenue_growth),
        min_earnings_growth: top.min_earnings_growth.or(base.min_earnings_growth),
    }
}

pub fn screen(
    config: &CliConfig,
    symbols: &[String],
    criteria: &ScreeningCriteria,
    output: &Path,
) -> Result<ScreeningReport> {
    tracing::info!("Screening with {:?}", criteria);
    let orchestrator = Arc::new(AnalysisOrchestrator::new(provider(config)));
    let report = ValueScreener::new(orchestrator).screen(symbols, criteria)?;

    storage::write_records(output, &ScreeningResultRow::COLUMNS, &report.rows)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{:<8} {:>10} {:>10} {:>12} {:>10} {:>12} {:>12}  {}",
        "Symbol", "P/E", "P/B", "Debt/Equity", "ROE (%)", "Rev Gr (%)", "Earn Gr (%)", "Position"
    );
    for row in &report.rows {
        println!(
            "{:<8} {:>10.2} {:>10.2} {:>12.2} {:>10.2} {:>12.2} {:>12.2}  {}",
            row.symbol,
            row.pe_ratio,
            row.pb_ratio,
            row.debt_to_equity,
            row.roe,
            row.revenue_growth_pct,
            row.earnings_growth_pct,
            row.competitive_position
        );
    }
    for skipped in &report.skipped {
        println!("Skipped {}: {}", skipped.symbol, skipped.reason);
    }
    println!(
        "{}/{} passed, results written to {}",
        report.rows.len(),
        report.total_analyzed,
        output.display()
    );
    Ok(report)
}

/// Per-ticker performance metrics from the stored price histories. Tickers
/// that fail are logged and left out.
pub fn performance(config: &CliConfig, tickers: &[String], output: &Path, periods: bool) -> Result<()> {
    let provider = provider(config);
    let mut metrics = Vec::new();

    for ticker in tickers {
        let bars = match provider.get_price_history(ticker, NaiveDate::MIN, NaiveDate::MAX) {
            Ok(bars) => bars,
            Err(e) => {
                tracing::warn!("Error analyzing {}: {}", ticker, e);
                continue;
            }
        };
        match performance_metrics(ticker, &bars) {
            Ok(m) => {
                println!(
                    "{:<8} annual return {:>8.2}%  volatility {:>8.2}%  sharpe {:>6.2}  max drawdown {:>8.2}%",
                    m.ticker,
                    m.annual_return * 100.0,
                    m.volatility * 100.0,
                    m.sharpe_ratio,
                    m.max_drawdown * 100.0
                );
                metrics.push(m);
            }
            Err(e) => {
                tracing::warn!("Error analyzing {}: {}", ticker, e);
                continue;
            }
        }

        if periods {
            for (label, period) in [("Monthly", ReturnPeriod::Monthly), ("Annual", ReturnPeriod::Annual)] {
                println!("  {} returns:", label);
                for r in period_returns(&bars, period) {
                    match r.month {
                        Some(month) => println!("    {}-{:02} {:>8.2}%", r.year, month, r.pct_change * 100.0),
                        None => println!("    {}    {:>8.2}%", r.year, r.pct_change * 100.0),
                    }
                }
            }
        }
    }

    storage::write_records(output, &PerformanceMetrics::COLUMNS, &metrics)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!("Wrote {} performance records to {}", metrics.len(), output.display());
    Ok(())
}

pub fn buffett(value_path: &Path, performance_path: &Path, output: &Path) -> Result<()> {
    let value = storage::read_metrics_table(value_path)
        .with_context(|| format!("Failed to load {}", value_path.display()))?;
    let performance = storage::read_metrics_table(performance_path)
        .with_context(|| format!("Failed to load {}", performance_path.display()))?;

    let scores = buffett_score(&value)?;
    let merged = merge_final_analysis(&value, &performance, &scores)?;
    storage::write_metrics_table(output, &merged)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Top Value Stocks by Buffett Criteria:");
    let score_idx = merged.column_index(analysis_orchestrator::buffett::BUFFETT_SCORE_COLUMN);
    for record in merged.records() {
        let score = score_idx
            .and_then(|i| record.cells[i].as_f64())
            .unwrap_or(0.0);
        println!("{:<8} {:>2}", record.ticker, score);
    }
    Ok(())
}

pub fn backtest(
    config: &CliConfig,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    strategy: ValueStrategy,
) -> Result<BacktestResult> {
    let provider = CsvDataProvider::new(&config.data_dir);
    let rows = provider
        .load_market_rows(symbol)
        .with_context(|| format!("Failed to load history for {}", symbol))?;
    if !rows.iter().any(|r| r.field("pe_ratio").is_some()) {
        tracing::warn!(
            "{} has no pe_ratio column; the value strategy will stay in cash",
            symbol
        );
    }

    let engine = BacktestEngine::new(config.backtest_config());
    let result = engine.run_backtest(&rows, &strategy, start, end)?;

    println!("Backtest Results:");
    println!("Total Return: {:.2}%", result.total_return * 100.0);
    println!("Max Drawdown: {:.2}%", result.max_drawdown * 100.0);
    println!("Sharpe Ratio: {:.2}", result.sharpe_ratio);
    println!("Trades: {}", result.trades.len());
    Ok(result)
}
