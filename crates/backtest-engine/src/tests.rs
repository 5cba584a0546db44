use analysis_core::AnalysisError;
use approx::assert_relative_eq;
use chrono::{Datelike, NaiveDate};

use crate::engine::{BacktestEngine, Strategy, ValueStrategy};
use crate::models::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Helper: a row with the same open/high/low/close.
fn row(day: u32, close: f64) -> MarketRow {
    MarketRow {
        date: date(2024, 1, day),
        open: close,
        high: close,
        low: close,
        close,
        volume: 10_000.0,
        extra: Default::default(),
    }
}

fn rows(closes: &[f64]) -> Vec<MarketRow> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| row(i as u32 + 1, c))
        .collect()
}

fn january() -> (NaiveDate, NaiveDate) {
    (date(2024, 1, 1), date(2024, 1, 31))
}

fn never_buy(_: &MarketRow) -> TradeSignal {
    TradeSignal::flat()
}

fn always_buy(_: &MarketRow) -> TradeSignal {
    TradeSignal::buy(1.0)
}

#[test]
fn test_never_buy_keeps_capital() {
    let (start, end) = january();
    let data = rows(&[100.0, 80.0, 120.0, 90.0]);
    let result = BacktestEngine::default()
        .run_backtest(&data, &never_buy, start, end)
        .unwrap();

    assert_eq!(result.total_return, 0.0);
    assert_eq!(result.max_drawdown, 0.0);
    assert_eq!(result.sharpe_ratio, 0.0);
    assert_eq!(result.final_equity, 100_000.0);
    assert!(result.trades.is_empty());
    assert_eq!(result.equity_curve.len(), 4);
}

#[test]
fn test_buy_and_hold() {
    let (start, end) = january();
    let data = rows(&[100.0, 110.0, 121.0]);
    let result = BacktestEngine::default()
        .run_backtest(&data, &always_buy, start, end)
        .unwrap();

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].side, TradeSide::Buy);
    assert_relative_eq!(result.trades[0].shares, 1000.0);
    assert_relative_eq!(result.final_equity, 121_000.0);
    assert_relative_eq!(result.total_return, 0.21, epsilon = 1e-12);
    assert_eq!(result.max_drawdown, 0.0);
    assert!(result.sharpe_ratio > 0.0);
}

#[test]
fn test_drawdown_on_summed_returns() {
    let (start, end) = january();
    let data = rows(&[100.0, 120.0, 90.0]);
    let result = BacktestEngine::default()
        .run_backtest(&data, &always_buy, start, end)
        .unwrap();

    // Daily returns 0, +20%, -25%: cumsum peaks at 0.2 and ends at -0.05.
    assert_relative_eq!(result.max_drawdown, -0.25, epsilon = 1e-12);
    assert_relative_eq!(result.total_return, -0.1, epsilon = 1e-12);
    assert!(result.sharpe_ratio < 0.0);
}

#[test]
fn test_partial_position_rebalances_each_row() {
    let (start, end) = january();
    let data = rows(&[100.0, 200.0]);
    let half = |_: &MarketRow| TradeSignal::buy(0.5);
    let result = BacktestEngine::default()
        .run_backtest(&data, &half, start, end)
        .unwrap();

    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[1].side, TradeSide::Sell);
    assert_relative_eq!(result.trades[1].shares, 125.0);

    let last = result.equity_curve.last().unwrap();
    assert_relative_eq!(last.equity, 150_000.0);
    assert_relative_eq!(last.cash, 75_000.0);
    assert_relative_eq!(result.total_return, 0.5);
}

#[test]
fn test_sell_signal_goes_flat() {
    let (start, end) = january();
    let data = rows(&[100.0, 110.0, 90.0]);
    let exit_on_second_day = |r: &MarketRow| {
        if r.date.day0() == 0 {
            TradeSignal::buy(1.0)
        } else {
            TradeSignal::flat()
        }
    };
    let result = BacktestEngine::default()
        .run_backtest(&data, &exit_on_second_day, start, end)
        .unwrap();

    assert_eq!(result.trades.len(), 2);
    let last = result.equity_curve.last().unwrap();
    assert_eq!(last.shares, 0.0);
    assert_relative_eq!(last.equity, 110_000.0);
}

#[test]
fn test_position_size_is_clamped() {
    let (start, end) = january();
    let data = rows(&[100.0, 50.0]);
    let leveraged = |_: &MarketRow| TradeSignal::buy(3.0);
    let result = BacktestEngine::default()
        .run_backtest(&data, &leveraged, start, end)
        .unwrap();

    for point in &result.equity_curve {
        assert!(point.cash >= -1e-9);
    }
    assert_relative_eq!(result.total_return, -0.5);

    let negative = |_: &MarketRow| TradeSignal::buy(-1.0);
    let result = BacktestEngine::default()
        .run_backtest(&data, &negative, start, end)
        .unwrap();
    assert!(result.trades.is_empty());
}

#[test]
fn test_rows_are_filtered_and_sorted() {
    let data = vec![row(5, 150.0), row(3, 120.0), row(1, 100.0), row(2, 110.0), row(4, 130.0)];
    let result = BacktestEngine::default()
        .run_backtest(&data, &always_buy, date(2024, 1, 2), date(2024, 1, 4))
        .unwrap();

    let dates: Vec<u32> = result.equity_curve.iter().map(|p| p.date.day()).collect();
    assert_eq!(dates, vec![2, 3, 4]);
    // Bought at 110 on the 2nd, held to 130 on the 4th.
    assert_relative_eq!(result.total_return, 130.0 / 110.0 - 1.0, epsilon = 1e-12);
}

#[test]
fn test_empty_window() {
    let data = rows(&[100.0, 110.0]);
    let result = BacktestEngine::default()
        .run_backtest(&data, &always_buy, date(2023, 1, 1), date(2023, 12, 31))
        .unwrap();

    assert_eq!(result.total_return, 0.0);
    assert_eq!(result.max_drawdown, 0.0);
    assert_eq!(result.sharpe_ratio, 0.0);
    assert_eq!(result.final_equity, 100_000.0);
    assert!(result.equity_curve.is_empty());
}

#[test]
fn test_invalid_inputs() {
    let data = rows(&[100.0]);
    let reversed = BacktestEngine::default().run_backtest(
        &data,
        &always_buy,
        date(2024, 2, 1),
        date(2024, 1, 1),
    );
    assert!(matches!(reversed, Err(AnalysisError::ValidationError(_))));

    let (start, end) = january();
    let broke = BacktestEngine::new(BacktestConfig {
        initial_capital: 0.0,
        ..Default::default()
    });
    assert!(matches!(
        broke.run_backtest(&data, &always_buy, start, end),
        Err(AnalysisError::ValidationError(_))
    ));

    let greedy_broker = BacktestEngine::new(BacktestConfig {
        commission_rate: 1.5,
        ..Default::default()
    });
    assert!(matches!(
        greedy_broker.run_backtest(&data, &always_buy, start, end),
        Err(AnalysisError::ValidationError(_))
    ));
}

#[test]
fn test_commission_is_charged() {
    let (start, end) = january();
    let data = rows(&[100.0, 100.0]);
    let engine = BacktestEngine::new(BacktestConfig {
        initial_capital: 100_000.0,
        commission_rate: 0.01,
    });
    let result = engine.run_backtest(&data, &always_buy, start, end).unwrap();

    let notional = 100_000.0 / 1.01;
    assert_relative_eq!(result.total_commission, notional * 0.01, epsilon = 1e-6);
    assert_relative_eq!(result.final_equity, notional, epsilon = 1e-6);
    assert!(result.equity_curve.iter().all(|p| p.cash >= -1e-6));
    assert!(result.total_return < 0.0);
}

#[test]
fn test_invalid_close_is_not_traded() {
    let (start, end) = january();
    let data = rows(&[100.0, 0.0, 110.0]);
    let result = BacktestEngine::default()
        .run_backtest(&data, &always_buy, start, end)
        .unwrap();

    assert_eq!(result.trades.len(), 1);
    assert_relative_eq!(result.equity_curve[1].equity, 100_000.0);
    assert_relative_eq!(result.final_equity, 110_000.0);
}

#[test]
fn test_value_strategy() {
    let strategy = ValueStrategy::default();

    let cheap = row(1, 50.0).with_field("pe_ratio", 12.0).with_field("pb_ratio", 1.2);
    let signal = strategy.signal(&cheap);
    assert!(signal.buy);
    assert_eq!(signal.position_size, 1.0);

    let rich_book = row(2, 50.0).with_field("pe_ratio", 12.0).with_field("pb_ratio", 2.0);
    assert_eq!(strategy.signal(&rich_book), TradeSignal::flat());

    let rich_earnings = row(5, 50.0).with_field("pe_ratio", 18.0).with_field("pb_ratio", 1.0);
    assert_eq!(strategy.signal(&rich_earnings), TradeSignal::flat());

    let unknown = row(3, 50.0);
    assert_eq!(strategy.signal(&unknown), TradeSignal::flat());

    let nan_pe = row(4, 50.0)
        .with_field("pe_ratio", f64::NAN)
        .with_field("pb_ratio", 1.0);
    assert!(!strategy.signal(&nan_pe).buy);
}

#[test]
fn test_value_strategy_backtest() {
    let (start, end) = january();
    let data = vec![
        row(1, 100.0).with_field("pe_ratio", 20.0).with_field("pb_ratio", 1.0),
        row(2, 100.0).with_field("pe_ratio", 12.0).with_field("pb_ratio", 1.0),
        row(3, 125.0).with_field("pe_ratio", 16.0).with_field("pb_ratio", 1.0),
        row(4, 90.0).with_field("pe_ratio", 10.0).with_field("pb_ratio", 1.0),
    ];
    let strategy = ValueStrategy::default();
    let result = BacktestEngine::default()
        .run_backtest(&data, &strategy, start, end)
        .unwrap();

    // In on day 2, out on day 3 at +25%, back in on day 4.
    let sides: Vec<TradeSide> = result.trades.iter().map(|t| t.side).collect();
    assert_eq!(sides, vec![TradeSide::Buy, TradeSide::Sell, TradeSide::Buy]);
    assert_relative_eq!(result.final_equity, 125_000.0);
}

#[test]
fn test_strategy_as_trait_object() {
    let (start, end) = january();
    let data = rows(&[100.0, 105.0]);
    let strategies: Vec<Box<dyn Strategy>> = vec![Box::new(never_buy), Box::new(always_buy)];
    let returns: Vec<f64> = strategies
        .iter()
        .map(|s| {
            BacktestEngine::default()
                .run_backtest(&data, s.as_ref(), start, end)
                .unwrap()
                .total_return
        })
        .collect();
    assert_eq!(returns[0], 0.0);
    assert_relative_eq!(returns[1], 0.05, epsilon = 1e-12);
}

#[test]
fn test_market_row_json_carries_extra_fields() {
    let json = r#"{"date":"2024-01-02","open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":100.0,"pe_ratio":11.0}"#;
    let parsed: MarketRow = serde_json::from_str(json).unwrap();
    assert_eq!(parsed.field("pe_ratio"), Some(11.0));
    assert_eq!(parsed.field("pb_ratio"), None);
}
