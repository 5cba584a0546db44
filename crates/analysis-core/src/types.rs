use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// Line items the value analyzers read from financial statements.
///
/// Statements are keyed by the provider's human-readable labels, so each
/// variant maps to the exact label used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineItem {
    TotalRevenue,
    OperatingIncome,
    NetIncome,
    Eps,
    CostOfRevenue,
    DividendsPaid,
    TotalAssets,
    TotalDebt,
    TotalStockholderEquity,
    BookValuePerShare,
    Inventory,
    OperatingCashFlow,
    CapitalExpenditures,
}

impl LineItem {
    pub fn label(&self) -> &'static str {
        match self {
            LineItem::TotalRevenue => "Total Revenue",
            LineItem::OperatingIncome => "Operating Income",
            LineItem::NetIncome => "Net Income",
            LineItem::Eps => "EPS",
            LineItem::CostOfRevenue => "Cost of Revenue",
            LineItem::DividendsPaid => "Dividends Paid",
            LineItem::TotalAssets => "Total Assets",
            LineItem::TotalDebt => "Total Debt",
            LineItem::TotalStockholderEquity => "Total Stockholder Equity",
            LineItem::BookValuePerShare => "Book Value per Share",
            LineItem::Inventory => "Inventory",
            LineItem::OperatingCashFlow => "Operating Cash Flow",
            LineItem::CapitalExpenditures => "Capital Expenditures",
        }
    }
}

impl fmt::Display for LineItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which of the three statements a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
}

impl StatementKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatementKind::IncomeStatement => "income_statement",
            StatementKind::BalanceSheet => "balance_sheet",
            StatementKind::CashFlow => "cash_flow",
        }
    }
}

/// One reporting period: line-item label -> value. `None` and a missing key
/// both mean the provider did not report the item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementPeriod {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_end: Option<NaiveDate>,
    #[serde(flatten)]
    pub items: BTreeMap<String, Option<f64>>,
}

impl StatementPeriod {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ending(period_end: NaiveDate) -> Self {
        Self {
            period_end: Some(period_end),
            items: BTreeMap::new(),
        }
    }

    /// Builder used by providers and tests.
    pub fn with(mut self, item: LineItem, value: f64) -> Self {
        self.items.insert(item.label().to_string(), Some(value));
        self
    }

    pub fn get(&self, item: LineItem) -> Option<f64> {
        self.items.get(item.label()).copied().flatten()
    }
}

/// Periods ordered most-recent-first. Read-only once constructed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinancialStatement {
    periods: Vec<StatementPeriod>,
}

impl FinancialStatement {
    pub fn new(periods: Vec<StatementPeriod>) -> Self {
        Self { periods }
    }

    pub fn periods(&self) -> &[StatementPeriod] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn latest(&self) -> Option<&StatementPeriod> {
        self.periods.first()
    }

    /// Values of one item across all periods. Absent values become NaN so the
    /// series keeps its length and NaN never compares as positive.
    pub fn series(&self, item: LineItem) -> Vec<f64> {
        self.periods
            .iter()
            .map(|p| p.get(item).unwrap_or(f64::NAN))
            .collect()
    }

    /// Checks the most-recent-first precondition. Periods without a
    /// `period_end` cannot be checked and are accepted as given.
    pub fn validate_ordering(&self, kind: StatementKind) -> Result<(), AnalysisError> {
        let dated: Vec<NaiveDate> = self.periods.iter().filter_map(|p| p.period_end).collect();
        if let Some(pair) = dated.windows(2).find(|w| w[0] <= w[1]) {
            return Err(AnalysisError::InvalidData(format!(
                "{} periods must be ordered most-recent-first ({} is not after {})",
                kind.label(),
                pair[0],
                pair[1]
            )));
        }
        Ok(())
    }
}

/// The three statements a provider returns for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    pub income_statement: FinancialStatement,
    pub balance_sheet: FinancialStatement,
    #[serde(default)]
    pub cash_flow: FinancialStatement,
}

impl FinancialStatements {
    pub fn statement(&self, kind: StatementKind) -> &FinancialStatement {
        match kind {
            StatementKind::IncomeStatement => &self.income_statement,
            StatementKind::BalanceSheet => &self.balance_sheet,
            StatementKind::CashFlow => &self.cash_flow,
        }
    }

    /// Latest-period value of an item that must be present.
    pub fn require(&self, kind: StatementKind, item: LineItem) -> Result<f64, AnalysisError> {
        self.latest_value(kind, item).ok_or_else(|| {
            AnalysisError::MissingData(format!(
                "'{}' not reported in latest {} period",
                item,
                kind.label()
            ))
        })
    }

    pub fn latest_value(&self, kind: StatementKind, item: LineItem) -> Option<f64> {
        self.statement(kind).latest().and_then(|p| p.get(item))
    }
}

/// Daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}
