//! Buffett-style point scoring over a per-ticker metrics table, and the
//! merge of value and performance metrics into the final ranking.

use std::fmt;

use analysis_core::AnalysisError;
use serde::Serialize;

/// One cell of a metrics table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Empty strings and the usual null spellings become `Missing`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || matches!(raw, "nan" | "NaN" | "null" | "None" | "NA") {
            return Cell::Missing;
        }
        match raw.parse::<f64>() {
            Ok(value) => Cell::Number(value),
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(value) if !value.is_nan() => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(value) => write!(f, "{}", value),
            Cell::Text(text) => f.write_str(text),
            Cell::Missing => Ok(()),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Missing, Cell::Number)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRecord {
    pub ticker: String,
    /// Aligned with [`MetricsTable::columns`].
    pub cells: Vec<Cell>,
}

/// Row-oriented table keyed by ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsTable {
    columns: Vec<String>,
    records: Vec<MetricsRecord>,
}

impl MetricsTable {
    /// Name of the key column in every table this module produces.
    pub const KEY_COLUMN: &'static str = "Ticker";

    /// Empty table with the given non-key columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    /// Build from raw header and string rows, e.g. a CSV file. The key column
    /// may be named `Ticker` or `Symbol`.
    pub fn from_raw(headers: &[String], rows: Vec<Vec<String>>) -> Result<Self, AnalysisError> {
        let key_idx = headers
            .iter()
            .position(|h| h == Self::KEY_COLUMN)
            .or_else(|| headers.iter().position(|h| h == "Symbol"))
            .ok_or_else(|| {
                AnalysisError::ValidationError(
                    "Metrics table has no 'Ticker' or 'Symbol' column".to_string(),
                )
            })?;

        let columns = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != key_idx)
            .map(|(_, h)| h.clone())
            .collect();
        let mut table = Self::new(columns);

        for (line, row) in rows.into_iter().enumerate() {
            if row.len() != headers.len() {
                return Err(AnalysisError::ValidationError(format!(
                    "Row {} has {} fields, expected {}",
                    line + 1,
                    row.len(),
                    headers.len()
                )));
            }
            let mut ticker = String::new();
            let mut cells = Vec::with_capacity(row.len().saturating_sub(1));
            for (i, raw) in row.into_iter().enumerate() {
                if i == key_idx {
                    ticker = raw.trim().to_string();
                } else {
                    cells.push(Cell::parse(&raw));
                }
            }
            table.push(ticker, cells)?;
        }
        Ok(table)
    }

    pub fn push(&mut self, ticker: impl Into<String>, cells: Vec<Cell>) -> Result<(), AnalysisError> {
        let ticker = ticker.into();
        if cells.len() != self.columns.len() {
            return Err(AnalysisError::ValidationError(format!(
                "Record for {} has {} cells, expected {}",
                ticker,
                cells.len(),
                self.columns.len()
            )));
        }
        self.records.push(MetricsRecord { ticker, cells });
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[MetricsRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Numeric value of `column` for the first record with `ticker`.
    pub fn value(&self, ticker: &str, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.records
            .iter()
            .find(|r| r.ticker == ticker)
            .and_then(|r| r.cells[idx].as_f64())
    }

    /// Header line for export, key column first.
    pub fn headers(&self) -> Vec<String> {
        std::iter::once(Self::KEY_COLUMN.to_string())
            .chain(self.columns.iter().cloned())
            .collect()
    }

    /// Rows rendered as strings in [`MetricsTable::headers`] order.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        self.records
            .iter()
            .map(|r| {
                std::iter::once(r.ticker.clone())
                    .chain(r.cells.iter().map(Cell::to_string))
                    .collect()
            })
            .collect()
    }
}

/// The six Buffett checks, each worth one point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuffettCriterion {
    PeRatio,
    PbRatio,
    DebtToEquity,
    Roe,
    ProfitMargin,
    DividendYield,
}

impl BuffettCriterion {
    pub const ALL: [BuffettCriterion; 6] = [
        BuffettCriterion::PeRatio,
        BuffettCriterion::PbRatio,
        BuffettCriterion::DebtToEquity,
        BuffettCriterion::Roe,
        BuffettCriterion::ProfitMargin,
        BuffettCriterion::DividendYield,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            BuffettCriterion::PeRatio => "P/E Ratio",
            BuffettCriterion::PbRatio => "P/B Ratio",
            BuffettCriterion::DebtToEquity => "Debt/Equity",
            BuffettCriterion::Roe => "ROE",
            BuffettCriterion::ProfitMargin => "Profit Margin",
            BuffettCriterion::DividendYield => "Dividend Yield",
        }
    }

    /// ROE, profit margin and dividend yield are fractions here (0.15 = 15%).
    pub fn passes(&self, value: f64) -> bool {
        match self {
            BuffettCriterion::PeRatio => value < 15.0,
            BuffettCriterion::PbRatio => value < 3.0,
            BuffettCriterion::DebtToEquity => value < 0.5,
            BuffettCriterion::Roe => value > 0.15,
            BuffettCriterion::ProfitMargin => value > 0.1,
            BuffettCriterion::DividendYield => value > 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuffettScore {
    pub ticker: String,
    /// One entry per criterion column present in the table.
    pub points: Vec<(BuffettCriterion, u8)>,
    pub total: u8,
}

/// Score every record. Missing or NaN cells never earn a point; criteria
/// whose column is absent are not scored at all.
pub fn buffett_score(table: &MetricsTable) -> Result<Vec<BuffettScore>, AnalysisError> {
    let scored: Vec<(BuffettCriterion, usize)> = BuffettCriterion::ALL
        .iter()
        .filter_map(|c| table.column_index(c.column()).map(|idx| (*c, idx)))
        .collect();

    if scored.is_empty() {
        return Err(AnalysisError::ValidationError(format!(
            "Metrics table has none of the Buffett criterion columns ({})",
            BuffettCriterion::ALL.map(|c| c.column()).join(", ")
        )));
    }

    Ok(table
        .records()
        .iter()
        .map(|record| {
            let points: Vec<(BuffettCriterion, u8)> = scored
                .iter()
                .map(|&(criterion, idx)| {
                    let hit = record.cells[idx]
                        .as_f64()
                        .is_some_and(|v| criterion.passes(v));
                    (criterion, u8::from(hit))
                })
                .collect();
            BuffettScore {
                ticker: record.ticker.clone(),
                total: points.iter().map(|(_, p)| p).sum(),
                points,
            }
        })
        .collect())
}

/// Column added by [`merge_final_analysis`].
pub const BUFFETT_SCORE_COLUMN: &str = "Buffett Score";

/// Inner-join value and performance metrics on ticker, append each value
/// record's Buffett total and rank by it (highest first, ties keep value
/// table order). `scores` must be `buffett_score(value_metrics)`.
///
/// Performance columns that clash with a value column get a `_performance`
/// suffix.
pub fn merge_final_analysis(
    value_metrics: &MetricsTable,
    performance_metrics: &MetricsTable,
    scores: &[BuffettScore],
) -> Result<MetricsTable, AnalysisError> {
    if scores.len() != value_metrics.len() {
        return Err(AnalysisError::ValidationError(format!(
            "Got {} Buffett scores for {} value records",
            scores.len(),
            value_metrics.len()
        )));
    }

    let mut columns = value_metrics.columns().to_vec();
    for column in performance_metrics.columns() {
        if value_metrics.column_index(column).is_some() {
            columns.push(format!("{}_performance", column));
        } else {
            columns.push(column.clone());
        }
    }
    columns.push(BUFFETT_SCORE_COLUMN.to_string());

    let mut ranked: Vec<(u8, MetricsRecord)> = Vec::new();
    for (record, score) in value_metrics.records().iter().zip(scores) {
        for perf in performance_metrics
            .records()
            .iter()
            .filter(|p| p.ticker == record.ticker)
        {
            let cells = record
                .cells
                .iter()
                .chain(perf.cells.iter())
                .cloned()
                .chain(std::iter::once(Cell::Number(f64::from(score.total))))
                .collect();
            ranked.push((
                score.total,
                MetricsRecord {
                    ticker: record.ticker.clone(),
                    cells,
                },
            ));
        }
    }
    // Stable sort keeps value-table order among equal scores.
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let mut merged = MetricsTable::new(columns);
    for (_, record) in ranked {
        merged.push(record.ticker, record.cells)?;
    }
    Ok(merged)
}
