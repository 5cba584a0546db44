use std::collections::HashMap;
use std::sync::Arc;

use analysis_core::{AnalysisError, FinancialDataProvider};
use fundamental_analysis::StockAnalysis;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::observer::{ScreenObserver, TracingObserver};
use crate::AnalysisOrchestrator;

/// Value thresholds a symbol must meet. Unset bounds always pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScreeningCriteria {
    pub max_pe: Option<f64>,
    pub max_pb: Option<f64>,
    pub max_debt_to_equity: Option<f64>,
    /// Percentage units, like `FundamentalMetrics::roe`.
    pub min_roe: Option<f64>,
    /// Fractional (0.05 = 5%).
    pub min_revenue_growth: Option<f64>,
    /// Fractional (0.05 = 5%).
    pub min_earnings_growth: Option<f64>,
}

impl ScreeningCriteria {
    pub const KEYS: [&'static str; 6] = [
        "max_pe",
        "max_pb",
        "max_debt_to_equity",
        "min_roe",
        "min_revenue_growth",
        "min_earnings_growth",
    ];

    /// Build criteria from a name -> bound map, e.g. a parsed JSON object.
    pub fn from_map(map: &HashMap<String, f64>) -> Result<Self, AnalysisError> {
        let mut criteria = Self::default();
        for (name, &value) in map {
            let slot = match name.as_str() {
                "max_pe" => &mut criteria.max_pe,
                "max_pb" => &mut criteria.max_pb,
                "max_debt_to_equity" => &mut criteria.max_debt_to_equity,
                "min_roe" => &mut criteria.min_roe,
                "min_revenue_growth" => &mut criteria.min_revenue_growth,
                "min_earnings_growth" => &mut criteria.min_earnings_growth,
                other => {
                    return Err(AnalysisError::ValidationError(format!(
                        "Unknown screening criterion '{}' (expected one of: {})",
                        other,
                        Self::KEYS.join(", ")
                    )))
                }
            };
            *slot = Some(value);
        }
        criteria.validate()?;
        Ok(criteria)
    }

    fn bounds(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("max_pe", self.max_pe),
            ("max_pb", self.max_pb),
            ("max_debt_to_equity", self.max_debt_to_equity),
            ("min_roe", self.min_roe),
            ("min_revenue_growth", self.min_revenue_growth),
            ("min_earnings_growth", self.min_earnings_growth),
        ]
    }

    /// NaN bounds would silently reject every symbol.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, bound) in self.bounds() {
            if bound.is_some_and(f64::is_nan) {
                return Err(AnalysisError::ValidationError(format!(
                    "Screening criterion '{}' is NaN",
                    name
                )));
            }
        }
        Ok(())
    }

    /// All bounds must hold. NaN metrics fail every set bound.
    pub fn matches(&self, analysis: &StockAnalysis) -> bool {
        let f = &analysis.fundamental_metrics;
        let g = &analysis.growth_metrics;

        let at_most = |value: f64, bound: Option<f64>| bound.map_or(true, |b| value <= b);
        let at_least = |value: f64, bound: Option<f64>| bound.map_or(true, |b| value >= b);

        at_most(f.pe_ratio, self.max_pe)
            && at_most(f.pb_ratio, self.max_pb)
            && at_most(f.debt_to_equity, self.max_debt_to_equity)
            && at_least(f.roe, self.min_roe)
            && at_least(g.revenue_growth, self.min_revenue_growth)
            && at_least(g.earnings_growth, self.min_earnings_growth)
    }
}

/// One passing symbol, laid out for tabular export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningResultRow {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "P/E Ratio")]
    pub pe_ratio: f64,
    #[serde(rename = "P/B Ratio")]
    pub pb_ratio: f64,
    #[serde(rename = "Debt/Equity")]
    pub debt_to_equity: f64,
    #[serde(rename = "ROE (%)")]
    pub roe: f64,
    #[serde(rename = "Revenue Growth (%)")]
    pub revenue_growth_pct: f64,
    #[serde(rename = "Earnings Growth (%)")]
    pub earnings_growth_pct: f64,
    #[serde(rename = "Competitive Position")]
    pub competitive_position: String,
    #[serde(rename = "Advantage Score")]
    pub advantage_score: u8,
}

impl ScreeningResultRow {
    /// Export column names, in field order.
    pub const COLUMNS: [&'static str; 9] = [
        "Symbol",
        "P/E Ratio",
        "P/B Ratio",
        "Debt/Equity",
        "ROE (%)",
        "Revenue Growth (%)",
        "Earnings Growth (%)",
        "Competitive Position",
        "Advantage Score",
    ];
}

impl From<&StockAnalysis> for ScreeningResultRow {
    fn from(analysis: &StockAnalysis) -> Self {
        let f = &analysis.fundamental_metrics;
        let g = &analysis.growth_metrics;
        Self {
            symbol: analysis.symbol.clone(),
            pe_ratio: f.pe_ratio,
            pb_ratio: f.pb_ratio,
            debt_to_equity: f.debt_to_equity,
            roe: f.roe,
            revenue_growth_pct: g.revenue_growth * 100.0,
            earnings_growth_pct: g.earnings_growth * 100.0,
            competitive_position: analysis.competitive_analysis.assessment.clone(),
            advantage_score: analysis.competitive_analysis.advantage_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreeningReport {
    /// Passing symbols in input order.
    pub rows: Vec<ScreeningResultRow>,
    pub skipped: Vec<SkippedSymbol>,
    pub total_analyzed: usize,
}

/// Runs the value analysis over a universe of symbols and keeps the ones
/// that meet a [`ScreeningCriteria`].
pub struct ValueScreener<P> {
    orchestrator: Arc<AnalysisOrchestrator<P>>,
    observer: Arc<dyn ScreenObserver>,
}

impl<P: FinancialDataProvider> ValueScreener<P> {
    pub fn new(orchestrator: Arc<AnalysisOrchestrator<P>>) -> Self {
        Self::with_observer(orchestrator, Arc::new(TracingObserver))
    }

    pub fn with_observer(
        orchestrator: Arc<AnalysisOrchestrator<P>>,
        observer: Arc<dyn ScreenObserver>,
    ) -> Self {
        Self {
            orchestrator,
            observer,
        }
    }

    /// Screen `symbols` against `criteria`.
    ///
    /// Invalid criteria fail the whole call. A failure for one symbol only
    /// skips that symbol. Duplicates are analyzed once per occurrence.
    pub fn screen<S>(
        &self,
        symbols: &[S],
        criteria: &ScreeningCriteria,
    ) -> Result<ScreeningReport, AnalysisError>
    where
        S: AsRef<str> + Sync,
    {
        criteria.validate()?;
        self.observer.on_start(symbols.len());

        // Ordered collect: results line up with `symbols` regardless of
        // which worker finished first.
        let outcomes: Vec<Result<StockAnalysis, AnalysisError>> = symbols
            .par_iter()
            .map(|symbol| self.orchestrator.analyze(symbol.as_ref()))
            .collect();

        let mut rows = Vec::new();
        let mut skipped = Vec::new();
        for (symbol, outcome) in symbols.iter().zip(outcomes) {
            let symbol = symbol.as_ref();
            match outcome {
                Ok(analysis) => {
                    if criteria.matches(&analysis) {
                        rows.push(ScreeningResultRow::from(&analysis));
                    }
                }
                Err(e) => {
                    self.observer.on_symbol_failed(symbol, &e);
                    skipped.push(SkippedSymbol {
                        symbol: symbol.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let report = ScreeningReport {
            rows,
            skipped,
            total_analyzed: symbols.len(),
        };
        self.observer.on_complete(&report);
        Ok(report)
    }
}
