use std::sync::Arc;

use chrono::NaiveDate;

use crate::{AnalysisError, FinancialStatements, PriceBar};

/// Single fetch contract for market and fundamental data.
///
/// Implementations own shape validation, timeouts and transport concerns;
/// the analyzers treat whatever comes back as already shaped.
pub trait FinancialDataProvider: Send + Sync {
    fn get_financial_statements(&self, symbol: &str) -> Result<FinancialStatements, AnalysisError>;

    fn get_latest_price(&self, symbol: &str) -> Result<f64, AnalysisError>;

    /// Bars within `[start, end]`, oldest first.
    fn get_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError>;
}

impl<P: FinancialDataProvider + ?Sized> FinancialDataProvider for Arc<P> {
    fn get_financial_statements(&self, symbol: &str) -> Result<FinancialStatements, AnalysisError> {
        (**self).get_financial_statements(symbol)
    }

    fn get_latest_price(&self, symbol: &str) -> Result<f64, AnalysisError> {
        (**self).get_latest_price(symbol)
    }

    fn get_price_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, AnalysisError> {
        (**self).get_price_history(symbol, start, end)
    }
}
