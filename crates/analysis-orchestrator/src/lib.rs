use analysis_core::{AnalysisError, FinancialDataProvider};
use fundamental_analysis::{StockAnalysis, ValueAnalysisEngine};

pub mod buffett;
pub mod observer;
pub mod screener;

pub use buffett::{
    buffett_score, merge_final_analysis, BuffettCriterion, BuffettScore, Cell, MetricsRecord,
    MetricsTable,
};
pub use observer::{NoopObserver, ScreenObserver, TracingObserver};
pub use screener::{
    ScreeningCriteria, ScreeningReport, ScreeningResultRow, SkippedSymbol, ValueScreener,
};

/// Couples a data provider with the value analyzer: fetch, then analyze.
pub struct AnalysisOrchestrator<P> {
    provider: P,
    engine: ValueAnalysisEngine,
}

impl<P: FinancialDataProvider> AnalysisOrchestrator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            engine: ValueAnalysisEngine::new(),
        }
    }

    /// Fetch statements and the latest price for `symbol` and run the
    /// value analysis over them.
    pub fn analyze(&self, symbol: &str) -> Result<StockAnalysis, AnalysisError> {
        tracing::debug!("Analyzing {}", symbol);

        let financials = self.provider.get_financial_statements(symbol)?;
        let latest_price = self.provider.get_latest_price(symbol)?;

        let analysis = self.engine.analyze_stock(symbol, &financials, latest_price)?;
        tracing::debug!(
            "{}: P/E {:.2}, P/B {:.2}, {}",
            symbol,
            analysis.fundamental_metrics.pe_ratio,
            analysis.fundamental_metrics.pb_ratio,
            analysis.competitive_analysis.assessment
        );
        Ok(analysis)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;

    use analysis_core::{
        AnalysisError, FinancialDataProvider, FinancialStatement, FinancialStatements,
        LineItem::*, PriceBar, StatementPeriod,
    };
    use chrono::NaiveDate;

    /// Knobs for one synthetic company. Three periods, most recent first.
    #[derive(Clone, Copy)]
    pub struct Company {
        pub price: f64,
        pub eps: f64,
        pub book_value: f64,
        pub debt: f64,
        pub equity: f64,
        pub net_income: [f64; 3],
        pub revenue: [f64; 3],
    }

    impl Default for Company {
        fn default() -> Self {
            Self {
                price: 30.0,
                eps: 1.5,
                book_value: 12.0,
                debt: 80000.0,
                equity: 120000.0,
                net_income: [15000.0, 13000.0, 10000.0],
                revenue: [100000.0, 90000.0, 80000.0],
            }
        }
    }

    impl Company {
        pub fn statements(&self) -> FinancialStatements {
            let income = (0..3)
                .map(|i| {
                    StatementPeriod::new()
                        .with(TotalRevenue, self.revenue[i])
                        .with(OperatingIncome, self.revenue[i] * 0.2)
                        .with(NetIncome, self.net_income[i])
                        .with(Eps, self.eps)
                        .with(CostOfRevenue, self.revenue[i] * 0.6)
                })
                .collect();
            let balance = vec![StatementPeriod::new()
                .with(TotalAssets, 200000.0)
                .with(TotalDebt, self.debt)
                .with(TotalStockholderEquity, self.equity)
                .with(BookValuePerShare, self.book_value)
                .with(Inventory, 10000.0)];

            FinancialStatements {
                income_statement: FinancialStatement::new(income),
                balance_sheet: FinancialStatement::new(balance),
                cash_flow: FinancialStatement::default(),
            }
        }
    }

    /// In-memory provider. Unknown symbols fail like a provider outage.
    #[derive(Default)]
    pub struct StaticProvider {
        companies: HashMap<String, Company>,
    }

    impl StaticProvider {
        pub fn with(mut self, symbol: &str, company: Company) -> Self {
            self.companies.insert(symbol.to_string(), company);
            self
        }

        fn company(&self, symbol: &str) -> Result<&Company, AnalysisError> {
            self.companies
                .get(symbol)
                .ok_or_else(|| AnalysisError::ProviderError(format!("unknown symbol {}", symbol)))
        }
    }

    impl FinancialDataProvider for StaticProvider {
        fn get_financial_statements(&self, symbol: &str) -> Result<FinancialStatements, AnalysisError> {
            self.company(symbol).map(Company::statements)
        }

        fn get_latest_price(&self, symbol: &str) -> Result<f64, AnalysisError> {
            self.company(symbol).map(|c| c.price)
        }

        fn get_price_history(
            &self,
            symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<PriceBar>, AnalysisError> {
            self.company(symbol).map(|_| Vec::new())
        }
    }
}
