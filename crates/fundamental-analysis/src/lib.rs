pub mod competitive;
pub mod metrics;
pub mod models;
pub mod trend;

use analysis_core::{AnalysisError, FinancialStatements, LineItem, StatementKind};

pub use competitive::{advantage_label, assess_competitive_advantage, CompetitiveAssessment};
pub use models::*;

use LineItem::*;
use StatementKind::{BalanceSheet, CashFlow, IncomeStatement};

/// Value-investing analysis over one symbol's financial statements.
///
/// Pure: no I/O, no logging. Fetching statements and prices is the caller's
/// job (see `analysis-orchestrator`).
pub struct ValueAnalysisEngine;

impl ValueAnalysisEngine {
    pub fn new() -> Self {
        Self
    }

    /// Analyze one symbol. Statement periods must be most-recent-first.
    ///
    /// Required line items missing from the latest period fail with
    /// [`AnalysisError::MissingData`]; they are never replaced by zero.
    pub fn analyze_stock(
        &self,
        symbol: &str,
        financials: &FinancialStatements,
        latest_price: f64,
    ) -> Result<StockAnalysis, AnalysisError> {
        self.check_statements(symbol, financials)?;

        Ok(StockAnalysis {
            symbol: symbol.to_string(),
            latest_price,
            fundamental_metrics: self.fundamental_metrics(financials, latest_price)?,
            growth_metrics: self.growth_metrics(financials),
            efficiency_metrics: self.efficiency_metrics(financials)?,
            competitive_analysis: self.competitive_position(financials),
            free_cash_flow: self.free_cash_flow(financials),
        })
    }

    fn check_statements(
        &self,
        symbol: &str,
        financials: &FinancialStatements,
    ) -> Result<(), AnalysisError> {
        for kind in [IncomeStatement, BalanceSheet] {
            if financials.statement(kind).is_empty() {
                return Err(AnalysisError::InsufficientData(format!(
                    "No {} periods for {}",
                    kind.label(),
                    symbol
                )));
            }
        }
        for kind in [IncomeStatement, BalanceSheet, CashFlow] {
            financials.statement(kind).validate_ordering(kind)?;
        }
        Ok(())
    }

    fn fundamental_metrics(
        &self,
        financials: &FinancialStatements,
        price: f64,
    ) -> Result<FundamentalMetrics, AnalysisError> {
        let eps = financials.require(IncomeStatement, Eps)?;
        let book_value = financials.require(BalanceSheet, BookValuePerShare)?;
        let debt = financials.require(BalanceSheet, TotalDebt)?;
        let equity = financials.require(BalanceSheet, TotalStockholderEquity)?;
        let net_income = financials.require(IncomeStatement, NetIncome)?;

        Ok(FundamentalMetrics {
            pe_ratio: metrics::pe_ratio(price, eps),
            pb_ratio: metrics::pb_ratio(price, book_value),
            debt_to_equity: metrics::debt_to_equity(debt, equity),
            roe: metrics::roe(net_income, equity),
        })
    }

    fn growth_metrics(&self, financials: &FinancialStatements) -> GrowthMetrics {
        let income = &financials.income_statement;
        let revenue_growth = trend::cagr(&income.series(TotalRevenue));
        let earnings_growth = trend::cagr(&income.series(NetIncome));

        GrowthMetrics {
            revenue_growth,
            earnings_growth,
            sustainable_growth_rate: earnings_growth * (1.0 - self.payout_ratio(financials)),
        }
    }

    /// Dividends may sit on the income statement or the cash-flow statement.
    /// When neither reports them the payout is taken as zero.
    fn payout_ratio(&self, financials: &FinancialStatements) -> f64 {
        let dividends = financials
            .latest_value(IncomeStatement, DividendsPaid)
            .or_else(|| financials.latest_value(CashFlow, DividendsPaid));
        match (dividends, financials.latest_value(IncomeStatement, NetIncome)) {
            (Some(dividends), Some(net_income)) => trend::payout_ratio(dividends, net_income),
            _ => 0.0,
        }
    }

    fn efficiency_metrics(
        &self,
        financials: &FinancialStatements,
    ) -> Result<EfficiencyMetrics, AnalysisError> {
        let operating_income = financials.require(IncomeStatement, OperatingIncome)?;
        let revenue = financials.require(IncomeStatement, TotalRevenue)?;
        let total_assets = financials.require(BalanceSheet, TotalAssets)?;
        let cost_of_revenue = financials.require(IncomeStatement, CostOfRevenue)?;
        let inventory = financials.require(BalanceSheet, Inventory)?;

        Ok(EfficiencyMetrics {
            operating_margin: metrics::operating_margin(operating_income, revenue),
            asset_turnover: metrics::turnover(revenue, total_assets),
            inventory_turnover: metrics::turnover(cost_of_revenue, inventory),
        })
    }

    /// Market share and industry margins need comparative data we do not
    /// have, so both are single-zero placeholders.
    fn competitive_position(&self, financials: &FinancialStatements) -> CompetitiveAssessment {
        // Same most-recent-first order as the statement, so the slope is
        // taken against periods counted back from the latest.
        let margins: Vec<f64> = financials
            .income_statement
            .periods()
            .iter()
            .filter_map(|p| match (p.get(OperatingIncome), p.get(TotalRevenue)) {
                (Some(op_income), Some(revenue)) => {
                    Some(metrics::operating_margin(op_income, revenue))
                }
                _ => None,
            })
            .collect();

        assess_competitive_advantage(&margins, &[0.0], &[0.0])
    }

    /// Capex is compared by magnitude since providers disagree on its sign.
    fn free_cash_flow(&self, financials: &FinancialStatements) -> Option<f64> {
        let ocf = financials.latest_value(CashFlow, OperatingCashFlow)?;
        let capex = financials.latest_value(CashFlow, CapitalExpenditures)?;
        Some(metrics::free_cash_flow(ocf, capex.abs()))
    }
}

impl Default for ValueAnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}
