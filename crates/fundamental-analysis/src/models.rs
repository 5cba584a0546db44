use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::competitive::CompetitiveAssessment;

/// Serde adapter for ratios that may be infinite. JSON has no infinity, and
/// serde_json would otherwise write `null`.
mod non_finite {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if *value > 0.0 {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.to_ascii_lowercase().as_str() {
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("invalid ratio '{}'", other))),
            },
        }
    }
}

/// Valuation and leverage ratios from the latest period.
/// `f64::INFINITY` marks a ratio with a non-positive denominator; in JSON it
/// is written as `"inf"` so it stays distinct from a missing value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalMetrics {
    #[serde(with = "non_finite")]
    pub pe_ratio: f64,
    #[serde(with = "non_finite")]
    pub pb_ratio: f64,
    #[serde(with = "non_finite")]
    pub debt_to_equity: f64,
    /// Percentage units.
    pub roe: f64,
}

/// Fractional growth rates (0.10 = 10%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthMetrics {
    pub revenue_growth: f64,
    pub earnings_growth: f64,
    pub sustainable_growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    /// Percentage units.
    pub operating_margin: f64,
    pub asset_turnover: f64,
    pub inventory_turnover: f64,
}

/// Full value analysis of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAnalysis {
    pub symbol: String,
    pub latest_price: f64,
    pub fundamental_metrics: FundamentalMetrics,
    pub growth_metrics: GrowthMetrics,
    pub efficiency_metrics: EfficiencyMetrics,
    pub competitive_analysis: CompetitiveAssessment,
    /// Only present when the cash-flow statement reports both inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_cash_flow: Option<f64>,
}

impl StockAnalysis {
    /// Plain-text summary for console output.
    pub fn summary(&self) -> String {
        let f = &self.fundamental_metrics;
        let g = &self.growth_metrics;
        let e = &self.efficiency_metrics;

        let mut out = format!("Value Stock Analysis Report for {}\n", self.symbol);
        let _ = writeln!(out, "\nFundamental Metrics:");
        let _ = writeln!(out, "pe_ratio: {:.2}", f.pe_ratio);
        let _ = writeln!(out, "pb_ratio: {:.2}", f.pb_ratio);
        let _ = writeln!(out, "debt_to_equity: {:.2}", f.debt_to_equity);
        let _ = writeln!(out, "roe: {:.2}", f.roe);

        let _ = writeln!(out, "\nGrowth Metrics:");
        let _ = writeln!(out, "revenue_growth: {:.2}%", g.revenue_growth * 100.0);
        let _ = writeln!(out, "earnings_growth: {:.2}%", g.earnings_growth * 100.0);
        let _ = writeln!(
            out,
            "sustainable_growth_rate: {:.2}%",
            g.sustainable_growth_rate * 100.0
        );

        let _ = writeln!(out, "\nEfficiency Metrics:");
        let _ = writeln!(out, "operating_margin: {:.2}", e.operating_margin);
        let _ = writeln!(out, "asset_turnover: {:.2}", e.asset_turnover);
        let _ = writeln!(out, "inventory_turnover: {:.2}", e.inventory_turnover);
        if let Some(fcf) = self.free_cash_flow {
            let _ = writeln!(out, "free_cash_flow: {:.2}", fcf);
        }

        let _ = writeln!(out, "\nCompetitive Analysis:");
        let _ = writeln!(out, "{}", self.competitive_analysis.assessment);
        out
    }
}
