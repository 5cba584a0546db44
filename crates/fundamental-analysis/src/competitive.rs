use analysis_core::stats::mean;
use serde::{Deserialize, Serialize};

use crate::trend::linear_trend_slope;

/// Qualitative read on how durable a company's competitive position is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitiveAssessment {
    pub margin_trend: f64,
    pub market_share_trend: f64,
    /// 0-3, one point per favourable signal.
    pub advantage_score: u8,
    pub assessment: String,
}

/// Fixed wording for each advantage score. Downstream consumers match on
/// these strings, so they must not change.
pub fn advantage_label(score: u8) -> &'static str {
    match score {
        0 => "No sustainable competitive advantage",
        1 => "Weak competitive advantage",
        2 => "Moderate competitive advantage",
        3 => "Strong competitive advantage",
        _ => "Unknown",
    }
}

/// Scores margin trend, market-share trend and own-vs-industry margins.
///
/// Slopes are taken against series position, so the caller picks the
/// direction; statement series arrive most-recent-first.
/// Any series may have a different length from the others.
pub fn assess_competitive_advantage(
    operating_margins: &[f64],
    market_share: &[f64],
    industry_margins: &[f64],
) -> CompetitiveAssessment {
    let margin_trend = linear_trend_slope(operating_margins);
    let market_share_trend = linear_trend_slope(market_share);

    let signals = [
        margin_trend > 0.0,
        market_share_trend > 0.0,
        mean(operating_margins) > mean(industry_margins),
    ];
    let advantage_score = signals.iter().filter(|&&s| s).count() as u8;

    CompetitiveAssessment {
        margin_trend,
        market_share_trend,
        advantage_score,
        assessment: advantage_label(advantage_score).to_string(),
    }
}
