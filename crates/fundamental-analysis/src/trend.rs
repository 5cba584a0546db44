//! Multi-period growth and trend measures.

/// Compound annual growth rate of a most-recent-first series.
///
/// `years = N - 1`. Returns 0.0 when there is fewer than two points or when
/// either endpoint is not strictly positive (compounding is undefined there).
pub fn cagr(series: &[f64]) -> f64 {
    match (series.first(), series.last()) {
        (Some(&latest), Some(&earliest)) if series.len() > 1 => {
            compound_growth(earliest, latest, (series.len() - 1) as f64)
        }
        _ => 0.0,
    }
}

fn compound_growth(earliest: f64, latest: f64, years: f64) -> f64 {
    if years > 0.0 && earliest > 0.0 && latest > 0.0 {
        (latest / earliest).powf(1.0 / years) - 1.0
    } else {
        0.0
    }
}

/// Ordinary least-squares slope of `values` against their index.
/// A single point (or none) has slope 0.
pub fn linear_trend_slope(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let (covariance, variance) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(cov, var), (i, &y)| {
            let dx = i as f64 - x_mean;
            (cov + dx * (y - y_mean), var + dx * dx)
        });

    covariance / variance
}

/// Share of net income paid out as dividends. Dividends are often reported as
/// a negative cash outflow, so only the magnitude is used.
pub fn payout_ratio(dividends_paid: f64, net_income: f64) -> f64 {
    if net_income > 0.0 {
        dividends_paid.abs() / net_income
    } else {
        0.0
    }
}
