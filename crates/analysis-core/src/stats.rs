//! Small statistics helpers shared by the analyzers and the backtester.
//!
//! Every function is total: empty input yields 0.0 instead of NaN so that
//! downstream comparisons stay well-ordered.

/// Compute the arithmetic mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation (divides by N, not N-1).
pub fn population_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Running sum of a series.
pub fn cumulative_sum(data: &[f64]) -> Vec<f64> {
    data.iter()
        .scan(0.0, |acc, x| {
            *acc += x;
            Some(*acc)
        })
        .collect()
}
