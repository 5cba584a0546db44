//! Single-ratio valuation metrics.
//!
//! All functions are total. A non-positive denominator never raises: the
//! valuation ratios return `+inf` (undefined, which every `max_*` screening
//! bound rejects) while the return/margin style metrics return `0.0`.
//! NaN denominators are treated as non-positive.

/// Price-to-earnings.
pub fn pe_ratio(price: f64, eps: f64) -> f64 {
    if eps > 0.0 {
        price / eps
    } else {
        f64::INFINITY
    }
}

/// Price-to-book, with book value per share.
pub fn pb_ratio(price: f64, book_value: f64) -> f64 {
    if book_value > 0.0 {
        price / book_value
    } else {
        f64::INFINITY
    }
}

pub fn debt_to_equity(total_debt: f64, total_equity: f64) -> f64 {
    if total_equity > 0.0 {
        total_debt / total_equity
    } else {
        f64::INFINITY
    }
}

/// Return on equity as a percentage.
pub fn roe(net_income: f64, avg_equity: f64) -> f64 {
    if avg_equity > 0.0 {
        (net_income / avg_equity) * 100.0
    } else {
        0.0
    }
}

/// Operating margin as a percentage.
pub fn operating_margin(operating_income: f64, revenue: f64) -> f64 {
    if revenue > 0.0 {
        (operating_income / revenue) * 100.0
    } else {
        0.0
    }
}

pub fn free_cash_flow(operating_cash_flow: f64, capital_expenditures: f64) -> f64 {
    operating_cash_flow - capital_expenditures
}

/// Generic turnover ratio (asset turnover, inventory turnover).
pub fn turnover(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
