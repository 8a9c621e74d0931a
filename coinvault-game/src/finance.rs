//! Forward interest identities.
//!
//! Rates are annual percentages (`5.0` means 5%), terms are whole years and
//! `periods_per_year` is the compounding frequency (`1` for annual).

/// Simple interest `I = P·(R/100)·T`.
#[must_use]
pub fn simple_interest(principal: f64, rate_pct: f64, years: u32) -> f64 {
    principal * (rate_pct / 100.0) * f64::from(years)
}

/// Compound amount `A = P·(1 + (R/100)/n)^(n·T)`.
///
/// With `periods_per_year == 1` this is annual compounding. A frequency of
/// zero is treated as annual.
#[must_use]
pub fn compound_amount(principal: f64, rate_pct: f64, years: u32, periods_per_year: u32) -> f64 {
    let n = periods_per_year.max(1);
    let per_period = rate_pct / 100.0 / f64::from(n);
    let periods = i32::try_from(n.saturating_mul(years)).unwrap_or(i32::MAX);
    principal * (1.0 + per_period).powi(periods)
}

/// Growth factor `(1 + (R/100)/n)^(n·T)` for one unit of principal.
#[must_use]
pub fn growth_factor(rate_pct: f64, years: u32, periods_per_year: u32) -> f64 {
    compound_amount(1.0, rate_pct, years, periods_per_year)
}

/// Human label for a compounding frequency.
#[must_use]
pub const fn frequency_label(periods_per_year: u32) -> &'static str {
    match periods_per_year {
        0 | 1 => "annually",
        2 => "semi-annually",
        4 => "quarterly",
        12 => "monthly",
        365 => "daily",
        _ => "periodically",
    }
}
