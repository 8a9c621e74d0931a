//! Numeric rounding, comparison and display helpers shared by every subsystem.

use num_traits::cast::cast;

/// Decimal places kept for currency amounts.
pub const CENT_PLACES: u32 = 2;
/// Decimal places shown by the calculator after evaluation.
pub const CALCULATOR_PLACES: u32 = 4;

/// Round a value to `places` decimal places, half away from zero.
///
/// Non-finite inputs are returned unchanged.
#[must_use]
pub fn round_to_places(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10_f64.powi(i32::try_from(places).unwrap_or(i32::MAX));
    let scaled = value * factor;
    // Nudge by the representation error so 1.005 rounds like the decimal it was typed as.
    let nudged = scaled + scaled.signum() * scaled.abs() * f64::EPSILON;
    nudged.round() / factor
}

/// Round a currency amount to cents.
#[must_use]
pub fn round_to_cents(value: f64) -> f64 {
    round_to_places(value, CENT_PLACES)
}

/// Round a currency amount to the nearest whole unit.
#[must_use]
pub fn round_to_units(value: f64) -> f64 {
    round_to_places(value, 0)
}

/// Tolerant equality with an absolute epsilon.
#[must_use]
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() <= epsilon
}

/// Round a f64 and clamp it to the i64 range, returning 0 for non-finite values.
#[must_use]
pub fn round_f64_to_i64(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    let min = cast::<i64, f64>(i64::MIN).unwrap_or(f64::MIN);
    let max = cast::<i64, f64>(i64::MAX).unwrap_or(f64::MAX);
    let clamped = value.clamp(min, max).round();
    cast::<f64, i64>(clamped).unwrap_or(0)
}

/// Convert i64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn i64_to_f64(value: i64) -> f64 {
    cast::<i64, f64>(value).unwrap_or(0.0)
}

/// Format a currency amount with thousands separators and two decimals.
///
/// Whole amounts drop the fractional part (`12,000` rather than `12,000.00`).
#[must_use]
pub fn format_currency(value: f64) -> String {
    let cents = round_f64_to_i64(round_to_cents(value) * 100.0);
    let negative = cents < 0;
    let cents = cents.unsigned_abs();
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    if frac == 0 {
        format!("{sign}${grouped}")
    } else {
        format!("{sign}${grouped}.{frac:02}")
    }
}

/// Format a value with at most `places` decimals, trimming trailing zeros.
#[must_use]
pub fn format_trimmed(value: f64, places: u32) -> String {
    let rounded = round_to_places(value, places);
    let width = usize::try_from(places).unwrap_or(0);
    let text = format!("{rounded:.width$}");
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    };
    if text == "-0" { "0".to_string() } else { text }
}
