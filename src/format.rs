//! Display formatting of metric values.
//!
//! The engine only produces numbers. These helpers turn a value into the
//! string a table cell or chart tooltip shows, according to the metric's
//! [ValueKind].

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};

use crate::metric::ValueKind;

/// Formats `value` for display according to `kind`.
pub fn format_value(value: f64, kind: ValueKind) -> String {
    match kind {
        ValueKind::Count => format_count(value),
        ValueKind::Currency => format_currency(value),
        ValueKind::Percentage => format_percentage(value),
    }
}

/// Formats a monetary amount with a dollar sign, thousands separators and two
/// decimal places, e.g. "$1,234.50" or "-$12.00".
pub fn format_currency(number: f64) -> String {
    static POSITIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let positive_fmt = POSITIVE_FMT.get_or_init(|| {
        Formatter::currency("$")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    static NEGATIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let negative_fmt = NEGATIVE_FMT.get_or_init(|| {
        Formatter::currency("-$")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    if number < 0.0 {
        pad_decimals(negative_fmt.fmt_string(number.abs()), 2)
    } else if number > 0.0 {
        pad_decimals(positive_fmt.fmt_string(number), 2)
    } else {
        // Zero is hardcoded as "0", so we must specify the formatted string for zero
        "$0.00".to_owned()
    }
}

/// Formats a count rounded to a whole number with thousands separators.
pub fn format_count(number: f64) -> String {
    static COUNT_FMT: OnceLock<Formatter> = OnceLock::new();

    let count_fmt = COUNT_FMT.get_or_init(|| {
        Formatter::currency("")
            .unwrap()
            .precision(Precision::Decimals(0))
    });

    let number = number.round();

    if number == 0.0 {
        "0".to_owned()
    } else if number < 0.0 {
        format!("-{}", count_fmt.fmt_string(number.abs()))
    } else {
        count_fmt.fmt_string(number)
    }
}

/// Formats a percentage (already on the 0-100 scale) with one decimal place,
/// avoiding "-0.0%".
pub fn format_percentage(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;

    if rounded == 0.0 {
        "0.0%".to_owned()
    } else {
        format!("{rounded:.1}%")
    }
}

/// numfmt drops trailing zeros after the decimal point, e.g. "12.30" is
/// rendered as "12.3", so pad the fraction back out.
fn pad_decimals(formatted: String, decimals: usize) -> String {
    match formatted.split_once('.') {
        Some((whole, fraction)) => format!("{whole}.{fraction:0<decimals$}"),
        None => format!("{formatted}.{}", "0".repeat(decimals)),
    }
}
