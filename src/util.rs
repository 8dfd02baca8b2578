// Utility helpers for parsing, period selection and number formatting.
//
// This module centralizes all the "dirty" CSV/JSON/number/date handling so
// the engine can assume clean, typed values.
use crate::types::MetricRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use num_format::{Locale, ToFormattedString};

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in exports (commas, spaces, text).
///
/// - Accepts `Option<&str>` so callers can pass through optional fields.
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters (`NaN`, `inf`, `n/a`).
/// - Strips thousands separators like `","` before parsing.
/// - Rejects decimal-comma text such as `1.500,00`; reading it with English
///   separators would be off by a factor of 1000.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    if let (Some(dot), Some(comma)) = (s.rfind('.'), s.rfind(',')) {
        if comma > dot {
            return None;
        }
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_bool_safe(s: Option<&str>) -> Option<bool> {
    let s = s?.trim().to_lowercase();
    match s.as_str() {
        "true" | "1" | "yes" | "y" | "sim" | "s" => Some(true),
        "false" | "0" | "no" | "n" | "nao" | "não" => Some(false),
        _ => None,
    }
}

/// Timestamps come as RFC 3339 from the API, but spreadsheets hand us naive
/// datetimes or bare dates. Naive values are taken as UTC.
pub fn parse_datetime_safe(s: Option<&str>) -> Option<DateTime<Utc>> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Render a loosely typed JSON value as the text the CSV path would have
/// seen, so both formats share one cleaning path. `null` becomes `None`.
/// Numbers go through `as_f64`, whose `Display` never uses exponent form,
/// so `1e22` comes out as plain digits that `parse_f64_safe` accepts.
pub fn json_to_text(v: Option<&serde_json::Value>) -> Option<String> {
    match v? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => n.as_f64().map(|f| f.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Last populated entry of a monthly series, with its index.
///
/// Reporting endpoints return twelve slots per year and leave unreported
/// months as `null`; dashboards show the most recent one that has data.
pub fn last_populated(values: &[Option<f64>]) -> Option<(usize, f64)> {
    values
        .iter()
        .enumerate()
        .rev()
        .find_map(|(idx, v)| v.filter(|x| x.is_finite()).map(|x| (idx, x)))
}

/// Most recent period with at least one reported (non-zero) actual. When no
/// period has been reported yet, the most recent period present is used so a
/// single snapshot is still selected. `None` only when no record is dated.
/// Periods are `YYYY-MM` text, so lexical order is chronological.
pub fn latest_period<'a, I>(records: I) -> Option<String>
where
    I: IntoIterator<Item = &'a MetricRecord>,
{
    let dated: Vec<(&str, f64)> = records
        .into_iter()
        .filter_map(|r| r.period.as_deref().map(|p| (p, r.actual)))
        .collect();
    let mut periods: Vec<&str> = dated.iter().map(|(p, _)| *p).collect();
    periods.sort_unstable();
    periods.dedup();
    // One monthly slot per period; `None` where nothing was reported.
    let reported: Vec<Option<f64>> = periods
        .iter()
        .map(|period| {
            let actuals: Vec<f64> = dated
                .iter()
                .filter(|(p, a)| p == period && *a != 0.0)
                .map(|(_, a)| *a)
                .collect();
            (!actuals.is_empty()).then(|| actuals.iter().sum())
        })
        .collect();
    let idx = match last_populated(&reported) {
        Some((idx, _)) => idx,
        None => periods.len().checked_sub(1)?,
    };
    Some(periods[idx].to_string())
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Format a floating-point value with:
    // - a fixed number of decimal places, and
    // - locale-aware thousands separators (e.g., `1,234,567.89`).
    if !n.is_finite() {
        return "0".to_string();
    }
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    // `num-format` inserts the commas. Anything past u128 (a saturated
    // percent, say) is shown in scientific notation instead.
    let Ok(int_val) = int_part.parse::<u128>() else {
        return format!("{:.*e}", decimals, n);
    };
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        if decimals > 0 {
            res.push('.');
            res.push_str(frac);
        }
    }
    // Avoid "-0.0" for tiny negatives that round to zero.
    let is_zero = s.chars().all(|c| c == '0' || c == '.');
    if n.is_sign_negative() && !is_zero {
        format!("-{}", res)
    } else {
        res
    }
}

/// Percent with one decimal and a trailing `%`, the way dashboards show it.
pub fn format_percent(p: f64) -> String {
    format!("{}%", format_number(p, 1))
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for counts in console messages
    // (e.g., `1,204 records loaded`).
    n.to_formatted_string(&Locale::en)
}
