// Parsing and formatting helpers.
//
// Extract columns arrive as loosely formatted strings; everything here turns
// them into typed values or `None` so the loader can count what it rejects.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

/// Trim and drop empty strings and the literal `NULL` SQL Server exports emit.
pub fn clean_str(s: Option<&str>) -> Option<&str> {
    let s = s?.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("null") {
        return None;
    }
    Some(s)
}

/// Parse a numeric column, tolerating thousands separators.
///
/// Values containing letters are rejected rather than partially parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = clean_str(s)?;
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = s.replace(',', "");
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_u32_safe(s: Option<&str>) -> Option<u32> {
    let s = clean_str(s)?;
    // Tries sometimes come through as `2.0` from Excel round-trips.
    if let Ok(v) = s.parse::<u32>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u32::MAX as f64 {
        Some(f as u32)
    } else {
        None
    }
}

/// Parse a work date. A timestamp is accepted and truncated to its date.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = clean_str(s)?;
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    parse_datetime_safe(Some(s)).map(|dt| dt.date())
}

pub fn parse_datetime_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = clean_str(s)?;
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals with `1,234,567.89` style grouping on the integer part.
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

/// Render a fraction in `[0, 1]` as a percentage; `None` is "no data".
pub fn format_percent(fraction: Option<f64>) -> String {
    match fraction {
        Some(f) => format!("{}%", format_number(f * 100.0, 2)),
        None => "N/A".to_string(),
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_columns_tolerate_separators_and_reject_text() {
        assert_eq!(parse_f64_safe(Some(" 1,234.5 ")), Some(1234.5));
        assert_eq!(parse_f64_safe(Some("8h")), None);
        assert_eq!(parse_f64_safe(Some("NULL")), None);
        assert_eq!(parse_f64_safe(None), None);
    }

    #[test]
    fn tries_accept_excel_style_floats() {
        assert_eq!(parse_u32_safe(Some("3")), Some(3));
        assert_eq!(parse_u32_safe(Some("2.0")), Some(2));
        assert_eq!(parse_u32_safe(Some("2.5")), None);
        assert_eq!(parse_u32_safe(Some("-1")), None);
    }

    #[test]
    fn dates_accept_several_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 6, 3);
        assert_eq!(parse_date_safe(Some("2024-06-03")), expected);
        assert_eq!(parse_date_safe(Some("06/03/2024")), expected);
        assert_eq!(parse_date_safe(Some("2024-06-03 07:58:00")), expected);
        assert_eq!(parse_date_safe(Some("2024-13-03")), None);
        assert_eq!(parse_date_safe(Some("")), None);
    }

    #[test]
    fn number_formatting_groups_thousands() {
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-12.5, 1), "-12.5");
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_int(9855u64), "9,855");
    }

    #[test]
    fn percent_distinguishes_no_data_from_zero() {
        assert_eq!(format_percent(Some(0.0)), "0.00%");
        assert_eq!(format_percent(Some(0.955)), "95.50%");
        assert_eq!(format_percent(None), "N/A");
    }
}
