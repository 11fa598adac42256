//! Pure cell-coercion helpers.
//!
//! Remote sheets are maintained by hand, so numeric cells arrive in every
//! format the author felt like that day: `$1,234.50`, `40%`, `-`, or
//! nothing at all. Every function here is total and defaults to `0` on
//! empty, dash, unparsable, or missing input; malformed cells degrade to
//! zero rather than poisoning the whole row.

use chrono::NaiveDate;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];

fn parse_numeric(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else { return 0.0 };
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return 0.0;
    }
    trimmed.parse::<f64>().unwrap_or(0.0)
}

pub fn to_float(raw: Option<&str>) -> f64 {
    parse_numeric(raw)
}

/// Integer cells still come back as `f64`: downstream math (averages,
/// per-order ratios) always runs in floating point anyway.
pub fn to_integer(raw: Option<&str>) -> f64 {
    parse_numeric(raw).trunc()
}

pub fn to_currency(raw: Option<&str>) -> f64 {
    let cleaned = raw.map(|s| s.replace(['$', ','], ""));
    parse_numeric(cleaned.as_deref())
}

pub fn to_percentage(raw: Option<&str>) -> f64 {
    let cleaned = raw.map(|s| s.replace('%', ""));
    parse_numeric(cleaned.as_deref())
}

/// Whether a cell would survive numeric coercion without falling back to
/// the zero default. Lets callers flag garbled cells (`"N/A"`) without
/// changing the lenient coercion contract.
pub fn is_parsable_number(raw: &str) -> bool {
    let cleaned = raw.replace(['$', ',', '%'], "");
    let trimmed = cleaned.trim();
    !trimmed.is_empty() && trimmed != "-" && trimmed.parse::<f64>().is_ok()
}

/// Tolerant date parser covering the formats seen across the sheets.
/// Month-granularity cells (`2026-07`) come from the performance source.
pub fn to_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_defaults_to_zero_on_missing_or_garbled_input() {
        assert_eq!(to_currency(Some("")), 0.0);
        assert_eq!(to_currency(Some("-")), 0.0);
        assert_eq!(to_currency(None), 0.0);
        assert_eq!(to_currency(Some("N/A")), 0.0);
    }

    #[test]
    fn currency_strips_dollar_signs_and_separators() {
        assert_eq!(to_currency(Some("$1,234.50")), 1234.50);
        assert_eq!(to_currency(Some("  $99 ")), 99.0);
    }

    #[test]
    fn percentage_strips_the_percent_sign() {
        assert_eq!(to_percentage(Some("40%")), 40.0);
        assert_eq!(to_percentage(Some("12.5")), 12.5);
        assert_eq!(to_percentage(Some("")), 0.0);
    }

    #[test]
    fn integer_truncates_fractional_cells() {
        assert_eq!(to_integer(Some("42")), 42.0);
        assert_eq!(to_integer(Some("42.9")), 42.0);
        assert_eq!(to_integer(Some("oops")), 0.0);
    }

    #[test]
    fn float_parses_plain_numbers() {
        assert_eq!(to_float(Some("3.25")), 3.25);
        assert_eq!(to_float(Some("bogus")), 0.0);
    }

    #[test]
    fn parsable_check_tracks_the_coercion_rules() {
        assert!(is_parsable_number("$1,234.50"));
        assert!(is_parsable_number("40%"));
        assert!(!is_parsable_number("N/A"));
        assert!(!is_parsable_number(""));
        assert!(!is_parsable_number("-"));
    }

    #[test]
    fn date_parser_covers_sheet_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 7, 4).unwrap();
        assert_eq!(to_date("2026-07-04"), Some(expected));
        assert_eq!(to_date("07/04/2026"), Some(expected));
        assert_eq!(to_date("07/04/26"), Some(expected));
        assert_eq!(
            to_date("2026-07"),
            NaiveDate::from_ymd_opt(2026, 7, 1)
        );
        assert_eq!(to_date("last tuesday"), None);
        assert_eq!(to_date(""), None);
    }
}
