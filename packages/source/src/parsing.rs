//! Field normalization for upstream records.
//!
//! The LAPD feed is not consistent about types: coordinates arrive as
//! strings or numbers, dates with or without fractional seconds, and the
//! occurrence time lives in a separate `HHMM` field. These helpers accept
//! any of those shapes and return `None` for anything unusable.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;

/// Parses a Socrata datetime string.
///
/// Accepts ISO 8601 with or without fractional seconds, a bare
/// `YYYY-MM-DD` date, and the legacy `MM/DD/YYYY HH:MM:SS AM` export form.
#[must_use]
pub fn parse_socrata_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %I:%M:%S %p"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Parses an `HHMM` occurrence time (`"0930"`, `"930"`, or the number `930`).
#[must_use]
pub fn parse_hhmm(value: &Value) -> Option<NaiveTime> {
    let raw = value_as_string(value)?;
    let digits = raw.trim();
    if digits.is_empty() || digits.len() > 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{digits:0>4}");
    let hour = padded[..2].parse::<u32>().ok()?;
    let min = padded[2..].parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hour, min, 0)
}

/// Replaces the time-of-day of `date` with `time` when one is given.
#[must_use]
pub fn with_time(date: DateTime<Utc>, time: Option<NaiveTime>) -> DateTime<Utc> {
    time.map_or(date, |t| {
        NaiveDateTime::new(date.date_naive(), t).and_utc()
    })
}

/// Reads a JSON scalar as a float, accepting numeric strings.
#[must_use]
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

/// Reads a JSON scalar as a non-empty string, stringifying numbers.
#[must_use]
pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses a lat/lng pair. Returns `None` if either side is missing,
/// unparseable, zero (the feed's placeholder for "unknown"), or outside
/// WGS84 bounds.
#[must_use]
pub fn parse_lat_lng(lat: &Value, lng: &Value) -> Option<(f64, f64)> {
    let latitude = value_as_f64(lat)?;
    let longitude = value_as_f64(lng)?;
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return None;
    }
    Some((latitude, longitude))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_socrata_date_with_fractional() {
        let dt = parse_socrata_date("2024-01-15T14:30:00.000").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00 UTC");
    }

    #[test]
    fn parses_socrata_date_without_fractional() {
        let dt = parse_socrata_date("2024-01-15T14:30:00").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00 UTC");
    }

    #[test]
    fn parses_bare_and_legacy_dates() {
        let dt = parse_socrata_date("2024-01-15").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 00:00:00 UTC");
        let dt = parse_socrata_date("01/15/2024 02:30:00 PM").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 14:30:00 UTC");
    }

    #[test]
    fn rejects_invalid_date() {
        assert!(parse_socrata_date("not-a-date").is_none());
    }

    #[test]
    fn parses_hhmm_strings_and_numbers() {
        assert_eq!(
            parse_hhmm(&json!("0930")),
            NaiveTime::from_hms_opt(9, 30, 0)
        );
        assert_eq!(parse_hhmm(&json!(930)), NaiveTime::from_hms_opt(9, 30, 0));
        assert_eq!(parse_hhmm(&json!("5")), NaiveTime::from_hms_opt(0, 5, 0));
        assert!(parse_hhmm(&json!("2561")).is_none());
        assert!(parse_hhmm(&json!("noon")).is_none());
        assert!(parse_hhmm(&Value::Null).is_none());
    }

    #[test]
    fn combines_date_and_time() {
        let date = parse_socrata_date("2024-01-15T00:00:00.000").unwrap();
        let combined = with_time(date, NaiveTime::from_hms_opt(23, 5, 0));
        assert_eq!(combined.to_string(), "2024-01-15 23:05:00 UTC");
        assert_eq!(with_time(date, None), date);
    }

    #[test]
    fn parses_lat_lng_strings_and_numbers() {
        let (la, lo) = parse_lat_lng(&json!("34.0522"), &json!(-118.2437)).unwrap();
        assert!((la - 34.0522).abs() < f64::EPSILON);
        assert!((lo - -118.2437).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_zero_missing_and_out_of_range_lat_lng() {
        assert!(parse_lat_lng(&json!("0"), &json!("-118.2")).is_none());
        assert!(parse_lat_lng(&Value::Null, &json!("-118.2")).is_none());
        assert!(parse_lat_lng(&json!(134.0), &json!(-118.2)).is_none());
        assert!(parse_lat_lng(&json!("NaN"), &json!(-118.2)).is_none());
    }
}
