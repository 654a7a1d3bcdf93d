//! Timestamp parsing for telemetry inputs

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Parse the timestamp formats telemetry producers emit.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f][±HH:MM]`, the same with a `T`
/// separator, and Unix epoch seconds (integer or float; values above 1e10
/// are treated as milliseconds). Naive datetimes are interpreted as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim().trim_matches('"');
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return None;
    }

    if let Ok(epoch) = s.parse::<i64>() {
        return from_epoch_millis(if epoch.abs() > 10_000_000_000 {
            epoch
        } else {
            epoch.checked_mul(1000)?
        });
    }
    if let Ok(epoch) = s.parse::<f64>() {
        if !epoch.is_finite() {
            return None;
        }
        let millis = if epoch.abs() > 1e10 { epoch } else { epoch * 1000.0 };
        return from_epoch_millis(millis.round() as i64);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    // Without timezone (assume UTC)
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }

    None
}

/// Parse a JSON timestamp value (string or number).
pub fn parse_json_timestamp(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    match value {
        serde_json::Value::String(s) => parse_timestamp(s),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                parse_timestamp(&i.to_string())
            } else {
                n.as_f64().and_then(|f| parse_timestamp(&f.to_string()))
            }
        }
        _ => None,
    }
}

fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 15).single().expect("valid")
    }

    #[test]
    fn test_parse_formats() {
        for s in [
            "2025-03-01T12:30:15Z",
            "2025-03-01T13:30:15+01:00",
            "2025-03-01 12:30:15",
            "2025-03-01T12:30:15",
            "2025-03-01 12:30:15+00:00",
            "\"2025-03-01 12:30:15\"",
            "1740832215",
            "1740832215000",
        ] {
            assert_eq!(parse_timestamp(s), Some(expected()), "failed on {s}");
        }
    }

    #[test]
    fn test_fractional_seconds() {
        let ts = parse_timestamp("2025-03-01 12:30:15.250").expect("parses");
        assert_eq!(ts.timestamp_subsec_millis(), 250);
        let ts = parse_timestamp("1740832215.5").expect("parses");
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("NaN"), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2025-13-45 99:00:00"), None);
    }

    #[test]
    fn test_json_values() {
        assert_eq!(
            parse_json_timestamp(&serde_json::json!("2025-03-01T12:30:15Z")),
            Some(expected())
        );
        assert_eq!(parse_json_timestamp(&serde_json::json!(1_740_832_215)), Some(expected()));
        assert_eq!(parse_json_timestamp(&serde_json::json!(null)), None);
    }
}
