//! Date and time conversions for the server's formats.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Days between 1899-12-30 (OLE automation epoch) and 1970-01-01.
pub const OLE_UNIX_EPOCH_DAYS: f64 = 25569.0;

const SECONDS_PER_DAY: f64 = 86_400.0;
const MS_PER_HOUR: f64 = 3_600_000.0;

/// Format of `sdate` / `edate` request parameters.
pub const REQUEST_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Averaging bucket width (seconds, as the `avg` parameter) for a span.
///
/// Spans over 12h and under 36h average into 5 minute buckets, over 36h and
/// under 745h into hours, over 745h into days. Everything else, including
/// the exact boundaries 36h and 745h, is requested raw.
pub fn averaging_bucket(from_ms: i64, to_ms: i64) -> &'static str {
    let hours = (to_ms - from_ms) as f64 / MS_PER_HOUR;
    if hours > 12.0 && hours < 36.0 {
        "300"
    } else if hours > 36.0 && hours < 745.0 {
        "3600"
    } else if hours > 745.0 {
        "86400"
    } else {
        "0"
    }
}

/// Format a Unix millisecond timestamp for `sdate`/`edate`.
///
/// With `local` set the server is assumed to share the caller's timezone.
pub fn format_request_date(epoch_ms: i64, local: bool) -> Option<String> {
    let utc: DateTime<Utc> = Utc.timestamp_millis_opt(epoch_ms).single()?;
    Some(if local {
        utc.with_timezone(&Local).format(REQUEST_DATE_FORMAT).to_string()
    } else {
        utc.format(REQUEST_DATE_FORMAT).to_string()
    })
}

/// Convert an OLE automation date serial (fractional days since 1899-12-30)
/// to a Unix millisecond timestamp.
pub fn ole_to_unix_ms(serial: f64) -> i64 {
    ((serial - OLE_UNIX_EPOCH_DAYS) * SECONDS_PER_DAY * 1000.0).round() as i64
}

/// Parse `DD.MM.YYYY HH:mm:ss` (time optional, midnight by default) into a
/// Unix millisecond timestamp, treating the text as UTC.
pub fn parse_prtg_datetime(text: &str) -> Option<i64> {
    let text = text.trim();
    let (date_part, time_part) = match text.split_once(' ') {
        Some((date, time)) => (date, Some(time.trim())),
        None => (text, None),
    };

    let date = NaiveDate::parse_from_str(date_part, "%d.%m.%Y").ok()?;
    let time = match time_part {
        Some(t) if !t.is_empty() => NaiveTime::parse_from_str(t, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
            .ok()?,
        _ => NaiveTime::MIN,
    };

    Some(NaiveDateTime::new(date, time).and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = 3_600_000;

    #[test]
    fn test_averaging_bucket_breakpoints() {
        assert_eq!(averaging_bucket(0, 5 * HOUR), "0");
        assert_eq!(averaging_bucket(0, 12 * HOUR), "0");
        assert_eq!(averaging_bucket(0, 20 * HOUR), "300");
        assert_eq!(averaging_bucket(0, 36 * HOUR), "0");
        assert_eq!(averaging_bucket(0, 100 * HOUR), "3600");
        assert_eq!(averaging_bucket(0, 745 * HOUR), "0");
        assert_eq!(averaging_bucket(0, 1000 * HOUR), "86400");
    }

    #[test]
    fn test_format_request_date_utc() {
        // 2024-03-01T10:05:09Z
        let ms = 1_709_287_509_000;
        assert_eq!(
            format_request_date(ms, false).as_deref(),
            Some("2024-03-01-10-05-09")
        );
    }

    #[test]
    fn test_ole_serial_conversion() {
        assert_eq!(ole_to_unix_ms(25569.0), 0);
        assert_eq!(ole_to_unix_ms(25570.5), 129_600_000);
        // 2023-03-15T12:00:00Z
        assert_eq!(ole_to_unix_ms(45000.5), 1_678_881_600_000);
    }

    #[test]
    fn test_parse_prtg_datetime() {
        assert_eq!(
            parse_prtg_datetime("01.03.2024 10:05:09"),
            Some(1_709_287_509_000)
        );
        assert_eq!(parse_prtg_datetime("01.03.2024"), Some(1_709_251_200_000));
        assert_eq!(parse_prtg_datetime("2024-03-01"), None);
        assert_eq!(parse_prtg_datetime("31.02.2024 00:00:00"), None);
    }
}
