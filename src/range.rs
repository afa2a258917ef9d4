//! Command-line time expressions.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::DateTime;

use crate::datasource::TimeRange;

/// Suffix to milliseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ms", 1.0),
    ("s", 1_000.0),
    ("m", 60_000.0),
    ("h", 3_600_000.0),
    ("d", 86_400_000.0),
    ("w", 604_800_000.0),
];

/// Parse spans like "6h", "30m", "1.5d", "500ms".
pub fn parse_span(s: &str) -> Result<Duration> {
    let s = s.trim();

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str
                .parse()
                .with_context(|| format!("invalid span: {s}"))?;
            if val < 0.0 {
                bail!("negative span: {s}");
            }
            return Ok(Duration::from_millis((val * multiplier) as u64));
        }
    }

    bail!("Unknown span format: {}", s)
}

/// Resolve a point in time to Unix milliseconds.
///
/// Accepts `now`, `now-<span>`, a bare `<span>` (that long ago), an RFC 3339
/// timestamp, or Unix milliseconds.
pub fn parse_time(s: &str, now_ms: i64) -> Result<i64> {
    let s = s.trim();
    if s == "now" {
        return Ok(now_ms);
    }
    if let Some(span) = s.strip_prefix("now-") {
        return Ok(now_ms - parse_span(span)?.as_millis() as i64);
    }
    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    Ok(now_ms - parse_span(s)?.as_millis() as i64)
}

/// Build a range from two expressions, rejecting inverted ranges.
pub fn parse_range(from: &str, to: &str, now_ms: i64) -> Result<TimeRange> {
    let range = TimeRange::new(parse_time(from, now_ms)?, parse_time(to, now_ms)?);
    if range.from_ms > range.to_ms {
        bail!("range starts after it ends: {from} .. {to}");
    }
    Ok(range)
}
