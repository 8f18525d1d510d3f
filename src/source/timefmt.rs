//! Publish-time and duration parsing for backend payloads

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

/// Parse a publish time into a UTC instant with the zone dropped
///
/// Accepts RFC 3339 / ISO 8601 with offset (`2024-01-15T10:30:00Z`), RFC 2822
/// (`Mon, 15 Jan 2024 10:30:00 GMT`) and offset-less ISO 8601 (taken as UTC).
/// Anything else falls back to the current time.
pub fn parse_published(raw: &str) -> NaiveDateTime {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.naive_utc();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.naive_utc();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return dt;
        }
    }

    debug!(raw, "unparseable publish time, using now");
    Utc::now().naive_utc()
}

/// Parse an ISO 8601 duration (`PT1H30M45S`, `P1DT2H`, `PT0S`) into seconds
///
/// Weeks and days are supported; years and months are not (they have no fixed length)
/// and make the whole value unparseable, as does any malformed input.
pub fn parse_iso_duration(raw: &str) -> Option<u64> {
    let rest = raw.trim().strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut total: u64 = 0;
    let mut number = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for c in rest.chars() {
        match c {
            '0'..='9' => number.push(c),
            'T' if !in_time && number.is_empty() => in_time = true,
            unit => {
                let value: u64 = number.parse().ok()?;
                number.clear();
                let scale = match (in_time, unit) {
                    (false, 'W') => 7 * 86_400,
                    (false, 'D') => 86_400,
                    (true, 'H') => 3_600,
                    (true, 'M') => 60,
                    (true, 'S') => 1,
                    _ => return None,
                };
                total = total.checked_add(value.checked_mul(scale)?)?;
                saw_component = true;
            }
        }
    }

    (number.is_empty() && saw_component).then_some(total)
}
