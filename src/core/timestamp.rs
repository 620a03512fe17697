// AccessLens - core/timestamp.rs
//
// Turns heterogeneous timestamp text into a canonical instant.
// Core layer: pure functions, never panics on input, never returns errors.
//
// Forms are tried in a fixed order and the first success wins:
//   1. Access-log bracket form   25/Dec/2023:10:15:30 +0000
//   2. ISO-like (contains T or -) 2023-12-25T10:15:30Z
//   3. Space-separated ISO        2023-12-25 10:15:30
//   4. US slash form              12/25/2023 10:15:30
//   5. Generic fallbacks          RFC 2822, month-name forms, bare dates

use chrono::{
    DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// What to do with the UTC offset of an access-log bracket timestamp.
///
/// ISO-8601 and RFC 2822 offsets are always applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetPolicy {
    /// Keep the logged wall-clock time and discard the offset. Hour buckets
    /// then reflect the server's local hour as written in the log.
    #[default]
    Ignore,

    /// Shift the wall-clock time by the offset to obtain true UTC.
    Apply,
}

/// Normalise `text` into an instant, or `None` when no form applies.
///
/// `""` and `"-"` are absent by definition. Wall-clock values without an
/// offset are stored as if they were UTC, so the hour of the stored instant
/// is the hour that was written in the log.
pub fn normalize(text: &str, policy: OffsetPolicy) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() || text == "-" {
        return None;
    }

    if let Some(ts) = parse_access_log(text, policy) {
        return Some(ts);
    }
    if text.contains('T') || text.contains('-') {
        if let Some(ts) = parse_iso_like(text) {
            return Some(ts);
        }
    }
    if let Some(ts) = parse_space_separated(text) {
        return Some(ts);
    }
    if let Some(ts) = parse_us_slash(text) {
        return Some(ts);
    }
    parse_generic(text)
}

fn access_log_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})/([A-Za-z]+)/(\d{4}):(\d{1,2}):(\d{1,2}):(\d{1,2})(?:\s*([+-]\d{4}))?")
            .expect("access log timestamp regex")
    })
}

fn space_separated_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2}) (\d{1,2}):(\d{1,2}):(\d{1,2})")
            .expect("space-separated timestamp regex")
    })
}

fn us_slash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4}) (\d{1,2}):(\d{1,2}):(\d{1,2})")
            .expect("US slash timestamp regex")
    })
}

/// Month number for an English month name or its three-letter abbreviation.
fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lower = name.to_ascii_lowercase();
    let abbrev = lower.get(..3)?;
    MONTHS
        .iter()
        .position(|m| *m == abbrev)
        .map(|idx| idx as u32 + 1)
}

/// Build a wall-clock value; `None` for impossible calendar dates.
fn wall_clock(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(y, mo, d)?.and_hms_opt(h, mi, s)
}

/// Parse `+HHMM` / `-HHMM` into a fixed offset.
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let sign = if raw.starts_with('-') { -1 } else { 1 };
    let digits = raw.get(1..)?;
    let hours: i32 = digits.get(..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..4)?.parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Resolve a wall-clock value plus optional offset under `policy`.
fn resolve(naive: NaiveDateTime, offset: Option<FixedOffset>, policy: OffsetPolicy) -> Option<DateTime<Utc>> {
    match (policy, offset) {
        (OffsetPolicy::Apply, Some(off)) => off
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => Some(naive.and_utc()),
    }
}

fn captured_u32(caps: &regex::Captures<'_>, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse().ok()
}

/// Form 1: `25/Dec/2023:10:15:30 +0000`.
fn parse_access_log(text: &str, policy: OffsetPolicy) -> Option<DateTime<Utc>> {
    let caps = access_log_re().captures(text)?;
    let month = month_number(caps.get(2)?.as_str())?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    let naive = wall_clock(
        year,
        month,
        captured_u32(&caps, 1)?,
        captured_u32(&caps, 4)?,
        captured_u32(&caps, 5)?,
        captured_u32(&caps, 6)?,
    )?;
    let offset = caps.get(7).and_then(|m| parse_offset(m.as_str()));
    resolve(naive, offset, policy)
}

/// Form 2: anything ISO-8601-ish. An explicit offset is honoured.
fn parse_iso_like(text: &str) -> Option<DateTime<Utc>> {
    let with_offset = DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%z"));
    if let Ok(dt) = with_offset {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Form 3: `YYYY-MM-DD HH:MM:SS`, tolerating trailing text.
fn parse_space_separated(text: &str) -> Option<DateTime<Utc>> {
    let caps = space_separated_re().captures(text)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    wall_clock(
        year,
        captured_u32(&caps, 2)?,
        captured_u32(&caps, 3)?,
        captured_u32(&caps, 4)?,
        captured_u32(&caps, 5)?,
        captured_u32(&caps, 6)?,
    )
    .map(|n| n.and_utc())
}

/// Form 4: `MM/DD/YYYY HH:MM:SS`.
fn parse_us_slash(text: &str) -> Option<DateTime<Utc>> {
    let caps = us_slash_re().captures(text)?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;
    wall_clock(
        year,
        captured_u32(&caps, 1)?,
        captured_u32(&caps, 2)?,
        captured_u32(&caps, 4)?,
        captured_u32(&caps, 5)?,
        captured_u32(&caps, 6)?,
    )
    .map(|n| n.and_utc())
}

/// Form 5: assorted human-written forms.
fn parse_generic(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y/%m/%d %H:%M:%S",
        "%d %b %Y %H:%M:%S",
        "%b %d %Y %H:%M:%S",
        "%b %d, %Y %H:%M:%S",
        "%a %b %d %H:%M:%S %Y",
        "%m/%d/%Y %H:%M",
    ];
    if let Some(naive) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(naive.and_utc());
    }

    const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y/%m/%d", "%d %b %Y", "%b %d, %Y", "%B %d, %Y"];
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn fmt(ts: Option<DateTime<Utc>>) -> String {
        ts.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "<none>".to_string())
    }

    #[test]
    fn test_empty_and_dash_are_absent() {
        assert_eq!(normalize("", OffsetPolicy::Ignore), None);
        assert_eq!(normalize("-", OffsetPolicy::Ignore), None);
        assert_eq!(normalize("   ", OffsetPolicy::Apply), None);
    }

    #[test]
    fn test_access_log_form() {
        let ts = normalize("25/Dec/2023:10:15:30 +0000", OffsetPolicy::Ignore);
        assert_eq!(fmt(ts), "2023-12-25 10:15:30");
    }

    #[test]
    fn test_access_log_without_offset() {
        let ts = normalize("01/Feb/2024:00:00:01", OffsetPolicy::Apply);
        assert_eq!(fmt(ts), "2024-02-01 00:00:01");
    }

    /// Legacy semantics: the offset is read but the wall-clock time is kept.
    #[test]
    fn test_offset_ignored_by_default() {
        let ts = normalize("25/Dec/2023:10:15:30 -0700", OffsetPolicy::default());
        assert_eq!(fmt(ts), "2023-12-25 10:15:30");
        assert_eq!(ts.unwrap().hour(), 10);
    }

    #[test]
    fn test_offset_applied_when_requested() {
        let ts = normalize("25/Dec/2023:10:15:30 -0700", OffsetPolicy::Apply);
        assert_eq!(fmt(ts), "2023-12-25 17:15:30");
        let ts = normalize("25/Dec/2023:01:00:00 +0530", OffsetPolicy::Apply);
        assert_eq!(fmt(ts), "2023-12-24 19:30:00");
    }

    #[test]
    fn test_invalid_calendar_is_absent() {
        assert_eq!(normalize("31/Feb/2023:10:00:00 +0000", OffsetPolicy::Ignore), None);
        assert_eq!(normalize("10/Foo/2023:10:00:00 +0000", OffsetPolicy::Ignore), None);
        assert_eq!(normalize("2023-13-01 00:00:00", OffsetPolicy::Ignore), None);
        assert_eq!(normalize("25/Dec/2023:25:00:00", OffsetPolicy::Ignore), None);
    }

    #[test]
    fn test_iso_forms() {
        assert_eq!(
            fmt(normalize("2023-01-01T00:00:00Z", OffsetPolicy::Ignore)),
            "2023-01-01 00:00:00"
        );
        assert_eq!(
            fmt(normalize("2023-01-01T08:30:00.250", OffsetPolicy::Ignore)),
            "2023-01-01 08:30:00"
        );
        assert_eq!(
            fmt(normalize("2023-06-15", OffsetPolicy::Ignore)),
            "2023-06-15 00:00:00"
        );
    }

    #[test]
    fn test_iso_offset_always_applies() {
        let text = "2023-01-01T10:00:00+02:00";
        assert_eq!(fmt(normalize(text, OffsetPolicy::Ignore)), "2023-01-01 08:00:00");
        assert_eq!(fmt(normalize(text, OffsetPolicy::Apply)), "2023-01-01 08:00:00");
        assert_eq!(
            normalize(text, OffsetPolicy::default()),
            normalize("2023-01-01T08:00:00Z", OffsetPolicy::default())
        );
    }

    #[test]
    fn test_rfc2822_offset_always_applies() {
        assert_eq!(
            fmt(normalize("Mon, 25 Dec 2023 10:15:30 +0200", OffsetPolicy::Ignore)),
            "2023-12-25 08:15:30"
        );
    }

    #[test]
    fn test_space_separated_with_trailing_zone_name() {
        assert_eq!(
            fmt(normalize("2024-03-05 14:30:22 UTC", OffsetPolicy::Ignore)),
            "2024-03-05 14:30:22"
        );
    }

    #[test]
    fn test_us_slash_form() {
        assert_eq!(
            fmt(normalize("12/25/2023 10:15:30", OffsetPolicy::Ignore)),
            "2023-12-25 10:15:30"
        );
    }

    #[test]
    fn test_generic_fallbacks() {
        assert_eq!(
            fmt(normalize("Mon, 25 Dec 2023 10:15:30 +0000", OffsetPolicy::Ignore)),
            "2023-12-25 10:15:30"
        );
        assert_eq!(
            fmt(normalize("2023/12/25 10:15:30", OffsetPolicy::Ignore)),
            "2023-12-25 10:15:30"
        );
        assert_eq!(
            fmt(normalize("Dec 25 2023 10:15:30", OffsetPolicy::Ignore)),
            "2023-12-25 10:15:30"
        );
        assert_eq!(fmt(normalize("12/25/2023", OffsetPolicy::Ignore)), "2023-12-25 00:00:00");
    }

    #[test]
    fn test_garbage_is_absent() {
        assert_eq!(normalize("not a date", OffsetPolicy::Ignore), None);
        assert_eq!(normalize("T-1000", OffsetPolicy::Ignore), None);
    }
}
