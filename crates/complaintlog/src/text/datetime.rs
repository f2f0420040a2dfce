//! Lenient parsing of the dates mail clients print in quoted headers.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

/// Storage format for instants: RFC 3339 with fixed-width nanoseconds and a
/// `Z` suffix, so stored values round-trip exactly and sort lexically.
const STORED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

/// Whole-second form for query filters; truncation keeps `ge` inclusive.
const SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Upper bound on words tried by [`parse_leading_datetime`].
const MAX_LEADING_WORDS: usize = 12;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%A, %B %d, %Y %I:%M %p",
    "%A, %B %d, %Y %I:%M:%S %p",
    "%a, %b %d, %Y %I:%M %p",
    "%a, %b %d, %Y %I:%M:%S %p",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y %I:%M:%S %p",
    "%A, %d %B %Y %H:%M",
    "%A, %d %B %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%d %B %Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
    "%m/%d/%y %I:%M %p",
    "%m/%d/%y %H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %I:%M %p",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

const NAIVE_DATE_FORMATS: &[&str] = &[
    "%A, %B %d, %Y",
    "%a, %b %d, %Y",
    "%B %d, %Y",
    "%A, %d %B %Y",
    "%d %B %Y",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%Y-%m-%d",
];

static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static RE_AT_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\s+at\s+").unwrap());

pub fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.format(STORED_FORMAT).to_string()
}

/// Formats `dt` truncated to the second.
pub fn format_utc_seconds(dt: &DateTime<Utc>) -> String {
    dt.format(SECONDS_FORMAT).to_string()
}

/// Parses an instant written by [`format_utc`] or any RFC 3339 value.
pub fn parse_stored_utc(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Parses a human-written date. Values without an offset are read in `local`.
/// Returns `None` for anything unparseable or outside 1990..=2100.
pub fn parse_human_datetime(raw: &str, local: Tz) -> Option<DateTime<Utc>> {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(&cleaned) {
        return plausible(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&cleaned) {
        return plausible(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            if let Some(dt) = plausible(localize(naive, local)) {
                return Some(dt);
            }
        }
    }
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                if let Some(dt) = plausible(localize(naive, local)) {
                    return Some(dt);
                }
            }
        }
    }
    None
}

/// Parses the longest leading run of words that forms a date, so trailing
/// text such as a sender name or the rest of a header line is ignored.
pub fn parse_leading_datetime(raw: &str, local: Tz) -> Option<DateTime<Utc>> {
    let cleaned = clean(raw);
    let words: Vec<&str> = cleaned.split(' ').take(MAX_LEADING_WORDS).collect();
    (1..=words.len())
        .rev()
        .find_map(|n| parse_human_datetime(&words[..n].join(" "), local))
}

fn clean(raw: &str) -> String {
    let s = RE_AT_WORD.replace_all(raw.trim(), " ");
    let s = RE_SPACES.replace_all(&s, " ");
    s.trim_matches(|c: char| c == ',' || c == ';' || c == '.' || c.is_whitespace())
        .to_string()
}

fn localize(naive: NaiveDateTime, local: Tz) -> DateTime<Utc> {
    match local.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        // Inside a DST gap: read the wall time as UTC.
        None => local
            .from_utc_datetime(&naive)
            .with_timezone(&Utc),
    }
}

fn plausible(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    (1990..=2100).contains(&dt.year()).then_some(dt)
}
