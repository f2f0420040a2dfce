//! First-seen and initiator resolution from quoted reply chains.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use regex::Regex;

use super::datetime::parse_leading_datetime;

/// Labels that carry the send time in a quoted header block.
const SENT_LABELS: &[&str] = &[
    "sent:",
    "date:",
    "enviado:",
    "fecha:",
    "verzonden:",
    "gesendet:",
];

/// How many lines after a "From:" line are searched for the send time.
const HEADER_WINDOW: usize = 9;

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[A-Z0-9._%+\-]+@[A-Z0-9.\-]+\.[A-Z]{2,}").unwrap()
});

static RE_FROM_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bFrom:").unwrap());

/// A header block collapsed onto one line, as markup stripping can produce.
static RE_FROM_SENT_INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)From:\s*[^<\n]*<\s*([\w.\-+]+@[\w.\-]+)\s*>[^\n]*?Sent:\s*([A-Za-z0-9,: \t\-]+)",
    )
    .unwrap()
});

static RE_ON_WROTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*On\s+(.+?)\s+(?:wrote|escribió):(.*)$").unwrap()
});

static RE_ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{1,2}-\d{1,2}(?:[ T]\d{1,2}:\d{2}(?::\d{2})?(?:\s?[AP]M)?)?\b").unwrap()
});

static RE_US_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,2}/\d{1,2}/\d{2,4}(?:\s+\d{1,2}:\d{2}(?::\d{2})?\s?(?:AM|PM)?)?\b")
        .unwrap()
});

static RE_MONTH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-z]+\s+\d{1,2},\s+\d{4}(?:\s+\d{1,2}:\d{2}(?::\d{2})?\s?(?:AM|PM|am|pm)?)?\b")
        .unwrap()
});

/// A dated sender found inside quoted history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginCandidate {
    pub sender: String,
    pub at: DateTime<Utc>,
}

/// Resolved origin of a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Never later than the received time it was resolved against.
    pub first_seen_utc: DateTime<Utc>,
    pub initiator: String,
}

#[derive(Debug, Clone, Copy)]
pub struct OriginScanner {
    local: Tz,
    scan_inline_dates: bool,
}

impl OriginScanner {
    pub fn new(local: Tz) -> Self {
        Self {
            local,
            scan_inline_dates: true,
        }
    }

    pub fn with_inline_dates(mut self, enabled: bool) -> Self {
        self.scan_inline_dates = enabled;
        self
    }

    /// All dated senders found in header blocks and "On ... wrote:" lines.
    /// Unparseable dates are skipped.
    pub fn candidates(&self, body: &str) -> Vec<OriginCandidate> {
        let mut found = self.header_blocks(body);
        found.extend(self.inline_headers(body));
        found.extend(self.attributions(body));
        found
    }

    pub fn earliest_candidate(&self, body: &str) -> Option<OriginCandidate> {
        self.candidates(body).into_iter().min_by_key(|c| c.at)
    }

    /// Earliest explicit date literal anywhere in the text.
    pub fn earliest_date_literal(&self, body: &str) -> Option<DateTime<Utc>> {
        [&*RE_ISO_DATE, &*RE_US_DATE, &*RE_MONTH_DATE]
            .iter()
            .flat_map(|re| re.find_iter(body))
            .filter_map(|m| parse_leading_datetime(m.as_str(), self.local))
            .min()
    }

    /// Combines the message's own received time with everything the body
    /// reveals about when the thread started and who started it.
    pub fn resolve(&self, body: &str, received: DateTime<Utc>, sender: &str) -> Origin {
        let earliest = self.earliest_candidate(body);
        let literal = if self.scan_inline_dates {
            self.earliest_date_literal(body)
        } else {
            None
        };

        let first_seen_utc = [Some(received), earliest.as_ref().map(|c| c.at), literal]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(received);

        let initiator = earliest
            .map(|c| c.sender)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| sender.to_string());

        Origin {
            first_seen_utc,
            initiator,
        }
    }

    fn header_blocks(&self, body: &str) -> Vec<OriginCandidate> {
        let lines: Vec<&str> = body.lines().collect();
        let mut found = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let Some(label) = RE_FROM_LABEL.find(line) else {
                continue;
            };
            let Some(email) = RE_EMAIL.find(&line[label.end()..]) else {
                continue;
            };
            let window = lines.iter().skip(i + 1).take(HEADER_WINDOW);
            for next in window {
                let trimmed = next.trim_start();
                let is_sent = SENT_LABELS.iter().any(|lbl| {
                    trimmed
                        .get(..lbl.len())
                        .is_some_and(|head| head.eq_ignore_ascii_case(lbl))
                });
                if !is_sent {
                    continue;
                }
                let value = trimmed.split_once(':').map(|(_, v)| v).unwrap_or(trimmed);
                if let Some(at) = parse_leading_datetime(value, self.local) {
                    found.push(OriginCandidate {
                        sender: email.as_str().to_string(),
                        at,
                    });
                    break;
                }
            }
        }
        found
    }

    fn inline_headers(&self, body: &str) -> Vec<OriginCandidate> {
        RE_FROM_SENT_INLINE
            .captures_iter(body)
            .filter_map(|caps| {
                let at = parse_leading_datetime(&caps[2], self.local)?;
                Some(OriginCandidate {
                    sender: caps[1].trim().to_string(),
                    at,
                })
            })
            .collect()
    }

    fn attributions(&self, body: &str) -> Vec<OriginCandidate> {
        RE_ON_WROTE
            .captures_iter(body)
            .filter_map(|caps| {
                let attribution = caps.get(1)?.as_str();
                let rest = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
                let email = RE_EMAIL
                    .find(attribution)
                    .or_else(|| RE_EMAIL.find(rest))?;
                let date_part = attribution
                    .find('<')
                    .map(|ix| &attribution[..ix])
                    .unwrap_or(attribution);
                let date_part = RE_EMAIL.split(date_part).next().unwrap_or(date_part);
                let at = parse_leading_datetime(date_part, self.local)?;
                Some(OriginCandidate {
                    sender: email.as_str().to_string(),
                    at,
                })
            })
            .collect()
    }
}
