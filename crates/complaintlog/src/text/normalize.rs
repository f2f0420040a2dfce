use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Localized reply/forward prefixes, matched case-insensitively.
const SUBJECT_PREFIXES: &[&str] = &[
    "re:", "fw:", "fwd:", "sv:", "答复:", "回复:", "aw:", "wg:", "r:",
];

/// Substrings that start quoted history. The earliest occurrence wins.
const QUOTED_MARKERS: &[&str] = &[
    "-----Original Message-----",
    "\nFrom:",
    "\nSent:",
    "\nOn ",
    "________________________________",
    "Forwarded message",
    "Original Appointment",
];

/// Wrap width for markup rendering; wide enough that header lines stay whole.
const TEXT_WIDTH: usize = 400;

static RE_LEFTOVER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(re|fw|fwd)[\s\-:]+").unwrap());

static RE_DASH_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n-{5,}\n").unwrap());

static RE_INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    Html,
    #[default]
    Text,
}

/// Strips reply/forward prefixes, repeatedly, up to the first colon.
pub fn clean_subject(subject: &str) -> String {
    let mut s = subject.trim();
    loop {
        let has_prefix = SUBJECT_PREFIXES.iter().any(|p| {
            s.get(..p.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(p))
        });
        if !has_prefix {
            break;
        }
        match s.find(':') {
            Some(ix) => s = s[ix + 1..].trim(),
            None => break,
        }
    }
    RE_LEFTOVER_PREFIX.replace(s, "").trim().to_string()
}

/// Renders markup to plain text. Never fails; malformed markup yields
/// whatever text could be recovered.
pub fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let rendered: String = html2text::from_read(html.as_bytes(), TEXT_WIDTH);
    tidy_lines(&rendered.replace("**", ""))
}

/// Normalizes line endings and collapses horizontal whitespace per line.
fn tidy_lines(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(|line| RE_INLINE_SPACE.replace_all(line.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Splits a plain-text body into (latest reply, quoted history), both trimmed.
pub fn split_quoted_history(text: &str) -> (&str, &str) {
    let mut cut = text.len();
    for marker in QUOTED_MARKERS {
        if let Some(ix) = text.find(marker) {
            cut = cut.min(ix);
        }
    }
    if let Some(m) = RE_DASH_SEPARATOR.find(text) {
        cut = cut.min(m.start());
    }
    (text[..cut].trim(), text[cut..].trim())
}

/// The per-run view of the latest message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedThread {
    pub subject: String,
    pub sender: String,
    pub sender_domain: String,
    /// Full plain text, including quoted history.
    pub body_plain: String,
    /// Body up to the first quoted-history marker.
    pub latest_reply: String,
    /// Everything after the latest reply.
    pub quoted_tail: String,
}

impl NormalizedThread {
    pub fn new(subject: &str, sender: &str, body: &str, format: BodyFormat) -> Self {
        let body_plain = match format {
            BodyFormat::Html => html_to_text(body),
            BodyFormat::Text => body.replace("\r\n", "\n").trim().to_string(),
        };
        let (latest_reply, quoted_tail) = split_quoted_history(&body_plain);
        let latest_reply = latest_reply.to_string();
        let quoted_tail = quoted_tail.to_string();
        let sender = sender.trim().to_string();
        let sender_domain = sender
            .rsplit('@')
            .next()
            .unwrap_or_default()
            .to_lowercase();

        Self {
            subject: clean_subject(subject),
            sender,
            sender_domain,
            body_plain,
            latest_reply,
            quoted_tail,
        }
    }
}
