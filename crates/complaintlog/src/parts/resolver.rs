use std::sync::{Arc, LazyLock};

use regex::Regex;

use super::master::{alnum_only, normalize_part_number, MasterPartList};

/// Stored in place of a part number that could not be resolved. Contains
/// spaces, so it can never pass [`is_valid_part_number`].
pub const MISSING_PART_NUMBER: &str = "No part number provided";

const STOPWORDS: &[&str] = &[
    "or", "and", "ok", "re", "fw", "bs", "hn", "hi", "thanks", "regards", "am", "pm", "to", "on",
    "by", "in", "the", "for", "of", "a", "an", "it", "is",
];

static RE_PN_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\-_./]{5,25}$").unwrap());

/// Label-prefixed candidates; group 1 is the token. Order matters.
static PN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bP\s*/?\s*N\s*(?:No\.?|#)?\s*[:\-]?\s*([A-Za-z0-9\-_./]{5,25})",
        r"(?i)\b(?:Part|Item|SKU)\s*(?:No\.?|Number|#)?\s*[:\-]?\s*([A-Za-z0-9\-_./]{5,25})",
        r"(?i)\bPN#?\s*[:\-]?\s*([A-Za-z0-9\-_./]{5,25})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// 5–25 characters of `[A-Za-z0-9-_./]` with at least one digit and one
/// letter, and not a stopword.
pub fn is_valid_part_number(token: &str) -> bool {
    if token.is_empty() || STOPWORDS.iter().any(|s| token.eq_ignore_ascii_case(s)) {
        return false;
    }
    RE_PN_SHAPE.is_match(token)
        && token.chars().any(|c| c.is_ascii_digit())
        && token.chars().any(|c| c.is_ascii_alphabetic())
}

/// Where a resolved part number came from, most trusted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartSource {
    MasterLatest,
    MasterHistory,
    FallbackLatest,
    FallbackHistory,
    LlmCorroborated,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPart {
    pub value: String,
    pub source: PartSource,
}

impl ResolvedPart {
    fn found(value: String, source: PartSource) -> Self {
        Self { value, source }
    }

    pub fn missing() -> Self {
        Self {
            value: MISSING_PART_NUMBER.to_string(),
            source: PartSource::Missing,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.source == PartSource::Missing
    }

    /// Normalized form for case keys; `None` for the sentinel.
    pub fn normalized(&self) -> Option<String> {
        if self.is_missing() {
            None
        } else {
            Some(normalize_part_number(&self.value)).filter(|s| !s.is_empty())
        }
    }
}

/// Result of one extraction pass over a piece of text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartCandidates {
    /// First candidate present in the master list.
    pub master_hit: Option<String>,
    /// First structurally valid candidate not in the master list.
    pub fallback: Option<String>,
    /// The searched text reduced to `[A-Z0-9]`.
    pub haystack_alnum: String,
}

impl PartCandidates {
    fn is_empty(&self) -> bool {
        self.master_hit.is_none() && self.fallback.is_none()
    }
}

pub struct PartNumberResolver {
    master: Arc<MasterPartList>,
}

impl PartNumberResolver {
    pub fn new(master: Arc<MasterPartList>) -> Self {
        Self { master }
    }

    pub fn master(&self) -> &MasterPartList {
        &self.master
    }

    /// Scans `subject` and `text` for labelled part numbers.
    pub fn extract_candidates(&self, subject: &str, text: &str) -> PartCandidates {
        let haystack = format!("{}  {}", subject, text);
        let mut candidates = PartCandidates {
            haystack_alnum: alnum_only(&haystack),
            ..PartCandidates::default()
        };

        let tokens = PN_PATTERNS
            .iter()
            .flat_map(|re| re.captures_iter(&haystack))
            .filter_map(|caps| caps.get(1))
            .map(|m| {
                m.as_str()
                    .trim_matches(|c: char| matches!(c, '.' | ',' | ';' | ':' | ')' | ']' | '}'))
                    .to_string()
            })
            .filter(|t| is_valid_part_number(t));

        for token in tokens {
            if self.master.contains(&token) {
                candidates.master_hit.get_or_insert(token);
            } else {
                candidates.fallback.get_or_insert(token);
            }
        }
        candidates
    }

    /// Resolves one part number for a thread.
    ///
    /// The quoted history is only searched when the latest reply and
    /// subject yield nothing. An LLM suggestion is accepted last, and only if
    /// it is in the master list or literally present in the searched text.
    pub fn resolve(
        &self,
        subject: &str,
        latest_reply: &str,
        quoted_history: &str,
        llm_suggestion: Option<&str>,
    ) -> ResolvedPart {
        let latest = self.extract_candidates(subject, latest_reply);
        let history = if latest.is_empty() && !quoted_history.trim().is_empty() {
            Some(self.extract_candidates("", quoted_history))
        } else {
            None
        };
        let history_ref = history.as_ref();

        if let Some(pn) = latest.master_hit.clone() {
            return ResolvedPart::found(pn, PartSource::MasterLatest);
        }
        if let Some(pn) = history_ref.and_then(|h| h.master_hit.clone()) {
            return ResolvedPart::found(pn, PartSource::MasterHistory);
        }
        if let Some(pn) = latest.fallback.clone() {
            return ResolvedPart::found(pn, PartSource::FallbackLatest);
        }
        if let Some(pn) = history_ref.and_then(|h| h.fallback.clone()) {
            return ResolvedPart::found(pn, PartSource::FallbackHistory);
        }

        if let Some(suggested) = llm_suggestion.map(str::trim).filter(|s| is_valid_part_number(s)) {
            let in_master = self.master.contains(suggested);
            let needle = alnum_only(suggested);
            let in_text = latest.haystack_alnum.contains(&needle)
                || history_ref.is_some_and(|h| h.haystack_alnum.contains(&needle));
            if in_master || in_text {
                return ResolvedPart::found(suggested.to_string(), PartSource::LlmCorroborated);
            }
            log::debug!("Discarding uncorroborated part number suggestion");
        }

        ResolvedPart::missing()
    }
}
