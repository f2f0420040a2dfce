//! Cross-conversation identity for a real-world complaint case.
//!
//! A key is built from the sender domain plus the strongest identifiers
//! available: normalized part number, a formal external case id
//! (NCMR/SCAR/DMR/NCR/CAR/PO/SO), or as a last resort a subject slug.

use std::sync::LazyLock;

use regex::Regex;

pub const MAX_CASE_KEY_LEN: usize = 80;
const MAX_SUBJECT_SLUG_LEN: usize = 30;

/// Ordered external-id patterns; the first one that matches anywhere wins.
static CASE_ID_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\bNCMR[\s:-]*([0-9]{4}[-/][0-9]{3,6}|[0-9]{6,})", "ncmr"),
        (r"(?i)\bSCAR[\s:-]*([0-9]{4}[-/][0-9]{3,6}|[0-9]{5,})", "scar"),
        (r"(?i)\bDMR[\s:-]*([0-9]{4}[-/][0-9]{3,6}|[0-9]{5,})", "dmr"),
        (r"(?i)\bNCR[\s:-]*([0-9]{3,})", "ncr"),
        (r"(?i)\bCAR[\s:-]*([0-9]{3,})", "car"),
        (r"(?i)\bPO\s*(?:#|No\.?|Number)?\s*[:\-]?\s*([0-9]{5,})", "po"),
        (r"(?i)\bSO\s*(?:#|No\.?|Number)?\s*[:\-]?\s*([0-9]{5,})", "so"),
    ]
    .into_iter()
    .map(|(p, tag)| (Regex::new(p).unwrap(), tag))
    .collect()
});

static RE_KEY_DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\-_/]").unwrap());

static RE_SLUG_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Finds the first formal case id in `text`, tagged with its kind,
/// e.g. `ncmr-2024-00123`.
pub fn extract_external_id(text: &str) -> Option<String> {
    CASE_ID_PATTERNS.iter().find_map(|(re, tag)| {
        let raw = re.captures(text)?.get(1)?.as_str();
        let id = raw.replace(' ', "").replace('/', "-").to_lowercase();
        Some(format!("{}-{}", tag, id))
    })
}

/// Lowercases, strips characters outside `[a-z0-9-_/]`, truncates to 80.
pub fn normalize_case_key(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let mut key = RE_KEY_DISALLOWED.replace_all(&lowered, "").into_owned();
    key.truncate(MAX_CASE_KEY_LEN);
    key
}

fn subject_slug(subject: &str) -> String {
    let lowered = subject.to_lowercase();
    let slug = RE_SLUG_SEPARATORS.replace_all(&lowered, "-");
    let mut slug = slug.trim_matches('-').to_string();
    slug.truncate(MAX_SUBJECT_SLUG_LEN);
    slug
}

/// Builds the case key.
///
/// `text` is searched (after the subject) for an external id. The shapes,
/// in order of preference: `domain-pn-extid`, `domain-pn`, `domain-extid`,
/// `domain-<subject slug>`, `domain-no-subject`.
pub fn synthesize(domain: &str, part_number: Option<&str>, subject: &str, text: &str) -> String {
    let domain = domain.to_lowercase();
    let external = extract_external_id(&format!("{} {}", subject, text));
    let part = part_number.filter(|p| !p.is_empty());

    let key = match (part, external) {
        (Some(pn), Some(ext)) => format!("{}-{}-{}", domain, pn, ext),
        (Some(pn), None) => format!("{}-{}", domain, pn),
        (None, Some(ext)) => format!("{}-{}", domain, ext),
        (None, None) => {
            let slug = subject_slug(subject);
            if slug.is_empty() {
                format!("{}-no-subject", domain)
            } else {
                format!("{}-{}", domain, slug)
            }
        }
    };
    normalize_case_key(&key)
}
