use crate::config::GateConfig;

/// Broad complaint vocabulary, matched as case-insensitive substrings.
const KEYWORDS: &[&str] = &[
    "ncmr",
    "rejection",
    "defect",
    "missing parts",
    "damage",
    "damaged",
    "scar",
    "dmr",
    "rtv",
    "non-conformance",
    "nonconformance",
    "corrective action",
    "cracking",
    "reject",
    "deficiency",
    "breaking",
    "wrong revision",
    "credit note",
    "supplier corrective action request",
    "rma",
    "return",
    "replacement",
    "rework",
];

/// Formal quality-document tokens.
const STRONG_SIGNALS: &[&str] = &[
    "ncmr",
    "scar",
    "dmr",
    "rma",
    "nonconformance",
    "non-conformance",
    "ncr",
    "car",
    "8d",
];

const BLOCKED_SENDERS: &[&str] = &["eminder@culturewise.com", "no-reply@culturewise.com"];

const BLOCKED_DOMAINS: &[&str] = &["culturewise.com"];

const SUBJECT_BLOCK_PHRASES: &[&str] = &[
    "lesson of the week",
    "reminder:",
    "training",
    "newsletter",
    "guide to best practices",
    "best practices",
    "weekly update",
    "out of office",
    "automatic reply",
];

/// Why a message was or was not treated as noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseVerdict {
    Pass,
    BlockedSender,
    BlockedDomain,
    BlockedSubject,
    NoSignal,
}

impl NoiseVerdict {
    pub fn is_noise(self) -> bool {
        self != NoiseVerdict::Pass
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NoiseVerdict::Pass => "pass",
            NoiseVerdict::BlockedSender => "blocked_sender",
            NoiseVerdict::BlockedDomain => "blocked_domain",
            NoiseVerdict::BlockedSubject => "blocked_subject",
            NoiseVerdict::NoSignal => "no_signal",
        }
    }
}

/// Rejects obvious non-complaints. Errs on the side of letting mail through:
/// only a blocklist hit or the complete absence of complaint vocabulary
/// counts as noise.
#[derive(Debug, Clone)]
pub struct NoiseGate {
    keywords: Vec<String>,
    blocked_senders: Vec<String>,
    blocked_domains: Vec<String>,
    subject_phrases: Vec<String>,
}

impl Default for NoiseGate {
    fn default() -> Self {
        Self {
            keywords: owned(KEYWORDS),
            blocked_senders: owned(BLOCKED_SENDERS),
            blocked_domains: owned(BLOCKED_DOMAINS),
            subject_phrases: owned(SUBJECT_BLOCK_PHRASES),
        }
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn extend_lower(target: &mut Vec<String>, extra: &[String]) {
    target.extend(extra.iter().map(|s| s.trim().to_lowercase()));
}

impl NoiseGate {
    /// Built-in lists plus the configured additions.
    pub fn from_config(config: &GateConfig) -> Self {
        let mut gate = Self::default();
        extend_lower(&mut gate.keywords, &config.extra_keywords);
        extend_lower(&mut gate.blocked_senders, &config.extra_blocked_senders);
        extend_lower(&mut gate.blocked_domains, &config.extra_blocked_domains);
        extend_lower(&mut gate.subject_phrases, &config.extra_subject_phrases);
        gate
    }

    pub fn evaluate(&self, subject: &str, sender: &str, body: &str) -> NoiseVerdict {
        let subject = subject.to_lowercase();
        let sender = sender.trim().to_lowercase();

        if self.blocked_senders.iter().any(|s| *s == sender) {
            return NoiseVerdict::BlockedSender;
        }
        let domain = sender.rsplit_once('@').map(|(_, d)| d).unwrap_or_default();
        if !domain.is_empty() && self.blocked_domains.iter().any(|d| d == domain) {
            return NoiseVerdict::BlockedDomain;
        }
        if self
            .subject_phrases
            .iter()
            .any(|p| subject.contains(p.as_str()))
        {
            return NoiseVerdict::BlockedSubject;
        }

        let text = format!("{} {}", subject, body.to_lowercase());
        let has_keyword = self.keywords.iter().any(|k| text.contains(k.as_str()));
        let has_strong = STRONG_SIGNALS.iter().any(|s| text.contains(s));
        if !has_keyword && !has_strong {
            return NoiseVerdict::NoSignal;
        }

        NoiseVerdict::Pass
    }

    /// True when the message should be dropped before classification.
    pub fn is_noise(&self, subject: &str, sender: &str, body: &str) -> bool {
        self.evaluate(subject, sender, body).is_noise()
    }
}
