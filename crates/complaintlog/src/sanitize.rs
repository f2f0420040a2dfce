//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Run logs are shared with whoever maintains the mailbox integration, so
//! sender addresses, API keys and provider ids are reduced to what is needed
//! for correlation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Replaces the local part of an address, keeping the domain.
///
/// - `bob@acme.com` → `***@acme.com`
/// - `not-an-address` → `***`
pub fn redact_email(address: &str) -> String {
    match address.rsplit_once('@') {
        Some((_, domain)) if !domain.is_empty() => format!("***@{}", domain),
        _ => "***".to_string(),
    }
}

/// Masks a credential for display, keeping a few characters at each end.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    match chars.len() {
        0 => "(empty)".to_string(),
        n if n <= 8 => {
            let tail: String = chars[n.saturating_sub(2)..].iter().collect();
            format!("{}{}", "*".repeat(n.saturating_sub(2)), tail)
        }
        n => {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[n - 4..].iter().collect();
            format!("{}...{}", head, tail)
        }
    }
}

/// Returns a short deterministic hash of a provider id (conversation ids are
/// long opaque base64 strings that carry mailbox information).
pub fn short_id(id: &str) -> String {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    format!("{:08x}", hasher.finish() as u32)
}

/// Maximum length kept from upstream error bodies.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Truncates an HTTP error body so tokens echoed back by a provider do not
/// flood the logs.
pub fn truncate_error_body(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY_LENGTH) {
        Some((cut, _)) => format!("{}... (truncated)", &body[..cut]),
        None => body.to_string(),
    }
}
