//! Defensive parsing of the model's JSON answer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ClassifyError;

pub const MAX_SUMMARY_WORDS: usize = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Category {
    Product,
    Shipping,
    #[serde(rename = "Documentation/Revision")]
    DocumentationRevision,
    #[serde(rename = "Invoicing/RTV")]
    InvoicingRtv,
    #[serde(rename = "Supplier/SCAR")]
    SupplierScar,
    #[serde(rename = "Damage/Transit")]
    DamageTransit,
    #[serde(rename = "Missing Parts")]
    MissingParts,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Product,
        Category::Shipping,
        Category::DocumentationRevision,
        Category::InvoicingRtv,
        Category::SupplierScar,
        Category::DamageTransit,
        Category::MissingParts,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Product => "Product",
            Category::Shipping => "Shipping",
            Category::DocumentationRevision => "Documentation/Revision",
            Category::InvoicingRtv => "Invoicing/RTV",
            Category::SupplierScar => "Supplier/SCAR",
            Category::DamageTransit => "Damage/Transit",
            Category::MissingParts => "Missing Parts",
            Category::Other => "Other",
        }
    }

    /// Exact label match; anything else is `Other`.
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == label.trim())
            .unwrap_or(Category::Other)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The model's verdict on one message, already validated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassificationResult {
    pub is_complaint: bool,
    /// At most [`MAX_SUMMARY_WORDS`] words.
    pub summary: String,
    pub category: Category,
    pub case_key: String,
    pub part_number: String,
}

impl ClassificationResult {
    /// The safe default: not a complaint, every field empty.
    pub fn not_complaint() -> Self {
        Self::default()
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        let is_complaint = match obj.get("is_complaint") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            _ => false,
        };

        Self {
            is_complaint,
            summary: tighten_summary(&text("summary")),
            category: Category::from_label(&text("category_suggested")),
            case_key: text("case_key"),
            part_number: text("part_number"),
        }
    }
}

/// Keeps the first 45 whitespace-separated words.
pub fn tighten_summary(summary: &str) -> String {
    summary
        .split_whitespace()
        .take(MAX_SUMMARY_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parses model output into a result.
///
/// Accepts a bare object, a one-element list holding an object, or an
/// object embedded in surrounding prose. Output with no object at all
/// yields the default result; an object that fails to parse is an error so
/// the caller can retry.
pub fn parse_response(text: &str) -> Result<ClassificationResult, ClassifyError> {
    let value = match serde_json::from_str::<Value>(text.trim()) {
        Ok(v) => v,
        Err(_) => match extract_json_object(text) {
            Some(fragment) => serde_json::from_str::<Value>(fragment)
                .map_err(|e| ClassifyError::Malformed(e.to_string()))?,
            None => return Ok(ClassificationResult::not_complaint()),
        },
    };

    let result = match &value {
        Value::Object(obj) => ClassificationResult::from_object(obj),
        Value::Array(items) => match items.as_slice() {
            [Value::Object(obj)] => ClassificationResult::from_object(obj),
            _ => ClassificationResult::not_complaint(),
        },
        _ => ClassificationResult::not_complaint(),
    };
    Ok(result)
}

/// Returns the first balanced `{...}` in `text`, respecting string literals
/// and escapes. An unterminated object runs to the end of the input.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;
    let mut end = text.len();

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    Some(&text[start..end])
}
