//! LLM-backed complaint classification.
//!
//! [`ClassificationClient`] owns the prompt/response contract and the retry
//! policy; the model call itself sits behind [`LlmBackend`] so tests can
//! script responses.

pub mod client;
pub mod gemini;
pub mod prompt;
pub mod response;
pub mod retry;

use thiserror::Error;

pub use client::{ClassificationClient, LlmBackend};
pub use gemini::GeminiBackend;
pub use response::{parse_response, tighten_summary, Category, ClassificationResult};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("LLM request failed: {0}")]
    Transport(String),

    #[error("LLM endpoint returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed LLM output: {0}")]
    Malformed(String),

    #[error("LLM API key unavailable: {0}")]
    ApiKey(#[from] crate::secrets::SecretError),
}

impl ClassifyError {
    /// Client errors other than rate limiting will not succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClassifyError::Transport(_) | ClassifyError::Malformed(_) => true,
            ClassifyError::Http { status, .. } => *status == 429 || *status >= 500,
            ClassifyError::Client(_) | ClassifyError::ApiKey(_) => false,
        }
    }
}
