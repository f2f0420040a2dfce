use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::prompt::render_prompt;
use super::response::{parse_response, ClassificationResult};
use super::retry::{RetryPolicy, Sleeper, TokioSleeper};
use super::ClassifyError;

/// A single text-in, text-out model call.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ClassifyError>;
}

pub struct ClassificationClient {
    backend: Arc<dyn LlmBackend>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ClassificationClient {
    pub fn new(backend: Arc<dyn LlmBackend>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            retry,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Classifies one message, retrying transport and parse failures.
    pub async fn try_classify(
        &self,
        subject: &str,
        sender: &str,
        body: &str,
    ) -> Result<ClassificationResult, ClassifyError> {
        let prompt = render_prompt(subject, sender, body);
        self.retry
            .run(
                self.sleeper.as_ref(),
                "LLM classification",
                ClassifyError::is_retryable,
                |attempt| {
                    let prompt = &prompt;
                    async move {
                        debug!(attempt, "calling LLM backend");
                        let text = self.backend.generate(prompt).await?;
                        parse_response(&text)
                    }
                },
            )
            .await
    }

    /// Like [`try_classify`](Self::try_classify), but an exhausted retry
    /// budget yields the not-a-complaint default instead of an error.
    pub async fn classify(&self, subject: &str, sender: &str, body: &str) -> ClassificationResult {
        match self.try_classify(subject, sender, body).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "classification unavailable, treating as not a complaint");
                ClassificationResult::not_complaint()
            }
        }
    }
}
