//! Mail source error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    /// Connection, TLS or timeout failure.
    #[error("Mail request failed: {0}")]
    Transport(String),

    /// The provider rejected the request.
    #[error("Mail provider returned {status}: {body}")]
    Http { status: u16, body: String },

    /// The access token was rejected even after a refresh.
    #[error("Mail provider rejected the access token: {0}")]
    Unauthorized(String),

    /// Obtaining an access token failed.
    #[error("Token refresh failed: {0}")]
    Token(String),

    /// The provider's response could not be decoded.
    #[error("Failed to parse mail response: {0}")]
    Parse(String),

    #[error("Mail credential unavailable: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

impl MailError {
    pub fn is_retryable(&self) -> bool {
        match self {
            MailError::Transport(_) => true,
            MailError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        MailError::Transport(err.to_string())
    }
}
