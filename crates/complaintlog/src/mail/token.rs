//! Access-token providers for the Graph mail source.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::MailError;
use crate::config::MailAuthConfig;
use crate::sanitize::truncate_error_body;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tokens are refreshed this long before the provider says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Fallback lifetime when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

fn duplicate(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_string())
}

/// Supplies bearer tokens to the mail source.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// A token believed to be valid.
    async fn access_token(&self) -> Result<SecretString, MailError>;

    /// Called after the provider rejected the current token; returns a new one.
    async fn refresh(&self) -> Result<SecretString, MailError>;
}

/// A bearer token obtained elsewhere. It cannot be refreshed.
pub struct StaticToken {
    token: SecretString,
}

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<SecretString, MailError> {
        Ok(duplicate(&self.token))
    }

    async fn refresh(&self) -> Result<SecretString, MailError> {
        Err(MailError::Unauthorized(
            "static access token was rejected and cannot be refreshed".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

struct TokenState {
    refresh_token: SecretString,
    cached: Option<CachedToken>,
}

/// OAuth2 refresh-token grant, cached until shortly before expiry.
///
/// If the identity provider rotates the refresh token, the new one is kept
/// for the lifetime of this provider.
pub struct RefreshingToken {
    client: Client,
    token_url: String,
    client_id: String,
    client_secret: Option<SecretString>,
    scope: String,
    state: Mutex<TokenState>,
}

impl RefreshingToken {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<SecretString>,
        refresh_token: SecretString,
        scope: impl Into<String>,
    ) -> Result<Self, MailError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MailError::Client(e.to_string()))?;
        Ok(Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
            scope: scope.into(),
            state: Mutex::new(TokenState {
                refresh_token,
                cached: None,
            }),
        })
    }

    async fn request_token(&self, state: &mut TokenState) -> Result<SecretString, MailError> {
        info!("Refreshing mail access token");

        let response = {
            let mut params = vec![
                ("client_id", self.client_id.as_str()),
                ("refresh_token", state.refresh_token.expose_secret()),
                ("grant_type", "refresh_token"),
                ("scope", self.scope.as_str()),
            ];
            if let Some(secret) = &self.client_secret {
                params.push(("client_secret", secret.expose_secret()));
            }
            self.client
                .post(&self.token_url)
                .form(&params)
                .send()
                .await
                .map_err(|e| MailError::Token(e.to_string()))?
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Token(format!(
                "{}: {}",
                status,
                truncate_error_body(&body)
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MailError::Token(format!("failed to parse token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS));
        let access = SecretString::from(token.access_token);
        if let Some(rotated) = token.refresh_token.filter(|t| !t.is_empty()) {
            debug!("Identity provider rotated the refresh token");
            state.refresh_token = SecretString::from(rotated);
        }
        state.cached = Some(CachedToken {
            token: duplicate(&access),
            expires_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        });

        info!("Successfully refreshed mail access token");
        Ok(access)
    }
}

#[async_trait]
impl TokenProvider for RefreshingToken {
    async fn access_token(&self) -> Result<SecretString, MailError> {
        let mut state = self.state.lock().await;
        if let Some(cached) = &state.cached {
            if Instant::now() < cached.expires_at {
                return Ok(duplicate(&cached.token));
            }
        }
        self.request_token(&mut state).await
    }

    async fn refresh(&self) -> Result<SecretString, MailError> {
        let mut state = self.state.lock().await;
        state.cached = None;
        self.request_token(&mut state).await
    }
}

/// Builds the configured token provider, resolving its secrets.
pub fn token_provider_from_config(
    auth: &MailAuthConfig,
) -> Result<Arc<dyn TokenProvider>, MailError> {
    match auth {
        MailAuthConfig::AccessToken { token } => Ok(Arc::new(StaticToken::new(token.resolve()?))),
        MailAuthConfig::RefreshToken {
            token_url,
            client_id,
            client_secret,
            refresh_token,
            scope,
        } => Ok(Arc::new(RefreshingToken::new(
            token_url,
            client_id,
            client_secret.resolve_optional()?,
            refresh_token.resolve()?,
            scope,
        )?)),
    }
}
