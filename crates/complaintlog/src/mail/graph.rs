//! Microsoft Graph implementation of [`MailSource`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, Url};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;

use super::message::{GraphMessage, GraphPage};
use super::{EarliestMessage, MailError, MailSource, MessagePage, RawMessage, TokenProvider};
use crate::classify::{RetryPolicy, Sleeper, TokioSleeper};
use crate::config::MailboxConfig;
use crate::sanitize::{short_id, truncate_error_body};
use crate::text::format_utc_seconds;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Listing pages carry headers only; bodies are fetched per conversation.
const LISTING_FIELDS: &str = "id,conversationId,receivedDateTime,from";
const MESSAGE_FIELDS: &str = "id,conversationId,receivedDateTime,subject,from,body,webLink";
const EARLIEST_FIELDS: &str = "id,receivedDateTime,from";

pub struct GraphMailSource {
    client: Client,
    base_url: String,
    mailbox: String,
    page_size: u32,
    tokens: Arc<dyn TokenProvider>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl GraphMailSource {
    pub fn new(
        config: &MailboxConfig,
        tokens: Arc<dyn TokenProvider>,
        retry: RetryPolicy,
    ) -> Result<Self, MailError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MailError::Client(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            mailbox: config.mailbox.trim().to_string(),
            page_size: config.page_size,
            tokens,
            retry,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn messages_endpoint(&self) -> String {
        if self.mailbox.is_empty() || self.mailbox.eq_ignore_ascii_case("me") {
            format!("{}/me/messages", self.base_url)
        } else {
            format!("{}/users/{}/messages", self.base_url, self.mailbox)
        }
    }

    fn first_page_url(&self, since: DateTime<Utc>) -> Result<Url, MailError> {
        let filter = format!("receivedDateTime ge {}", format_utc_seconds(&since));
        let top = self.page_size.to_string();
        Url::parse_with_params(
            &self.messages_endpoint(),
            &[
                ("$top", top.as_str()),
                ("$orderby", "receivedDateTime asc"),
                ("$filter", filter.as_str()),
                ("$select", LISTING_FIELDS),
            ],
        )
        .map_err(|e| MailError::Client(format!("invalid Graph URL: {}", e)))
    }

    fn message_url(&self, message_id: &str) -> Result<Url, MailError> {
        let mut url = Url::parse(&self.messages_endpoint())
            .map_err(|e| MailError::Client(format!("invalid Graph URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| MailError::Client("Graph base URL cannot carry a path".to_string()))?
            .push(message_id);
        url.query_pairs_mut().append_pair("$select", MESSAGE_FIELDS);
        Ok(url)
    }

    fn earliest_url(&self, conversation_id: &str) -> Result<Url, MailError> {
        let filter = format!("conversationId eq '{}'", conversation_id.replace('\'', "''"));
        Url::parse_with_params(
            &self.messages_endpoint(),
            &[
                ("$top", "1"),
                ("$orderby", "receivedDateTime asc"),
                ("$filter", filter.as_str()),
                ("$select", EARLIEST_FIELDS),
            ],
        )
        .map_err(|e| MailError::Client(format!("invalid Graph URL: {}", e)))
    }

    /// GET with bearer auth. A 401 triggers exactly one token refresh.
    async fn get_once<T: DeserializeOwned>(&self, url: &Url) -> Result<T, MailError> {
        let token = self.tokens.access_token().await?;
        let mut response = self
            .client
            .get(url.clone())
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            log::info!("Graph rejected the access token, refreshing once");
            let token = self.tokens.refresh().await?;
            response = self
                .client
                .get(url.clone())
                .bearer_auth(token.expose_secret())
                .send()
                .await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                let body = response.text().await.unwrap_or_default();
                return Err(MailError::Unauthorized(truncate_error_body(&body)));
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Http {
                status: status.as_u16(),
                body: truncate_error_body(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MailError::Parse(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, MailError> {
        self.retry
            .run(
                self.sleeper.as_ref(),
                "Graph request",
                MailError::is_retryable,
                |_| self.get_once::<T>(&url),
            )
            .await
    }
}

#[async_trait]
impl MailSource for GraphMailSource {
    async fn fetch_page(
        &self,
        since: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<MessagePage, MailError> {
        let url = match cursor {
            Some(next) => {
                Url::parse(next).map_err(|e| MailError::Parse(format!("bad nextLink: {}", e)))?
            }
            None => self.first_page_url(since)?,
        };
        let page: GraphPage<GraphMessage> = self.get_json(url).await?;
        log::debug!(
            "Fetched {} message(s), more pages: {}",
            page.value.len(),
            page.next_link.is_some()
        );
        Ok(MessagePage {
            messages: page.value.into_iter().map(RawMessage::from).collect(),
            next: page.next_link,
        })
    }

    async fn fetch_message(&self, message_id: &str) -> Result<Option<RawMessage>, MailError> {
        let url = self.message_url(message_id)?;
        match self.get_json::<GraphMessage>(url).await {
            Ok(message) => Ok(Some(RawMessage::from(message))),
            Err(MailError::Http { status: 404, .. }) => {
                log::debug!("Message {} no longer exists", short_id(message_id));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn earliest_in_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<EarliestMessage>, MailError> {
        log::debug!(
            "Looking up earliest message of conversation {}",
            short_id(conversation_id)
        );
        let url = self.earliest_url(conversation_id)?;
        let page: GraphPage<GraphMessage> = self.get_json(url).await?;
        Ok(page.value.into_iter().next().map(EarliestMessage::from))
    }
}
