use std::path::PathBuf;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::secrets::{expand_home, SecretSource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub parts: PartsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// The watermark used when the database has none stored yet.
    pub fn start_watermark(&self) -> Result<DateTime<Utc>, ConfigError> {
        parse_utc("sync.start_date", &self.sync.start_date)
    }

    /// Zone used to interpret dates quoted without an offset.
    pub fn local_timezone(&self) -> Result<Tz, ConfigError> {
        parse_tz(&self.sync.local_timezone)
    }

    /// Zone used for the report's date column.
    pub fn display_timezone(&self) -> Result<Tz, ConfigError> {
        parse_tz(&self.report.timezone)
    }

    pub fn database_path(&self) -> Option<PathBuf> {
        match self.storage.database_path.as_deref() {
            Some(p) if !p.is_empty() => Some(PathBuf::from(expand_home(p))),
            _ => crate::db::default_database_path(),
        }
    }

    pub fn master_list_path(&self) -> Option<PathBuf> {
        self.parts
            .master_list
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| PathBuf::from(expand_home(p)))
    }

    pub fn report_path(&self) -> Option<PathBuf> {
        self.report
            .output_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| PathBuf::from(expand_home(p)))
    }
}

pub(crate) fn parse_utc(field: &str, value: &str) -> Result<DateTime<Utc>, ConfigError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ConfigError::InvalidTimestamp {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn parse_tz(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::UnknownTimezone(name.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// `me` for the signed-in account, otherwise a user principal name.
    #[serde(default = "default_mailbox")]
    pub mailbox: String,
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub auth: MailAuthConfig,
}

fn default_mailbox() -> String {
    "me".to_string()
}

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_page_size() -> u32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MailAuthConfig {
    /// A bearer token obtained elsewhere (e.g. by the dashboard's device flow).
    AccessToken { token: SecretSource },
    /// OAuth2 refresh-token grant against the identity platform.
    RefreshToken {
        #[serde(default = "default_token_url")]
        token_url: String,
        client_id: String,
        #[serde(default)]
        client_secret: SecretSource,
        refresh_token: SecretSource,
        #[serde(default = "default_scope")]
        scope: String,
    },
}

fn default_token_url() -> String {
    "https://login.microsoftonline.com/common/oauth2/v2.0/token".to_string()
}

fn default_scope() -> String {
    "https://graph.microsoft.com/Mail.Read offline_access".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_key")]
    pub api_key: SecretSource,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_llm_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key() -> SecretSource {
    SecretSource::from_env_var("GEMINI_API_KEY")
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_llm_endpoint(),
            api_key: default_api_key(),
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base")]
    pub backoff_base: f64,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> f64 {
    1.8
}

fn default_initial_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base: default_backoff_base(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

/// Additions to the built-in noise gate lists. The built-in lists always apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub extra_keywords: Vec<String>,
    #[serde(default)]
    pub extra_blocked_senders: Vec<String>,
    #[serde(default)]
    pub extra_blocked_domains: Vec<String>,
    #[serde(default)]
    pub extra_subject_phrases: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartsConfig {
    /// Workbook, CSV or one-per-line file of official part numbers.
    #[serde(default)]
    pub master_list: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub database_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// `.json` writes JSON; any other extension writes an Excel workbook.
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_path: None,
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_start_date")]
    pub start_date: String,
    #[serde(default = "default_timezone")]
    pub local_timezone: String,
    /// Also scan free-floating date literals in quoted history for the
    /// first-seen instant.
    #[serde(default = "default_true")]
    pub scan_inline_dates: bool,
}

fn default_start_date() -> String {
    "2025-01-01T00:00:00Z".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            local_timezone: default_timezone(),
            scan_inline_dates: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}
