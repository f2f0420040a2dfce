use std::path::{Path, PathBuf};

use crate::config::schema::{Config, MailAuthConfig};
use crate::error::ConfigError;

const MAX_RETRY_ATTEMPTS: u32 = 10;
const MAX_BACKOFF_BASE: f64 = 10.0;
const MAX_INITIAL_DELAY_MS: u64 = 60_000;

/// Returns the canonical config path: `~/.complaintlog/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".complaintlog").join("config.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let mailbox = &config.mailbox;
    if mailbox.mailbox.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "mailbox.mailbox must not be empty (use \"me\" for the signed-in user)"
                .to_string(),
        });
    }
    if mailbox.page_size == 0 || mailbox.page_size > 1000 {
        return Err(ConfigError::Validation {
            message: format!(
                "mailbox.page_size must be between 1 and 1000, got {}",
                mailbox.page_size
            ),
        });
    }
    match &mailbox.auth {
        MailAuthConfig::AccessToken { token } if !token.is_configured() => {
            return Err(ConfigError::Validation {
                message: "mailbox.auth.token needs a value, file or env_var".to_string(),
            });
        }
        MailAuthConfig::RefreshToken {
            client_id,
            refresh_token,
            ..
        } => {
            if client_id.trim().is_empty() {
                return Err(ConfigError::Validation {
                    message: "mailbox.auth.client_id must not be empty".to_string(),
                });
            }
            if !refresh_token.is_configured() {
                return Err(ConfigError::Validation {
                    message: "mailbox.auth.refresh_token needs a value, file or env_var"
                        .to_string(),
                });
            }
        }
        _ => {}
    }

    let retry = &config.llm.retry;
    if retry.max_attempts == 0 || retry.max_attempts > MAX_RETRY_ATTEMPTS {
        return Err(ConfigError::Validation {
            message: format!(
                "llm.retry.max_attempts must be between 1 and {}, got {}",
                MAX_RETRY_ATTEMPTS, retry.max_attempts
            ),
        });
    }
    if !retry.backoff_base.is_finite() || !(1.0..=MAX_BACKOFF_BASE).contains(&retry.backoff_base) {
        return Err(ConfigError::Validation {
            message: format!(
                "llm.retry.backoff_base must be between 1.0 and {}, got {}",
                MAX_BACKOFF_BASE, retry.backoff_base
            ),
        });
    }
    if retry.initial_delay_ms > MAX_INITIAL_DELAY_MS {
        return Err(ConfigError::Validation {
            message: format!(
                "llm.retry.initial_delay_ms must be at most {}, got {}",
                MAX_INITIAL_DELAY_MS, retry.initial_delay_ms
            ),
        });
    }
    if config.llm.timeout_secs == 0 {
        return Err(ConfigError::Validation {
            message: "llm.timeout_secs must be at least 1".to_string(),
        });
    }

    let gate_lists = [
        ("gate.extra_keywords", &config.gate.extra_keywords),
        ("gate.extra_blocked_senders", &config.gate.extra_blocked_senders),
        ("gate.extra_blocked_domains", &config.gate.extra_blocked_domains),
        ("gate.extra_subject_phrases", &config.gate.extra_subject_phrases),
    ];
    for (field, entries) in gate_lists {
        if entries.iter().any(|e| e.trim().is_empty()) {
            return Err(ConfigError::Validation {
                message: format!("{} must not contain empty entries", field),
            });
        }
    }

    config.start_watermark()?;
    config.local_timezone()?;
    config.display_timezone()?;

    Ok(())
}
