//! Global tracing subscriber setup for the sync binary.

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::config::schema::LoggingConfig;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Failed to install log bridge: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("Failed to install global subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
///
/// `log` records from the storage and mail layers are bridged into tracing.
/// A second call fails with [`TelemetryError`] and leaves the first
/// subscriber in place.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    tracing_log::LogTracer::init()?;

    if config.json {
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
