pub mod casekey;
pub mod classify;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod gate;
pub mod mail;
pub mod parts;
pub mod reconcile;
pub mod sanitize;
pub mod secrets;
pub mod store;
pub mod telemetry;
pub mod text;

pub use classify::{Category, ClassificationClient, ClassificationResult, LlmBackend, RetryPolicy};
pub use config::{load_config, Config};
pub use db::Database;
pub use error::{ComplaintLogError, ConfigError, Result};
pub use export::{build_report, Report};
pub use gate::NoiseGate;
pub use mail::{MailSource, RawMessage};
pub use parts::{MasterPartList, PartNumberResolver, MISSING_PART_NUMBER};
pub use reconcile::{CancellationFlag, ReconcileEngine, ReconcileError, RunSummary};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use store::{CaseStore, ComplaintCase};
