use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComplaintLogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Mail error: {0}")]
    Mail(#[from] crate::mail::MailError),

    #[error("Classification error: {0}")]
    Classify(#[from] crate::classify::ClassifyError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Master part list error: {0}")]
    MasterList(#[from] MasterListError),

    #[error("Sync run failed: {0}")]
    Reconcile(#[from] crate::reconcile::ReconcileError),

    #[error("Failed to write report '{path}': {source}")]
    WriteReport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build report workbook '{path}': {source}")]
    ReportWorkbook {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid timestamp for '{field}': {value}")]
    InvalidTimestamp { field: String, value: String },

    #[error("Unknown timezone '{0}'")]
    UnknownTimezone(String),
}

#[derive(Error, Debug)]
pub enum MasterListError {
    #[error("Failed to read master part list '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Master part list '{path}' is not valid UTF-8 text")]
    NotText { path: PathBuf },

    #[error("Failed to parse master part list '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to open master part workbook '{path}': {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("Master part workbook '{path}' has no worksheet")]
    NoWorksheet { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, ComplaintLogError>;
