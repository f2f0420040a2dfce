//! Runs one complaint sync: fetch mail since the stored watermark, reconcile
//! it into the case database, rewrite the report if anything changed, and
//! print the run summary as JSON on stdout.
//!
//! Usage: `complaintlog-sync [CONFIG_PATH]` (default `~/.complaintlog/config.json`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};

use complaintlog::classify::GeminiBackend;
use complaintlog::config::default_config_path;
use complaintlog::db::sync_state_repo;
use complaintlog::export::load_report;
use complaintlog::mail::{token_provider_from_config, GraphMailSource};
use complaintlog::telemetry::init_tracing;
use complaintlog::text::OriginScanner;
use complaintlog::{
    load_config, CancellationFlag, ClassificationClient, ComplaintLogError, Config, ConfigError,
    Database, MasterPartList, NoiseGate, PartNumberResolver, ReconcileEngine, RetryPolicy,
    RunSummary,
};

const DEFAULT_REPORT_FILE: &str = "complaint_log.xlsx";

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = match std::env::args().nth(1).map(PathBuf::from).or_else(default_config_path) {
        Some(path) => path,
        None => {
            eprintln!("error: no config path given and no home directory to default to");
            return ExitCode::FAILURE;
        }
    };

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("warning: logging not initialized: {}", e);
    }

    match run(&config).await {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to serialize run summary: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!("Sync failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_master_list(config: &Config) -> MasterPartList {
    let Some(path) = config.master_list_path() else {
        warn!("No master part list configured; part numbers will not be verified");
        return MasterPartList::empty();
    };
    MasterPartList::load(&path).unwrap_or_else(|e| {
        warn!("{}; continuing without a master list", e);
        MasterPartList::empty()
    })
}

async fn run(config: &Config) -> Result<RunSummary, ComplaintLogError> {
    let db_path = config.database_path().ok_or_else(|| ConfigError::Validation {
        message: "cannot determine a database path; set storage.database_path".to_string(),
    })?;
    let db = Database::open(&db_path)?;

    let retry = RetryPolicy::from_config(&config.llm.retry);
    let tokens = token_provider_from_config(&config.mailbox.auth)?;
    let mail = GraphMailSource::new(&config.mailbox, tokens, retry)?;
    let backend = GeminiBackend::from_config(&config.llm)?;
    let classifier = ClassificationClient::new(Arc::new(backend), retry);
    let parts = PartNumberResolver::new(Arc::new(load_master_list(config)));

    let engine = ReconcileEngine::new(Arc::new(mail), classifier, Arc::new(db.clone()), parts)
        .with_gate(NoiseGate::from_config(&config.gate))
        .with_origin_scanner(
            OriginScanner::new(config.local_timezone()?)
                .with_inline_dates(config.sync.scan_inline_dates),
        );

    let watermark = match sync_state_repo::load_watermark(&db)? {
        Some(stored) => stored,
        None => config.start_watermark()?,
    };
    let run_started = Utc::now();
    info!("Syncing mail received since {}", watermark);

    let cancel = CancellationFlag::new();
    let handler_flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_flag.cancel()) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    let summary = engine.run(watermark, &cancel).await?;

    // A cancelled run may have skipped conversations, so it must not move
    // the watermark past them.
    if summary.cancelled {
        warn!("Run cancelled; watermark left at {}", watermark);
    } else {
        sync_state_repo::store_watermark(&db, run_started)?;
    }

    if summary.report_due {
        let report_path = config
            .report_path()
            .or_else(|| db_path.parent().map(|dir| dir.join(DEFAULT_REPORT_FILE)))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_FILE));
        let report = load_report(&db, config.display_timezone()?)?;
        let written = report.write(&report_path)?;
        info!(
            "Wrote report with {} case(s) to {}",
            report.rows.len(),
            written.display()
        );
    }

    Ok(summary)
}
