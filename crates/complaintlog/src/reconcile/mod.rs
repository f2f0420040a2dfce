//! Reconciliation engine: decides, per conversation, whether a run inserts,
//! updates, merges, touches or skips a complaint case.

pub mod engine;
pub mod outcome;
pub mod summary;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

pub use engine::ReconcileEngine;
pub use outcome::{FilterReason, Outcome};
pub use summary::RunSummary;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Fetching mail failed: {0}")]
    Mail(#[from] crate::mail::MailError),

    #[error("Case store failed: {0}")]
    Store(#[from] crate::db::DatabaseError),
}

/// Cooperative stop request, checked between conversations.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
