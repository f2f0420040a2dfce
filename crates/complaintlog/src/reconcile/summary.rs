use serde::{Deserialize, Serialize};

use super::Outcome;

/// Counts and log lines for one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub new: u32,
    pub updated: u32,
    pub filtered_out: u32,
    pub unchanged: u32,
    /// Raw messages seen, including ones without a conversation id.
    pub checked: u32,
    /// Unique conversations found.
    pub threads: u32,
    /// Something was inserted or updated, so the report should be rewritten.
    pub report_due: bool,
    /// The run stopped early on request; counts cover only what was processed.
    pub cancelled: bool,
    pub updates_log: Vec<String>,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Filtered { .. } => self.filtered_out += 1,
            Outcome::Inserted { .. } => self.new += 1,
            Outcome::Updated { .. } | Outcome::Merged { .. } => self.updated += 1,
        }
        if let Some(line) = outcome.log_line() {
            self.updates_log.push(line);
        }
        self.report_due = self.new > 0 || self.updated > 0;
    }

    /// Conversations that reached a decision.
    pub fn evaluated(&self) -> u32 {
        self.new + self.updated + self.filtered_out + self.unchanged
    }
}
