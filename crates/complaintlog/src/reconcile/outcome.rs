use crate::gate::NoiseVerdict;

/// Why a conversation produced no case change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    Noise(NoiseVerdict),
    NotComplaint,
}

/// What the engine did with one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The stored row (own or merge target) already reflects this message.
    Unchanged,
    /// Rejected by the gate or the classifier. `touched` is true when an
    /// existing row had its received time advanced.
    Filtered { reason: FilterReason, touched: bool },
    Inserted {
        subject: String,
        part_number: String,
    },
    Updated {
        subject: String,
        part_number: String,
        part_number_captured: bool,
    },
    /// Folded into the row of `target`, which owns `case_key`.
    Merged {
        subject: String,
        target: String,
        case_key: String,
        part_number_captured: bool,
    },
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Unchanged => "unchanged",
            Outcome::Filtered {
                reason: FilterReason::Noise(_),
                ..
            } => "filtered_noise",
            Outcome::Filtered {
                reason: FilterReason::NotComplaint,
                ..
            } => "filtered_not_complaint",
            Outcome::Inserted { .. } => "new",
            Outcome::Updated { .. } => "updated",
            Outcome::Merged { .. } => "merged",
        }
    }

    /// The human-readable run-log line, for outcomes that changed a case.
    pub fn log_line(&self) -> Option<String> {
        match self {
            Outcome::Inserted {
                subject,
                part_number,
            } => Some(format!("Added new case: {} (PN: {})", subject, part_number)),
            Outcome::Updated {
                subject,
                part_number,
                part_number_captured,
            } => Some(format!(
                "Updated thread{}: {} (PN: {})",
                if *part_number_captured { " (PN captured)" } else { "" },
                subject,
                part_number
            )),
            Outcome::Merged {
                subject,
                case_key,
                part_number_captured,
                ..
            } => Some(format!(
                "Merged duplicate{}: {} → {}",
                if *part_number_captured { " (PN captured)" } else { "" },
                subject,
                case_key
            )),
            Outcome::Unchanged | Outcome::Filtered { .. } => None,
        }
    }
}
