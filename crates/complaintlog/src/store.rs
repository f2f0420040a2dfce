//! The persistence contract the reconciliation engine depends on, the typed
//! field-merge policy, and its SQLite implementation.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::{case_repo, skip_repo, ComplaintRow, Database, DatabaseError};
use crate::text::{format_utc, parse_stored_utc};

/// One persisted complaint case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplaintCase {
    pub conversation_id: String,
    pub received_utc: DateTime<Utc>,
    pub from_email: String,
    pub subject: String,
    pub part_number: String,
    pub category: String,
    pub summary: String,
    pub case_key: String,
    pub thread_url: String,
    /// Earliest known occurrence of the case; only ever moves earlier.
    pub first_seen_utc: Option<DateTime<Utc>>,
    /// Empty until known; never replaced once set.
    pub initiator_email: String,
}

/// The identifying slice of a case returned by lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseSnapshot {
    pub conversation_id: String,
    pub received_utc: DateTime<Utc>,
    pub part_number: String,
    pub case_key: String,
}

impl From<&ComplaintCase> for CaseSnapshot {
    fn from(case: &ComplaintCase) -> Self {
        Self {
            conversation_id: case.conversation_id.clone(),
            received_utc: case.received_utc,
            part_number: case.part_number.clone(),
            case_key: case.case_key.clone(),
        }
    }
}

impl From<ComplaintRow> for ComplaintCase {
    fn from(row: ComplaintRow) -> Self {
        // Unparseable legacy timestamps sort before any real message.
        let received_utc = parse_stored_utc(&row.received_utc).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self {
            conversation_id: row.conversation_id,
            received_utc,
            from_email: row.from_email,
            subject: row.subject,
            part_number: row.part_number,
            category: row.category,
            summary: row.summary,
            case_key: row.case_key,
            thread_url: row.thread_url,
            first_seen_utc: row.first_seen_utc.as_deref().and_then(parse_stored_utc),
            initiator_email: row.initiator_email.unwrap_or_default().trim().to_string(),
        }
    }
}

impl From<&ComplaintCase> for ComplaintRow {
    fn from(case: &ComplaintCase) -> Self {
        Self {
            conversation_id: case.conversation_id.clone(),
            received_utc: format_utc(&case.received_utc),
            from_email: case.from_email.clone(),
            subject: case.subject.clone(),
            part_number: case.part_number.clone(),
            category: case.category.clone(),
            summary: case.summary.clone(),
            case_key: case.case_key.clone(),
            thread_url: case.thread_url.clone(),
            first_seen_utc: case.first_seen_utc.as_ref().map(format_utc),
            initiator_email: Some(case.initiator_email.clone()).filter(|s| !s.is_empty()),
        }
    }
}

/// Combines a stored case with a newer observation of it.
///
/// Every field comes from `incoming` except: the conversation id stays the
/// stored one, `first_seen_utc` is the earlier of the two, and
/// `initiator_email` keeps the stored value when it is non-empty. The result
/// never has a first-seen later than its received time.
pub fn merge(existing: Option<&ComplaintCase>, incoming: ComplaintCase) -> ComplaintCase {
    let mut merged = incoming;
    if let Some(existing) = existing {
        merged.conversation_id = existing.conversation_id.clone();
        merged.first_seen_utc = match (existing.first_seen_utc, merged.first_seen_utc) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if !existing.initiator_email.is_empty() {
            merged.initiator_email = existing.initiator_email.clone();
        }
    }
    merged.first_seen_utc = merged.first_seen_utc.map(|fs| fs.min(merged.received_utc));
    merged
}

/// Storage operations used by the reconciliation engine. Every write applies
/// [`merge`] against the stored row atomically.
pub trait CaseStore: Send + Sync {
    fn get_by_conversation(&self, conversation_id: &str)
        -> Result<Option<CaseSnapshot>, DatabaseError>;

    /// The most recently received case carrying `case_key`.
    fn get_latest_by_case_key(&self, case_key: &str) -> Result<Option<CaseSnapshot>, DatabaseError>;

    /// Inserts `case`, or merges it into the row with the same conversation id.
    fn upsert(&self, case: ComplaintCase) -> Result<ComplaintCase, DatabaseError>;

    /// Merges `case` into the row of `target_conversation_id`. Returns `None`
    /// without writing if that row does not exist.
    fn update_fields_for_conversation(
        &self,
        target_conversation_id: &str,
        case: ComplaintCase,
    ) -> Result<Option<ComplaintCase>, DatabaseError>;

    /// Advances only the received time. Returns whether a row existed.
    fn touch(&self, conversation_id: &str, received_utc: DateTime<Utc>) -> Result<bool, DatabaseError>;

    /// Remembers that `conversation_id` was evaluated through `received_utc`
    /// and deliberately left unwritten.
    fn mark_skipped(
        &self,
        conversation_id: &str,
        received_utc: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), DatabaseError>;

    /// The received time recorded by [`CaseStore::mark_skipped`], if any.
    fn skipped_through(&self, conversation_id: &str) -> Result<Option<DateTime<Utc>>, DatabaseError>;

    fn get_case(&self, conversation_id: &str) -> Result<Option<ComplaintCase>, DatabaseError>;

    fn all_cases(&self) -> Result<Vec<ComplaintCase>, DatabaseError>;
}

impl Database {
    fn merge_into(
        &self,
        conversation_id: &str,
        incoming: ComplaintCase,
        insert_if_missing: bool,
    ) -> Result<Option<ComplaintCase>, DatabaseError> {
        let mut result = None;
        case_repo::modify(self, conversation_id, |current| {
            let existing = current.map(ComplaintCase::from);
            if existing.is_none() && !insert_if_missing {
                return None;
            }
            let mut merged = merge(existing.as_ref(), incoming);
            merged.conversation_id = conversation_id.to_string();
            let row = ComplaintRow::from(&merged);
            result = Some(merged);
            Some(row)
        })?;
        Ok(result)
    }
}

impl CaseStore for Database {
    fn get_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<CaseSnapshot>, DatabaseError> {
        Ok(self
            .get_case(conversation_id)?
            .map(|case| CaseSnapshot::from(&case)))
    }

    fn get_latest_by_case_key(&self, case_key: &str) -> Result<Option<CaseSnapshot>, DatabaseError> {
        Ok(case_repo::find_latest_by_case_key(self, case_key)?
            .map(ComplaintCase::from)
            .map(|case| CaseSnapshot::from(&case)))
    }

    fn upsert(&self, case: ComplaintCase) -> Result<ComplaintCase, DatabaseError> {
        let id = case.conversation_id.clone();
        let fallback = case.clone();
        Ok(self.merge_into(&id, case, true)?.unwrap_or(fallback))
    }

    fn update_fields_for_conversation(
        &self,
        target_conversation_id: &str,
        case: ComplaintCase,
    ) -> Result<Option<ComplaintCase>, DatabaseError> {
        self.merge_into(target_conversation_id, case, false)
    }

    fn touch(&self, conversation_id: &str, received_utc: DateTime<Utc>) -> Result<bool, DatabaseError> {
        case_repo::touch(self, conversation_id, &format_utc(&received_utc))
    }

    fn mark_skipped(
        &self,
        conversation_id: &str,
        received_utc: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), DatabaseError> {
        skip_repo::mark(self, conversation_id, &format_utc(&received_utc), reason)
    }

    fn skipped_through(&self, conversation_id: &str) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        Ok(skip_repo::skipped_through(self, conversation_id)?
            .as_deref()
            .and_then(parse_stored_utc))
    }

    fn get_case(&self, conversation_id: &str) -> Result<Option<ComplaintCase>, DatabaseError> {
        Ok(case_repo::find_by_conversation(self, conversation_id)?.map(ComplaintCase::from))
    }

    fn all_cases(&self) -> Result<Vec<ComplaintCase>, DatabaseError> {
        Ok(case_repo::list_all(self)?
            .into_iter()
            .map(ComplaintCase::from)
            .collect())
    }
}
