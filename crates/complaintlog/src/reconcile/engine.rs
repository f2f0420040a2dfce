use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn, Instrument};

use super::{CancellationFlag, FilterReason, Outcome, ReconcileError, RunSummary};
use crate::casekey;
use crate::classify::ClassificationClient;
use crate::gate::NoiseGate;
use crate::mail::MailSource;
use crate::parts::{PartNumberResolver, MISSING_PART_NUMBER};
use crate::sanitize::{redact_email, short_id};
use crate::store::{CaseSnapshot, CaseStore, ComplaintCase};
use crate::text::{NormalizedThread, OriginScanner};

/// Skip reasons for conversations that never get a row of their own.
const SKIP_OWNER_NEWER: &str = "owner_newer";
const SKIP_MERGED: &str = "merged";

/// Headers of the latest message of one conversation. Bodies are fetched
/// only for threads that need evaluating.
struct Thread {
    conversation_id: String,
    received_utc: DateTime<Utc>,
    message_id: String,
    sender: String,
}

pub struct ReconcileEngine {
    mail: Arc<dyn MailSource>,
    classifier: ClassificationClient,
    store: Arc<dyn CaseStore>,
    parts: PartNumberResolver,
    gate: NoiseGate,
    origin: OriginScanner,
}

impl ReconcileEngine {
    pub fn new(
        mail: Arc<dyn MailSource>,
        classifier: ClassificationClient,
        store: Arc<dyn CaseStore>,
        parts: PartNumberResolver,
    ) -> Self {
        Self {
            mail,
            classifier,
            store,
            parts,
            gate: NoiseGate::default(),
            origin: OriginScanner::new(chrono_tz::America::New_York),
        }
    }

    pub fn with_gate(mut self, gate: NoiseGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_origin_scanner(mut self, origin: OriginScanner) -> Self {
        self.origin = origin;
        self
    }

    /// Processes every conversation with mail received at or after `since`.
    ///
    /// Storage and mail failures abort the run. A cancelled run returns the
    /// counts for the conversations it finished.
    pub async fn run(
        &self,
        since: DateTime<Utc>,
        cancel: &CancellationFlag,
    ) -> Result<RunSummary, ReconcileError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!("sync_run", run_id = %run_id, since = %since);
        self.run_inner(RunSummary::new(run_id), since, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        mut summary: RunSummary,
        since: DateTime<Utc>,
        cancel: &CancellationFlag,
    ) -> Result<RunSummary, ReconcileError> {
        let threads = self.collect_threads(since, cancel, &mut summary).await?;
        summary.threads = threads.len() as u32;
        info!(
            checked = summary.checked,
            threads = summary.threads,
            "fetched messages"
        );

        for thread in threads {
            if cancel.is_cancelled() {
                warn!("run cancelled, stopping before remaining conversations");
                summary.cancelled = true;
                break;
            }
            let span = info_span!(
                "conversation",
                conversation = %short_id(&thread.conversation_id),
                sender = %redact_email(&thread.sender),
            );
            let outcome = self.evaluate(&thread).instrument(span).await?;
            summary.record(&outcome);
        }

        info!(
            new = summary.new,
            updated = summary.updated,
            filtered_out = summary.filtered_out,
            unchanged = summary.unchanged,
            cancelled = summary.cancelled,
            "sync run finished"
        );
        Ok(summary)
    }

    /// Pages through the mailbox keeping the headers of the latest message of
    /// each conversation, in order of first appearance. Messages without a
    /// conversation id or received time are counted and dropped. Memory grows
    /// with the number of conversations, not with message bodies.
    async fn collect_threads(
        &self,
        since: DateTime<Utc>,
        cancel: &CancellationFlag,
        summary: &mut RunSummary,
    ) -> Result<Vec<Thread>, ReconcileError> {
        let mut threads: Vec<Thread> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.mail.fetch_page(since, cursor.as_deref()).await?;
            for message in page.messages {
                summary.checked += 1;
                let (Some(conversation_id), Some(received_utc)) =
                    (message.conversation_id.clone(), message.received_utc)
                else {
                    debug!(message = %short_id(&message.id), "skipping message without conversation or timestamp");
                    continue;
                };
                match index.get(&conversation_id) {
                    Some(&i) => {
                        if received_utc > threads[i].received_utc {
                            threads[i].received_utc = received_utc;
                            threads[i].message_id = message.id;
                            threads[i].sender = message.sender;
                        }
                    }
                    None => {
                        index.insert(conversation_id.clone(), threads.len());
                        threads.push(Thread {
                            conversation_id,
                            received_utc,
                            message_id: message.id,
                            sender: message.sender,
                        });
                    }
                }
            }
            cursor = page.next;
            if cursor.is_none() || cancel.is_cancelled() {
                if cursor.is_some() {
                    summary.cancelled = true;
                }
                break;
            }
        }
        Ok(threads)
    }

    async fn evaluate(&self, thread: &Thread) -> Result<Outcome, ReconcileError> {
        let conv = thread.conversation_id.as_str();
        let received = thread.received_utc;

        let existing = self.store.get_by_conversation(conv)?;
        match &existing {
            Some(row) if row.received_utc >= received => {
                debug!("stored row is current");
                return Ok(Outcome::Unchanged);
            }
            Some(_) => {}
            None => {
                if self.store.skipped_through(conv)?.is_some_and(|at| at >= received) {
                    debug!("conversation already skipped through this message");
                    return Ok(Outcome::Unchanged);
                }
            }
        }

        let Some(msg) = self.mail.fetch_message(&thread.message_id).await? else {
            warn!(message = %short_id(&thread.message_id), "message disappeared before evaluation");
            return Ok(Outcome::Unchanged);
        };

        let normalized = NormalizedThread::new(&msg.subject, &msg.sender, &msg.body, msg.body_format);

        let verdict = self
            .gate
            .evaluate(&normalized.subject, &normalized.sender, &normalized.latest_reply);
        if verdict.is_noise() {
            debug!(verdict = verdict.as_str(), "gated as noise");
            return self.filtered(conv, received, existing.is_some(), FilterReason::Noise(verdict));
        }

        let result = self
            .classifier
            .classify(&normalized.subject, &normalized.sender, &normalized.body_plain)
            .await;
        if !result.is_complaint {
            debug!("classified as not a complaint");
            return self.filtered(conv, received, existing.is_some(), FilterReason::NotComplaint);
        }

        let suggestion = Some(result.part_number.as_str()).filter(|s| !s.trim().is_empty());
        let part = self.parts.resolve(
            &normalized.subject,
            &normalized.latest_reply,
            &normalized.quoted_tail,
            suggestion,
        );
        debug!(part_source = ?part.source, "resolved part number");

        let origin = self
            .origin
            .resolve(&normalized.body_plain, received, &normalized.sender);

        let case_key = casekey::synthesize(
            &normalized.sender_domain,
            part.normalized().as_deref(),
            &normalized.subject,
            &format!("{}\n{}", normalized.latest_reply, result.summary),
        );

        let incoming = ComplaintCase {
            conversation_id: conv.to_string(),
            received_utc: received,
            from_email: normalized.sender.clone(),
            subject: normalized.subject.clone(),
            part_number: part.value.clone(),
            category: result.category.as_str().to_string(),
            summary: result.summary.clone(),
            case_key,
            thread_url: msg.web_link,
            first_seen_utc: Some(origin.first_seen_utc),
            initiator_email: origin.initiator,
        };

        match existing {
            Some(current) => self.update_own(current, incoming),
            None => self.insert_or_merge(incoming).await,
        }
    }

    fn filtered(
        &self,
        conversation_id: &str,
        received: DateTime<Utc>,
        has_row: bool,
        reason: FilterReason,
    ) -> Result<Outcome, ReconcileError> {
        let touched = has_row && self.store.touch(conversation_id, received)?;
        Ok(Outcome::Filtered { reason, touched })
    }

    /// A later message on a conversation that already has a row.
    fn update_own(
        &self,
        current: CaseSnapshot,
        mut incoming: ComplaintCase,
    ) -> Result<Outcome, ReconcileError> {
        if incoming.case_key != current.case_key {
            if let Some(owner) = self.store.get_latest_by_case_key(&incoming.case_key)? {
                if owner.conversation_id != current.conversation_id {
                    debug!("recomputed case key belongs to another case, keeping the stored key");
                    incoming.case_key = current.case_key.clone();
                }
            }
        }

        let stored = self.store.upsert(incoming)?;
        Ok(Outcome::Updated {
            part_number_captured: captured(&current.part_number, &stored.part_number),
            subject: stored.subject,
            part_number: stored.part_number,
        })
    }

    /// A conversation with no row: either merge into the case that owns its
    /// key, or insert it as a new case.
    async fn insert_or_merge(&self, mut incoming: ComplaintCase) -> Result<Outcome, ReconcileError> {
        if let Some(target) = self.store.get_latest_by_case_key(&incoming.case_key)? {
            if target.received_utc >= incoming.received_utc {
                debug!("case owner already has newer mail");
                self.store.mark_skipped(
                    &incoming.conversation_id,
                    incoming.received_utc,
                    SKIP_OWNER_NEWER,
                )?;
                return Ok(Outcome::Unchanged);
            }
            let subject = incoming.subject.clone();
            let case_key = incoming.case_key.clone();
            let source = incoming.conversation_id.clone();
            let received = incoming.received_utc;
            return match self
                .store
                .update_fields_for_conversation(&target.conversation_id, incoming)?
            {
                Some(stored) => {
                    self.store.mark_skipped(&source, received, SKIP_MERGED)?;
                    Ok(Outcome::Merged {
                        subject,
                        target: target.conversation_id,
                        case_key,
                        part_number_captured: captured(&target.part_number, &stored.part_number),
                    })
                }
                None => {
                    // Deleted between lookup and write; nothing to merge into.
                    warn!("merge target disappeared");
                    Ok(Outcome::Unchanged)
                }
            };
        }

        self.enrich_from_conversation_start(&mut incoming).await;
        let stored = self.store.upsert(incoming)?;
        Ok(Outcome::Inserted {
            subject: stored.subject,
            part_number: stored.part_number,
        })
    }

    /// Asks the mail source for the first message of the conversation to
    /// push first-seen earlier and fill a missing initiator. Failures are
    /// logged and ignored.
    async fn enrich_from_conversation_start(&self, case: &mut ComplaintCase) {
        match self.mail.earliest_in_conversation(&case.conversation_id).await {
            Ok(Some(earliest)) => {
                if let Some(at) = earliest.received_utc {
                    case.first_seen_utc = Some(case.first_seen_utc.map_or(at, |fs| fs.min(at)));
                }
                if case.initiator_email.is_empty() && !earliest.sender.is_empty() {
                    case.initiator_email = earliest.sender;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "earliest-message lookup failed, continuing"),
        }
    }
}

fn captured(previous: &str, current: &str) -> bool {
    previous.trim() == MISSING_PART_NUMBER && current != MISSING_PART_NUMBER
}
