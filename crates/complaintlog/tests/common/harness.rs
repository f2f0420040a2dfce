//! Test harness for end-to-end sync runs.
//!
//! `TestHarness` wires a [`ReconcileEngine`] to an in-memory database, a
//! scripted mailbox and a scripted model, so a test can drop messages in,
//! run a sync, and inspect the stored cases.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use complaintlog::classify::{ClassifyError, Sleeper};
use complaintlog::mail::{EarliestMessage, MailError, MessagePage};
use complaintlog::{
    CancellationFlag, CaseStore, ClassificationClient, ComplaintCase, Database, LlmBackend,
    MailSource, MasterPartList, PartNumberResolver, RawMessage, ReconcileEngine, ReconcileError,
    RetryPolicy, RunSummary,
};

use super::builders::not_complaint_reply;

/// Mailbox that serves a fixed list of messages in insertion order. Listing
/// pages carry headers only, like the Graph listing does.
pub struct FakeMailbox {
    messages: Mutex<Vec<RawMessage>>,
    earliest: Mutex<HashMap<String, EarliestMessage>>,
    page_size: AtomicUsize,
    pub fail_fetch: AtomicBool,
    pub fail_earliest: AtomicBool,
    pub fetches: AtomicUsize,
    pub message_fetches: AtomicUsize,
    pub earliest_lookups: AtomicUsize,
    cancel_after_fetch: Mutex<Option<CancellationFlag>>,
    withdrawn: Mutex<Vec<String>>,
}

impl Default for FakeMailbox {
    fn default() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            earliest: Mutex::new(HashMap::new()),
            page_size: AtomicUsize::new(50),
            fail_fetch: AtomicBool::new(false),
            fail_earliest: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
            message_fetches: AtomicUsize::new(0),
            earliest_lookups: AtomicUsize::new(0),
            cancel_after_fetch: Mutex::new(None),
            withdrawn: Mutex::new(Vec::new()),
        }
    }
}

impl FakeMailbox {
    pub fn deliver(&self, message: RawMessage) {
        self.messages.lock().unwrap().push(message);
    }

    /// Removes a message after it has been listed, as a mailbox move would.
    pub fn withdraw_after_listing(&self, message_id: &str) {
        self.withdrawn.lock().unwrap().push(message_id.to_string());
    }

    pub fn message_fetch_count(&self) -> usize {
        self.message_fetches.load(Ordering::SeqCst)
    }

    pub fn set_earliest(&self, conversation_id: &str, at: &str, sender: &str) {
        self.earliest.lock().unwrap().insert(
            conversation_id.to_string(),
            EarliestMessage {
                received_utc: Some(super::builders::utc(at)),
                sender: sender.to_string(),
            },
        );
    }

    pub fn set_page_size(&self, size: usize) {
        self.page_size.store(size.max(1), Ordering::SeqCst);
    }

    /// Trips `flag` as soon as the first page has been served.
    pub fn cancel_after_first_page(&self, flag: CancellationFlag) {
        *self.cancel_after_fetch.lock().unwrap() = Some(flag);
    }
}

#[async_trait]
impl MailSource for FakeMailbox {
    async fn fetch_page(
        &self,
        since: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<MessagePage, MailError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(MailError::Transport("connection reset by peer".to_string()));
        }

        let offset = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|e| MailError::Parse(e.to_string()))?,
            None => 0,
        };
        let visible: Vec<RawMessage> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.received_utc.map_or(true, |r| r >= since))
            .map(|m| RawMessage {
                subject: String::new(),
                body: String::new(),
                web_link: String::new(),
                ..m.clone()
            })
            .collect();

        let end = (offset + self.page_size.load(Ordering::SeqCst)).min(visible.len());
        let messages = visible[offset.min(end)..end].to_vec();
        let next = (end < visible.len()).then(|| end.to_string());

        if let Some(flag) = self.cancel_after_fetch.lock().unwrap().as_ref() {
            flag.cancel();
        }
        Ok(MessagePage { messages, next })
    }

    async fn fetch_message(&self, message_id: &str) -> Result<Option<RawMessage>, MailError> {
        self.message_fetches.fetch_add(1, Ordering::SeqCst);
        if self.withdrawn.lock().unwrap().iter().any(|id| id == message_id) {
            return Ok(None);
        }
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|m| m.id == message_id)
            .cloned())
    }

    async fn earliest_in_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<EarliestMessage>, MailError> {
        self.earliest_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_earliest.load(Ordering::SeqCst) {
            return Err(MailError::Http {
                status: 503,
                body: "Service Unavailable".to_string(),
            });
        }
        Ok(self.earliest.lock().unwrap().get(conversation_id).cloned())
    }
}

/// Model that answers by the first rule whose needle occurs in the prompt.
pub struct FakeModel {
    rules: Mutex<Vec<(String, String)>>,
    pub outage: AtomicBool,
    pub calls: AtomicUsize,
}

impl Default for FakeModel {
    fn default() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            outage: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeModel {
    pub fn reply_when(&self, needle: &str, reply: String) {
        self.rules.lock().unwrap().push((needle.to_string(), reply));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmBackend for FakeModel {
    async fn generate(&self, prompt: &str) -> Result<String, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.outage.load(Ordering::SeqCst) {
            return Err(ClassifyError::Transport("connection timed out".to_string()));
        }
        // Only the message section; the instructions mention sample complaints.
        let start = prompt.find("SUBJECT (cleaned):").unwrap_or(0);
        let end = prompt.rfind("\n\nNotes:").filter(|&e| e > start).unwrap_or(prompt.len());
        let message = &prompt[start..end];

        let rules = self.rules.lock().unwrap();
        let reply = rules
            .iter()
            .find(|(needle, _)| message.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(not_complaint_reply);
        Ok(reply)
    }
}

/// Records retry waits instead of sleeping.
#[derive(Default)]
pub struct NoSleep {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for NoSleep {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Isolated sync environment for integration tests.
pub struct TestHarness {
    pub db: Database,
    pub mail: Arc<FakeMailbox>,
    pub model: Arc<FakeModel>,
    pub sleeper: Arc<NoSleep>,
    master: Arc<MasterPartList>,
}

impl TestHarness {
    /// Harness with a small master list containing `12345-AB` and `QX-1200`.
    pub fn new() -> Self {
        Self::with_master_parts(&["12345-AB", "QX-1200"])
    }

    pub fn with_master_parts(parts: &[&str]) -> Self {
        Self {
            db: Database::open_in_memory().expect("Failed to open in-memory database"),
            mail: Arc::new(FakeMailbox::default()),
            model: Arc::new(FakeModel::default()),
            sleeper: Arc::new(NoSleep::default()),
            master: Arc::new(parts.iter().collect()),
        }
    }

    pub fn engine(&self) -> ReconcileEngine {
        let classifier = ClassificationClient::new(self.model.clone(), RetryPolicy::default())
            .with_sleeper(self.sleeper.clone());
        ReconcileEngine::new(
            self.mail.clone(),
            classifier,
            Arc::new(self.db.clone()),
            PartNumberResolver::new(self.master.clone()),
        )
    }

    pub fn deliver(&self, message: RawMessage) {
        self.mail.deliver(message);
    }

    /// Runs a sync over all mail at or after `since`, panicking on failure.
    pub async fn run(&self, since: &str) -> RunSummary {
        self.try_run(since, &CancellationFlag::new())
            .await
            .expect("sync run failed")
    }

    pub async fn try_run(
        &self,
        since: &str,
        cancel: &CancellationFlag,
    ) -> Result<RunSummary, ReconcileError> {
        self.engine()
            .run(super::builders::utc(since), cancel)
            .await
    }

    pub fn seed(&self, case: ComplaintCase) {
        self.db.upsert(case).expect("Failed to seed case");
    }

    pub fn case(&self, conversation_id: &str) -> Option<ComplaintCase> {
        self.db
            .get_case(conversation_id)
            .expect("Failed to read case")
    }

    pub fn cases(&self) -> Vec<ComplaintCase> {
        self.db.all_cases().expect("Failed to list cases")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
