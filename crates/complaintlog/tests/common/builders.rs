//! Builders for mailbox messages and scripted model replies.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde_json::json;

use complaintlog::mail::RawMessage;
use complaintlog::text::BodyFormat;

/// Parses an RFC 3339 timestamp. Panics on malformed input.
pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .unwrap_or_else(|e| panic!("bad timestamp '{}': {}", s, e))
        .with_timezone(&Utc)
}

/// Builder for a [`RawMessage`] as the mail provider would deliver it.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    id: Option<String>,
    conversation_id: Option<String>,
    received_utc: Option<DateTime<Utc>>,
    subject: String,
    sender: String,
    body: String,
    body_format: BodyFormat,
}

impl MessageBuilder {
    pub fn new(conversation_id: &str) -> Self {
        Self {
            id: None,
            conversation_id: Some(conversation_id.to_string()),
            received_utc: Some(utc("2025-03-10T14:00:00Z")),
            subject: String::new(),
            sender: "bob@acme.com".to_string(),
            body: String::new(),
            body_format: BodyFormat::Text,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    pub fn from(mut self, sender: &str) -> Self {
        self.sender = sender.to_string();
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self.body_format = BodyFormat::Text;
        self
    }

    pub fn html(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self.body_format = BodyFormat::Html;
        self
    }

    pub fn received(mut self, at: &str) -> Self {
        self.received_utc = Some(utc(at));
        self
    }

    pub fn without_conversation(mut self) -> Self {
        self.conversation_id = None;
        self
    }

    pub fn without_timestamp(mut self) -> Self {
        self.received_utc = None;
        self
    }

    pub fn build(self) -> RawMessage {
        let conversation = self.conversation_id.clone().unwrap_or_default();
        let stamp = self
            .received_utc
            .map(|r| r.timestamp_millis().to_string())
            .unwrap_or_default();
        RawMessage {
            id: self
                .id
                .unwrap_or_else(|| format!("msg-{}-{}", conversation, stamp)),
            web_link: format!("https://outlook.example/thread/{}", conversation),
            conversation_id: self.conversation_id,
            received_utc: self.received_utc,
            subject: self.subject,
            sender: self.sender,
            body: self.body,
            body_format: self.body_format,
        }
    }
}

/// A model reply flagging a complaint.
pub fn complaint_reply(summary: &str, category: &str, part_number: &str) -> String {
    json!({
        "is_complaint": true,
        "summary": summary,
        "category_suggested": category,
        "case_key": "",
        "part_number": part_number,
    })
    .to_string()
}

/// A model reply rejecting the message.
pub fn not_complaint_reply() -> String {
    json!({
        "is_complaint": false,
        "summary": "",
        "category_suggested": "Other",
        "case_key": "",
        "part_number": "",
    })
    .to_string()
}
