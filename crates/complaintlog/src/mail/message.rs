use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::text::BodyFormat;

/// One message as delivered by the mail provider.
///
/// Conversation id and received time are optional because providers do
/// occasionally omit them; such messages are counted but never evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub conversation_id: Option<String>,
    pub received_utc: Option<DateTime<Utc>>,
    pub subject: String,
    pub sender: String,
    pub body: String,
    pub body_format: BodyFormat,
    pub web_link: String,
}

/// The first message of a conversation, used to push first-seen earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EarliestMessage {
    pub received_utc: Option<DateTime<Utc>>,
    pub sender: String,
}

// Graph wire types.

#[derive(Debug, Deserialize)]
pub(crate) struct GraphPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphMessage {
    #[serde(default)]
    pub id: String,
    pub conversation_id: Option<String>,
    pub received_date_time: Option<String>,
    pub subject: Option<String>,
    pub from: Option<GraphRecipient>,
    pub body: Option<GraphBody>,
    pub web_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphRecipient {
    pub email_address: Option<GraphEmailAddress>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphEmailAddress {
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphBody {
    pub content_type: Option<String>,
    pub content: Option<String>,
}

fn parse_graph_time(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn sender_address(from: Option<GraphRecipient>) -> String {
    from.and_then(|f| f.email_address)
        .and_then(|e| e.address)
        .unwrap_or_default()
}

impl From<GraphMessage> for RawMessage {
    fn from(msg: GraphMessage) -> Self {
        let (body, body_format) = match msg.body {
            Some(b) => {
                let format = match b.content_type.as_deref() {
                    Some(t) if t.eq_ignore_ascii_case("html") => BodyFormat::Html,
                    _ => BodyFormat::Text,
                };
                (b.content.unwrap_or_default(), format)
            }
            None => (String::new(), BodyFormat::Text),
        };
        RawMessage {
            received_utc: parse_graph_time(msg.received_date_time.as_deref()),
            conversation_id: msg.conversation_id.filter(|c| !c.is_empty()),
            id: msg.id,
            subject: msg.subject.unwrap_or_default(),
            sender: sender_address(msg.from),
            body,
            body_format,
            web_link: msg.web_link.unwrap_or_default(),
        }
    }
}

impl From<GraphMessage> for EarliestMessage {
    fn from(msg: GraphMessage) -> Self {
        EarliestMessage {
            received_utc: parse_graph_time(msg.received_date_time.as_deref()),
            sender: sender_address(msg.from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_graph_page_conversion() {
        let page: GraphPage<GraphMessage> = serde_json::from_str(
            r#"{
                "value": [{
                    "id": "m1",
                    "conversationId": "c1",
                    "receivedDateTime": "2025-03-03T15:15:00Z",
                    "subject": "RE: PN 12345-AB cracked housing",
                    "from": {"emailAddress": {"name": "Bob", "address": "bob@acme.com"}},
                    "body": {"contentType": "html", "content": "<p>Cracked</p>"},
                    "webLink": "https://outlook.office.com/m1"
                }],
                "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/messages?$skip=50"
            }"#,
        )
        .unwrap();
        assert!(page.next_link.is_some());

        let msg: RawMessage = page.value.into_iter().next().unwrap().into();
        assert_eq!(msg.conversation_id.as_deref(), Some("c1"));
        assert_eq!(
            msg.received_utc,
            Some(Utc.with_ymd_and_hms(2025, 3, 3, 15, 15, 0).unwrap())
        );
        assert_eq!(msg.sender, "bob@acme.com");
        assert_eq!(msg.body_format, BodyFormat::Html);
        assert_eq!(msg.web_link, "https://outlook.office.com/m1");
    }

    #[test]
    fn test_missing_fields_tolerated() {
        let page: GraphPage<GraphMessage> =
            serde_json::from_str(r#"{"value": [{"id": "m2", "receivedDateTime": "garbage"}]}"#)
                .unwrap();
        assert!(page.next_link.is_none());
        let msg: RawMessage = page.value.into_iter().next().unwrap().into();
        assert!(msg.conversation_id.is_none());
        assert!(msg.received_utc.is_none());
        assert_eq!(msg.sender, "");
        assert_eq!(msg.body_format, BodyFormat::Text);
    }
}
