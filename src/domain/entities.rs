//! Domain entities. Pure data structures for the core business.
//!
//! No HTTP/IO types here. Upstream CRM payloads are mapped into these by adapters;
//! conversation and message fields the service does not interpret pass through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Upstream `messageType` tag of a phone call message.
pub const CALL_MESSAGE_TYPE: &str = "TYPE_CALL";

/// Filename used when the upstream omits `Content-Disposition`.
pub const DEFAULT_RECORDING_FILENAME: &str = "recording.wav";

/// A CRM contact (person) scoped to a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub contact_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub location_id: Option<String>,
}

impl Contact {
    pub fn new(contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: contact_id.into(),
            first_name: None,
            last_name: None,
            phone: None,
            email: None,
            location_id: None,
        }
    }

    /// Key under which this contact appears in an aggregation result: email, or the id when
    /// the email is missing or empty.
    pub fn result_key(&self) -> &str {
        match self.email.as_deref() {
            Some(email) if !email.is_empty() => email,
            _ => &self.contact_id,
        }
    }

    /// "First Last", falling back to the contact id when both names are blank.
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            self.contact_id.clone()
        } else {
            name
        }
    }
}

/// Missing and `null` ids both read as empty.
fn id_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A conversation thread tied to a contact. Upstream fields other than `id` are kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Empty when upstream sent none; such entries are dropped by the CRM mapper.
    #[serde(default, deserialize_with = "id_or_empty")]
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }
}

/// A single conversation message. Only `messageType` is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, deserialize_with = "id_or_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Message {
    pub fn new(id: impl Into<String>, message_type: Option<&str>) -> Self {
        Self {
            id: id.into(),
            message_type: message_type.map(String::from),
            fields: Map::new(),
        }
    }

    pub fn is_call(&self) -> bool {
        self.message_type.as_deref() == Some(CALL_MESSAGE_TYPE)
    }
}

/// Recording audio fetched for a call message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recording {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: Option<String>,
}

/// A recording held by the store until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecording {
    pub recording: Recording,
    pub expires_at: DateTime<Utc>,
}

/// Short-lived link to a stored recording. This is all callers ever see of the audio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingLink {
    pub recording_url: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Available,
    NotFound,
    Failed,
}

/// What happens to a conversation when one of its recordings fails to download (non-404).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingFailurePolicy {
    /// Keep the message with `recordingStatus: "failed"`.
    #[default]
    Tolerate,
    /// Fail the whole conversation (and the aggregation that contains it).
    FailFast,
}

/// Recording outcome attached to a call message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecording {
    pub recording: Option<RecordingLink>,
    pub recording_status: RecordingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_error: Option<String>,
}

impl CallRecording {
    pub fn available(link: RecordingLink) -> Self {
        Self {
            recording: Some(link),
            recording_status: RecordingStatus::Available,
            recording_error: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            recording: None,
            recording_status: RecordingStatus::NotFound,
            recording_error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            recording: None,
            recording_status: RecordingStatus::Failed,
            recording_error: Some(error.into()),
        }
    }
}

/// Message as emitted to callers. Non-call messages carry no `call` and serialize unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedMessage {
    #[serde(flatten)]
    pub message: Message,
    #[serde(flatten)]
    pub call: Option<CallRecording>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedConversation {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<EnrichedMessage>,
}

/// One contact with all of its enriched conversations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactRecordings {
    pub contact: Contact,
    pub conversations: Vec<EnrichedConversation>,
}

/// Aggregation result for a location, keyed by [`Contact::result_key`].
pub type AllRecordings = BTreeMap<String, ContactRecordings>;

/// Single-contact lookup result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactLookup {
    pub contact_id: String,
    pub email: String,
    pub conversations: Vec<EnrichedConversation>,
}

/// Counts over a contact's conversations. Used for table columns and note summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingTally {
    pub conversations: usize,
    pub calls: usize,
    pub recordings: usize,
}

impl RecordingTally {
    pub fn of(conversations: &[EnrichedConversation]) -> Self {
        let mut tally = Self {
            conversations: conversations.len(),
            ..Self::default()
        };
        for message in conversations.iter().flat_map(|c| &c.messages) {
            if let Some(call) = &message.call {
                tally.calls += 1;
                if call.recording.is_some() {
                    tally.recordings += 1;
                }
            }
        }
        tally
    }
}

/// Upstream response to a note creation. Non-JSON bodies are wrapped as `rawResponse`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NoteResponse {
    Created(Value),
    Raw {
        #[serde(rename = "rawResponse")]
        raw_response: String,
    },
}

impl NoteResponse {
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Self::Created(value),
            Err(_) => Self::Raw {
                raw_response: body.to_string(),
            },
        }
    }
}
