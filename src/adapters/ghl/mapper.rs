//! Map raw GoHighLevel payloads to domain entities.
//!
//! Envelopes tolerate missing lists (treated as empty); contacts, conversations and messages
//! without an id are dropped with a warning.

use crate::domain::{Contact, Conversation, Message};
use serde::Deserialize;
use tracing::warn;

/// `GET /contacts/` response.
#[derive(Debug, Deserialize)]
pub struct ContactsEnvelope {
    #[serde(default)]
    pub contacts: Vec<RawContact>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContact {
    pub id: Option<String>,
    pub first_name_raw: Option<String>,
    pub last_name_raw: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub location_id: Option<String>,
}

/// `GET /conversations/search` response.
#[derive(Debug, Deserialize)]
pub struct ConversationsEnvelope {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

/// `GET /conversations/{id}/messages` response. Messages are nested one level: `messages.messages`.
#[derive(Debug, Deserialize)]
pub struct MessagesEnvelope {
    #[serde(default)]
    pub messages: Option<MessagePage>,
}

#[derive(Debug, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ConversationsEnvelope {
    pub fn into_conversations(self) -> Vec<Conversation> {
        with_ids(self.conversations, "conversations", |c| &c.id)
    }
}

impl MessagesEnvelope {
    pub fn into_messages(self) -> Vec<Message> {
        let messages = self.messages.map(|page| page.messages).unwrap_or_default();
        with_ids(messages, "messages", |m| &m.id)
    }
}

fn with_ids<T>(items: Vec<T>, kind: &'static str, id: impl Fn(&T) -> &String) -> Vec<T> {
    let total = items.len();
    let kept: Vec<T> = items.into_iter().filter(|item| !id(item).is_empty()).collect();
    if kept.len() < total {
        warn!(kind, dropped = total - kept.len(), "dropped entries without an id");
    }
    kept
}

/// Map a raw contact to a domain Contact. `None` when the id is missing or empty.
pub fn contact_from_raw(raw: RawContact) -> Option<Contact> {
    let contact_id = raw.id.filter(|id| !id.is_empty())?;
    Some(Contact {
        contact_id,
        first_name: raw.first_name_raw,
        last_name: raw.last_name_raw,
        phone: raw.phone,
        email: raw.email,
        location_id: raw.location_id,
    })
}

pub fn contacts_from_envelope(envelope: ContactsEnvelope) -> Vec<Contact> {
    let total = envelope.contacts.len();
    let contacts: Vec<Contact> = envelope
        .contacts
        .into_iter()
        .filter_map(contact_from_raw)
        .collect();
    if contacts.len() < total {
        warn!(
            dropped = total - contacts.len(),
            "dropped contacts without an id"
        );
    }
    contacts
}

/// Extract the filename from a `Content-Disposition` header value.
///
/// `attachment; filename="call.wav"` → `call.wav`. Returns `None` when no usable name is present.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let (_, rest) = value.split_once("filename=")?;
    let name = rest
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"')
        .trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
