//! In-memory CRM gateway for tests and demo runs without a token.
//!
//! Serves canned contacts/conversations/messages and records every call so callers can
//! assert on upstream traffic.

use crate::domain::{
    CALL_MESSAGE_TYPE, Contact, Conversation, DomainError, Message, NoteResponse, Recording,
};
use crate::ports::CrmGateway;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

/// Canned answer for a recording lookup.
#[derive(Debug, Clone)]
pub enum MockRecording {
    Found(Recording),
    /// Upstream 404.
    Missing,
    /// Non-404 failure with this status.
    Fail(u16),
}

/// Mock CRM gateway.
///
/// Unknown contacts have no conversations, unknown conversations have no messages and unknown
/// call messages have no recording (404).
#[derive(Debug, Default)]
pub struct MockCrmGateway {
    contacts: Vec<Contact>,
    contacts_failure: Option<u16>,
    conversations: HashMap<String, Vec<Conversation>>,
    messages: HashMap<String, Vec<Message>>,
    recordings: HashMap<String, MockRecording>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    notes: Mutex<Vec<(String, String)>>,
}

impl MockCrmGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contacts.push(contact);
        self
    }

    /// Make `list_contacts` fail with the given upstream status.
    pub fn with_contacts_failure(mut self, status: u16) -> Self {
        self.contacts_failure = Some(status);
        self
    }

    pub fn with_conversation(mut self, contact_id: &str, conversation: Conversation) -> Self {
        self.conversations
            .entry(contact_id.to_string())
            .or_default()
            .push(conversation);
        self
    }

    pub fn with_messages(mut self, conversation_id: &str, messages: Vec<Message>) -> Self {
        self.messages.insert(conversation_id.to_string(), messages);
        self
    }

    pub fn with_recording(mut self, message_id: &str, recording: MockRecording) -> Self {
        self.recordings.insert(message_id.to_string(), recording);
        self
    }

    /// Simulated latency applied to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Total number of gateway calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Notes created so far as `(contact_id, body)`.
    pub fn notes(&self) -> Vec<(String, String)> {
        self.notes.lock().map(|n| n.clone()).unwrap_or_default()
    }

    /// Two contacts with a handful of calls, used when no CRM token is configured.
    pub fn demo() -> Self {
        let wav = Recording {
            bytes: b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec(),
            filename: "demo-call.wav".to_string(),
            content_type: Some("audio/x-wav".to_string()),
        };
        let mut sms = Message::new("demo-m3", Some("TYPE_SMS"));
        sms.fields
            .insert("body".into(), json!("Thanks, talk tomorrow"));

        Self::new()
            .with_delay(Duration::from_millis(50))
            .with_contact(Contact {
                first_name: Some("Ada".into()),
                last_name: Some("Lovelace".into()),
                phone: Some("+15550100".into()),
                email: Some("ada@example.com".into()),
                location_id: Some("demo-location".into()),
                ..Contact::new("demo-c1")
            })
            .with_contact(Contact {
                first_name: Some("Alan".into()),
                last_name: Some("Turing".into()),
                phone: Some("+15550101".into()),
                location_id: Some("demo-location".into()),
                ..Contact::new("demo-c2")
            })
            .with_conversation("demo-c1", Conversation::new("demo-conv1"))
            .with_messages(
                "demo-conv1",
                vec![
                    Message::new("demo-m1", Some(CALL_MESSAGE_TYPE)),
                    Message::new("demo-m2", Some(CALL_MESSAGE_TYPE)),
                    sms,
                ],
            )
            .with_recording("demo-m1", MockRecording::Found(wav))
    }

    async fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl CrmGateway for MockCrmGateway {
    async fn list_contacts(&self, location_id: &str) -> Result<Vec<Contact>, DomainError> {
        self.tick().await;
        info!(location_id, "[MOCK] listing contacts");
        if let Some(status) = self.contacts_failure {
            return Err(DomainError::upstream("contacts", status, "mock failure"));
        }
        Ok(self.contacts.clone())
    }

    async fn search_conversations(
        &self,
        contact_id: &str,
        _location_id: &str,
    ) -> Result<Vec<Conversation>, DomainError> {
        self.tick().await;
        Ok(self
            .conversations
            .get(contact_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, DomainError> {
        self.tick().await;
        Ok(self
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_recording(
        &self,
        message_id: &str,
        _location_id: &str,
    ) -> Result<Option<Recording>, DomainError> {
        self.tick().await;
        match self.recordings.get(message_id) {
            Some(MockRecording::Found(recording)) => Ok(Some(recording.clone())),
            Some(MockRecording::Fail(status)) => Err(DomainError::upstream(
                "recording",
                *status,
                "mock recording failure",
            )),
            Some(MockRecording::Missing) | None => Ok(None),
        }
    }

    async fn create_note(&self, contact_id: &str, body: &str) -> Result<NoteResponse, DomainError> {
        self.tick().await;
        let mut notes = self
            .notes
            .lock()
            .map_err(|_| DomainError::Store("mock notes lock poisoned".to_string()))?;
        notes.push((contact_id.to_string(), body.to_string()));
        Ok(NoteResponse::Created(json!({
            "note": { "id": format!("note-{}", notes.len()), "body": body, "contactId": contact_id }
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_counts_calls_and_notes() {
        let gw = MockCrmGateway::new()
            .with_contact(Contact::new("c1"))
            .with_recording("m1", MockRecording::Fail(500));

        assert_eq!(gw.list_contacts("loc").await.unwrap().len(), 1);
        assert!(gw.search_conversations("c1", "loc").await.unwrap().is_empty());
        assert!(gw.fetch_recording("m1", "loc").await.is_err());
        assert!(gw.fetch_recording("m2", "loc").await.unwrap().is_none());
        gw.create_note("c1", "hello").await.unwrap();

        assert_eq!(gw.calls(), 5);
        assert_eq!(gw.notes(), vec![("c1".to_string(), "hello".to_string())]);
    }

    #[tokio::test]
    async fn test_demo_has_one_recording() {
        let gw = MockCrmGateway::demo().with_delay(Duration::ZERO);
        let messages = gw.list_messages("demo-conv1").await.unwrap();
        assert_eq!(messages.len(), 3);
        assert!(gw.fetch_recording("demo-m1", "x").await.unwrap().is_some());
        assert!(gw.fetch_recording("demo-m2", "x").await.unwrap().is_none());
    }
}
