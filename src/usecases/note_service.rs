//! Note creation on CRM contacts, and the call-summary note text used by the dashboard.

use crate::domain::{Contact, DomainError, EnrichedConversation, NoteResponse, RecordingTally};
use crate::ports::CrmGateway;
use std::sync::Arc;
use tracing::info;

pub struct NoteService {
    gateway: Arc<dyn CrmGateway>,
}

impl NoteService {
    pub fn new(gateway: Arc<dyn CrmGateway>) -> Self {
        Self { gateway }
    }

    /// Create a note on a contact. One upstream call, no retry.
    ///
    /// # Errors
    /// `InvalidInput` for an empty contact id or blank text; `Upstream` with the CRM's status and
    /// response text when the write is rejected.
    pub async fn create_note(&self, contact_id: &str, text: &str) -> Result<NoteResponse, DomainError> {
        if contact_id.is_empty() {
            return Err(DomainError::InvalidInput("Missing contactId".to_string()));
        }
        if text.trim().is_empty() {
            return Err(DomainError::InvalidInput("Missing note body".to_string()));
        }

        let response = self.gateway.create_note(contact_id, text).await?;
        info!(contact_id, body_len = text.len(), "note created");
        Ok(response)
    }

    /// Note text summarising a contact's call recordings.
    pub fn summary_text(contact: &Contact, conversations: &[EnrichedConversation]) -> String {
        let tally = RecordingTally::of(conversations);
        format!(
            "Summary of call recordings for {}:\n{} conversation(s), {} call(s), {} recording(s) available.",
            contact.display_name(),
            tally.conversations,
            tally.calls,
            tally.recordings
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ghl::MockCrmGateway;
    use crate::domain::{CallRecording, Conversation, EnrichedMessage, Message};

    #[tokio::test]
    async fn test_create_note_passes_text_through() {
        let gw = Arc::new(MockCrmGateway::new());
        let svc = NoteService::new(Arc::clone(&gw) as Arc<dyn CrmGateway>);

        let response = svc.create_note("c1", "Follow up Monday").await.unwrap();
        assert!(matches!(response, NoteResponse::Created(_)));
        assert_eq!(
            gw.notes(),
            vec![("c1".to_string(), "Follow up Monday".to_string())]
        );
    }

    #[tokio::test]
    async fn test_create_note_rejects_blank_input() {
        let gw = Arc::new(MockCrmGateway::new());
        let svc = NoteService::new(Arc::clone(&gw) as Arc<dyn CrmGateway>);

        assert!(svc.create_note("", "text").await.unwrap_err().is_invalid_input());
        assert!(svc.create_note("c1", "  ").await.unwrap_err().is_invalid_input());
        assert_eq!(gw.calls(), 0);
    }

    #[test]
    fn test_summary_text_counts() {
        let contact = Contact {
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            ..Contact::new("c1")
        };
        let conversations = vec![EnrichedConversation {
            conversation: Conversation::new("conv1"),
            messages: vec![
                EnrichedMessage {
                    message: Message::new("m1", Some("TYPE_CALL")),
                    call: Some(CallRecording::not_found()),
                },
                EnrichedMessage {
                    message: Message::new("m2", Some("TYPE_SMS")),
                    call: None,
                },
            ],
        }];

        assert_eq!(
            NoteService::summary_text(&contact, &conversations),
            "Summary of call recordings for Ada Lovelace:\n1 conversation(s), 1 call(s), 0 recording(s) available."
        );
    }
}
