//! Recording aggregation: contacts -> conversations -> messages -> call recordings.
//!
//! - Fan-out at every level is bounded and order-preserving (`buffered`)
//! - Call recordings go to the RecordingStore; callers only see links
//! - A recording still live in the store is reused, not downloaded again
//! - A 404 recording is `not_found`; other failures follow `RecordingFailurePolicy`

use crate::domain::{
    AllRecordings, CallRecording, Contact, ContactLookup, ContactRecordings, Conversation,
    DomainError, EnrichedConversation, EnrichedMessage, Message, RecordingFailurePolicy,
    RecordingLink,
};
use crate::ports::{CrmGateway, RecordingStore};
use crate::shared::AggregationOptions;
use futures::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upstream fields replaced by enrichment; dropped so the output never carries them twice.
const ENRICHED_MESSAGE_KEYS: &[&str] = &["recording", "recordingStatus", "recordingError"];

/// Recordings service. Orchestrates the nested fetch chain via CrmGateway.
pub struct RecordingsService {
    gateway: Arc<dyn CrmGateway>,
    store: Arc<dyn RecordingStore>,
    default_location_id: String,
    options: AggregationOptions,
}

impl RecordingsService {
    pub fn new(
        gateway: Arc<dyn CrmGateway>,
        store: Arc<dyn RecordingStore>,
        default_location_id: impl Into<String>,
        options: AggregationOptions,
    ) -> Self {
        Self {
            gateway,
            store,
            default_location_id: default_location_id.into(),
            options,
        }
    }

    pub fn default_location_id(&self) -> &str {
        &self.default_location_id
    }

    fn resolve_location<'a>(&'a self, location_id: Option<&'a str>) -> &'a str {
        location_id
            .filter(|l| !l.is_empty())
            .unwrap_or(&self.default_location_id)
    }

    /// Contacts of a location (default location when `None`).
    pub async fn list_contacts(&self, location_id: Option<&str>) -> Result<Vec<Contact>, DomainError> {
        let location_id = self.resolve_location(location_id);
        self.gateway.list_contacts(location_id).await
    }

    /// Aggregate every contact of a location with its conversations and call recordings.
    ///
    /// Fails as a whole if the contact listing fails, or if any contact's aggregation fails.
    /// Keyed by email (contact id when the email is empty); on collision the later contact wins.
    pub async fn fetch_all_recordings(
        &self,
        location_id: Option<&str>,
    ) -> Result<AllRecordings, DomainError> {
        let location_id = self.resolve_location(location_id);
        let contacts = self.gateway.list_contacts(location_id).await?;
        info!(
            location_id,
            contacts = contacts.len(),
            concurrency = self.options.contact_concurrency,
            "aggregating recordings"
        );

        let entries: Vec<ContactRecordings> = stream::iter(contacts)
            .map(|contact| async move {
                let conversations = self
                    .enrich_contact(&contact.contact_id, location_id)
                    .await?;
                Ok::<_, DomainError>(ContactRecordings {
                    contact,
                    conversations,
                })
            })
            .buffered(self.options.contact_concurrency.max(1))
            .try_collect()
            .await?;

        let mut result = AllRecordings::new();
        for entry in entries {
            let key = entry.contact.result_key().to_string();
            if result.contains_key(&key) {
                warn!(
                    key = %key,
                    contact_id = %entry.contact.contact_id,
                    "duplicate result key; later contact replaces earlier"
                );
            }
            result.insert(key, entry);
        }

        info!(location_id, contacts = result.len(), "aggregation complete");
        Ok(result)
    }

    /// Aggregate a single contact. `email` defaults to the contact id; `location_id` to the
    /// configured default.
    ///
    /// # Errors
    /// `DomainError::InvalidInput` for an empty contact id, before any upstream call.
    pub async fn fetch_recordings_for_contact(
        &self,
        contact_id: &str,
        email: Option<&str>,
        location_id: Option<&str>,
    ) -> Result<ContactLookup, DomainError> {
        if contact_id.is_empty() {
            return Err(DomainError::InvalidInput("Missing contactId".to_string()));
        }
        let location_id = self.resolve_location(location_id);
        let email = email.filter(|e| !e.is_empty()).unwrap_or(contact_id);

        let conversations = self.enrich_contact(contact_id, location_id).await?;
        info!(
            contact_id,
            location_id,
            conversations = conversations.len(),
            "contact recordings fetched"
        );

        Ok(ContactLookup {
            contact_id: contact_id.to_string(),
            email: email.to_string(),
            conversations,
        })
    }

    async fn enrich_contact(
        &self,
        contact_id: &str,
        location_id: &str,
    ) -> Result<Vec<EnrichedConversation>, DomainError> {
        let conversations = self
            .gateway
            .search_conversations(contact_id, location_id)
            .await?;
        debug!(contact_id, count = conversations.len(), "enriching conversations");

        stream::iter(conversations)
            .map(|conversation| self.enrich_conversation(conversation, location_id))
            .buffered(self.options.conversation_concurrency.max(1))
            .try_collect()
            .await
    }

    /// Fetch a conversation's messages and resolve recordings for its calls.
    ///
    /// All-or-nothing over the messages: the first error fails the conversation.
    async fn enrich_conversation(
        &self,
        mut conversation: Conversation,
        location_id: &str,
    ) -> Result<EnrichedConversation, DomainError> {
        let messages = self.gateway.list_messages(&conversation.id).await?;

        let messages: Vec<EnrichedMessage> = stream::iter(messages)
            .map(|message| self.enrich_message(message, location_id))
            .buffered(self.options.recording_concurrency.max(1))
            .try_collect()
            .await?;

        conversation.fields.remove("messages");
        Ok(EnrichedConversation {
            conversation,
            messages,
        })
    }

    async fn enrich_message(
        &self,
        mut message: Message,
        location_id: &str,
    ) -> Result<EnrichedMessage, DomainError> {
        if !message.is_call() {
            return Ok(EnrichedMessage {
                message,
                call: None,
            });
        }
        for key in ENRICHED_MESSAGE_KEYS {
            message.fields.remove(*key);
        }

        let call = match self.resolve_recording(&message.id, location_id).await {
            Ok(Some(link)) => CallRecording::available(link),
            Ok(None) => CallRecording::not_found(),
            Err(e) => match self.options.failure_policy {
                RecordingFailurePolicy::FailFast => return Err(e),
                RecordingFailurePolicy::Tolerate => {
                    warn!(message_id = %message.id, error = %e, "recording fetch failed");
                    CallRecording::failed(e.to_string())
                }
            },
        };

        Ok(EnrichedMessage {
            message,
            call: Some(call),
        })
    }

    /// Link for a call's recording: the stored one while it is live, else a fresh download.
    async fn resolve_recording(
        &self,
        message_id: &str,
        location_id: &str,
    ) -> Result<Option<RecordingLink>, DomainError> {
        let key = format!("{}/{}", location_id, message_id);
        if let Some(link) = self.store.reuse(&key).await? {
            debug!(message_id, "reusing stored recording");
            return Ok(Some(link));
        }
        match self.gateway.fetch_recording(message_id, location_id).await? {
            Some(recording) => self.store.put(&key, recording).await.map(Some),
            None => Ok(None),
        }
    }
}
