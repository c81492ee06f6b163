//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    Contact, Conversation, DomainError, Message, NoteResponse, Recording, RecordingLink,
    StoredRecording,
};

/// CRM API gateway. Contacts, conversations, messages, recordings, notes.
#[async_trait::async_trait]
pub trait CrmGateway: Send + Sync {
    /// List contacts of a location, in upstream order.
    async fn list_contacts(&self, location_id: &str) -> Result<Vec<Contact>, DomainError>;

    /// Conversations of a contact within a location. Missing list = empty.
    async fn search_conversations(
        &self,
        contact_id: &str,
        location_id: &str,
    ) -> Result<Vec<Conversation>, DomainError>;

    /// Messages of a conversation, in upstream order. Missing list = empty.
    async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, DomainError>;

    /// Recording of a call message.
    ///
    /// Returns `Ok(None)` when the upstream has no recording (404); any other failure is an error.
    async fn fetch_recording(
        &self,
        message_id: &str,
        location_id: &str,
    ) -> Result<Option<Recording>, DomainError>;

    /// Create a note on a contact.
    ///
    /// # Errors
    /// `DomainError::Upstream` carrying the status and response text on non-success status.
    async fn create_note(&self, contact_id: &str, body: &str) -> Result<NoteResponse, DomainError>;
}

/// Short-lived storage for recording audio. Hands out links instead of bytes.
///
/// Entries are keyed by the caller (one per location and message); a key maps to at most one
/// live entry, so repeated aggregations share links instead of piling up copies.
#[async_trait::async_trait]
pub trait RecordingStore: Send + Sync {
    /// Store a recording under `key` and return its link.
    ///
    /// When `key` already has a live entry, that entry is kept (expiry refreshed) and its link
    /// returned; `recording` is dropped.
    ///
    /// # Errors
    /// `DomainError::Store` when the recording alone exceeds the store's capacity.
    async fn put(&self, key: &str, recording: Recording) -> Result<RecordingLink, DomainError>;

    /// Link of the live entry under `key`, with its expiry refreshed. `None` when absent or expired.
    async fn reuse(&self, key: &str) -> Result<Option<RecordingLink>, DomainError>;

    /// Look up a token. Unknown and expired tokens both yield `None`.
    async fn get(&self, token: &str) -> Result<Option<StoredRecording>, DomainError>;

    /// Drop expired entries. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, DomainError>;
}
