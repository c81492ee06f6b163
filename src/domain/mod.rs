//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;

pub use entities::{
    AllRecordings, CALL_MESSAGE_TYPE, CallRecording, Contact, ContactLookup, ContactRecordings,
    Conversation, DEFAULT_RECORDING_FILENAME, EnrichedConversation, EnrichedMessage, Message,
    NoteResponse, Recording, RecordingFailurePolicy, RecordingLink, RecordingStatus,
    RecordingTally, StoredRecording,
};
pub use errors::DomainError;
