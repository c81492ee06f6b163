//! Application use cases. Orchestrate domain logic via ports.

pub mod note_service;
pub mod recording_janitor;
pub mod recordings_service;

pub use note_service::NoteService;
pub use recording_janitor::RecordingJanitor;
pub use recordings_service::RecordingsService;
