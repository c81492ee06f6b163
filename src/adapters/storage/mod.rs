//! Recording storage adapters. Implement RecordingStore.

pub mod memory_store;

pub use memory_store::MemoryRecordingStore;
