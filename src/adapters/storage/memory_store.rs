//! Implements RecordingStore in process memory.
//!
//! Each recording lives under a random token until `expires_at`; links point at `/media/{token}`.
//! Expired entries are invisible to `get` immediately and freed by `purge_expired`.
//! Total audio held is capped at `max_bytes`; a put that would exceed it evicts the entries
//! closest to expiry first.

use crate::domain::{DomainError, Recording, RecordingLink, StoredRecording};
use crate::ports::RecordingStore;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Route prefix the HTTP adapter serves recordings under.
pub const MEDIA_ROUTE_PREFIX: &str = "/media";

struct Entry {
    key: String,
    stored: StoredRecording,
}

#[derive(Default)]
struct Entries {
    by_token: HashMap<String, Entry>,
    by_key: HashMap<String, String>,
    bytes: usize,
}

impl Entries {
    fn insert(&mut self, token: String, key: &str, stored: StoredRecording) {
        self.bytes += stored.recording.bytes.len();
        self.by_key.insert(key.to_string(), token.clone());
        self.by_token.insert(
            token,
            Entry {
                key: key.to_string(),
                stored,
            },
        );
    }

    fn remove(&mut self, token: &str) -> Option<Entry> {
        let entry = self.by_token.remove(token)?;
        self.bytes = self.bytes.saturating_sub(entry.stored.recording.bytes.len());
        if self.by_key.get(&entry.key).is_some_and(|t| t == token) {
            self.by_key.remove(&entry.key);
        }
        Some(entry)
    }

    /// Token of the live entry under `key`.
    fn live_token(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let token = self.by_key.get(key)?;
        self.by_token
            .get(token)
            .filter(|entry| entry.stored.expires_at > now)
            .map(|_| token.clone())
    }

    fn soonest_expiring(&self) -> Option<String> {
        self.by_token
            .iter()
            .min_by_key(|(_, entry)| entry.stored.expires_at)
            .map(|(token, _)| token.clone())
    }
}

pub struct MemoryRecordingStore {
    ttl: TimeDelta,
    public_base_url: String,
    max_bytes: usize,
    entries: RwLock<Entries>,
}

impl MemoryRecordingStore {
    /// `public_base_url` is prepended to links; pass `""` for relative links. Uncapped until
    /// [`with_max_bytes`](Self::with_max_bytes).
    pub fn new(ttl: Duration, public_base_url: impl Into<String>) -> Self {
        Self {
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            max_bytes: usize::MAX,
            entries: RwLock::new(Entries::default()),
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Number of entries currently held, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.read().await.by_token.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.by_token.is_empty()
    }

    /// Audio bytes currently held, expired or not.
    pub async fn total_bytes(&self) -> usize {
        self.entries.read().await.bytes
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, DomainError> {
        now.checked_add_signed(self.ttl)
            .ok_or_else(|| DomainError::Store("recording expiry out of range".to_string()))
    }

    fn link_for(&self, token: &str, stored: &StoredRecording) -> RecordingLink {
        RecordingLink {
            recording_url: format!("{}{}/{}", self.public_base_url, MEDIA_ROUTE_PREFIX, token),
            filename: stored.recording.filename.clone(),
            content_type: stored.recording.content_type.clone(),
            expires_at: stored.expires_at,
        }
    }

    /// Refresh the live entry under `key` and return its link.
    fn refresh(
        &self,
        entries: &mut Entries,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<RecordingLink>, DomainError> {
        let Some(token) = entries.live_token(key, now) else {
            return Ok(None);
        };
        let expires_at = self.expiry_from(now)?;
        let Some(entry) = entries.by_token.get_mut(&token) else {
            return Ok(None);
        };
        entry.stored.expires_at = expires_at;
        Ok(Some(self.link_for(&token, &entry.stored)))
    }
}

#[async_trait::async_trait]
impl RecordingStore for MemoryRecordingStore {
    async fn put(&self, key: &str, recording: Recording) -> Result<RecordingLink, DomainError> {
        let size = recording.bytes.len();
        if size > self.max_bytes {
            return Err(DomainError::Store(format!(
                "recording of {} bytes exceeds store capacity of {} bytes",
                size, self.max_bytes
            )));
        }

        let now = Utc::now();
        let mut entries = self.entries.write().await;
        if let Some(link) = self.refresh(&mut entries, key, now)? {
            debug!(key, "recording already stored, reusing link");
            return Ok(link);
        }
        if let Some(stale) = entries.by_key.get(key).cloned() {
            entries.remove(&stale);
        }

        let mut evicted = 0usize;
        while entries.bytes.saturating_add(size) > self.max_bytes {
            let Some(token) = entries.soonest_expiring() else {
                break;
            };
            entries.remove(&token);
            evicted += 1;
        }
        if evicted > 0 {
            warn!(evicted, max_bytes = self.max_bytes, "recording store full, evicted entries");
        }

        let token = Uuid::new_v4().simple().to_string();
        let stored = StoredRecording {
            recording,
            expires_at: self.expiry_from(now)?,
        };
        let link = self.link_for(&token, &stored);
        debug!(token = %token, key, size, expires_at = %stored.expires_at, "stored recording");
        entries.insert(token, key, stored);
        Ok(link)
    }

    async fn reuse(&self, key: &str) -> Result<Option<RecordingLink>, DomainError> {
        let mut entries = self.entries.write().await;
        self.refresh(&mut entries, key, Utc::now())
    }

    async fn get(&self, token: &str) -> Result<Option<StoredRecording>, DomainError> {
        let entries = self.entries.read().await;
        let now = Utc::now();
        Ok(entries
            .by_token
            .get(token)
            .map(|entry| &entry.stored)
            .filter(|stored| stored.expires_at > now)
            .cloned())
    }

    async fn purge_expired(&self) -> Result<usize, DomainError> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let expired: Vec<String> = entries
            .by_token
            .iter()
            .filter(|(_, entry)| entry.stored.expires_at <= now)
            .map(|(token, _)| token.clone())
            .collect();
        for token in &expired {
            entries.remove(token);
        }
        Ok(expired.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording() -> Recording {
        Recording {
            bytes: vec![1, 2, 3],
            filename: "call.wav".into(),
            content_type: Some("audio/wav".into()),
        }
    }

    fn token_of(link: &RecordingLink) -> &str {
        link.recording_url
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }

    async fn pause() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryRecordingStore::new(Duration::from_secs(60), "");
        let link = store.put("loc/m1", recording()).await.unwrap();

        assert!(link.recording_url.starts_with("/media/"));
        assert_eq!(link.filename, "call.wav");
        assert!(link.expires_at > Utc::now());

        let stored = store.get(token_of(&link)).await.unwrap().unwrap();
        assert_eq!(stored.recording.bytes, vec![1, 2, 3]);
        assert!(store.get("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_links_use_public_base_url() {
        let store = MemoryRecordingStore::new(Duration::from_secs(60), "https://calls.example.com/");
        let link = store.put("loc/m1", recording()).await.unwrap();
        assert!(link.recording_url.starts_with("https://calls.example.com/media/"));
    }

    #[tokio::test]
    async fn test_distinct_keys_get_distinct_tokens() {
        let store = MemoryRecordingStore::new(Duration::from_secs(60), "");
        let a = store.put("loc/m1", recording()).await.unwrap();
        let b = store.put("loc/m2", recording()).await.unwrap();
        assert_ne!(a.recording_url, b.recording_url);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_same_key_keeps_one_entry() {
        let store = MemoryRecordingStore::new(Duration::from_secs(60), "");
        let first = store.put("loc/m1", recording()).await.unwrap();
        pause().await;

        for _ in 0..50 {
            let again = store.put("loc/m1", recording()).await.unwrap();
            assert_eq!(again.recording_url, first.recording_url);
        }
        assert_eq!(store.len().await, 1);
        assert_eq!(store.total_bytes().await, 3);

        let reused = store.reuse("loc/m1").await.unwrap().unwrap();
        assert_eq!(reused.recording_url, first.recording_url);
        assert!(reused.expires_at > first.expires_at);
        assert!(store.reuse("loc/other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_key_is_replaced() {
        let store = MemoryRecordingStore::new(Duration::ZERO, "");
        let first = store.put("loc/m1", recording()).await.unwrap();
        assert!(store.reuse("loc/m1").await.unwrap().is_none());

        let second = store.put("loc/m1", recording()).await.unwrap();
        assert_ne!(first.recording_url, second.recording_url);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_cap_evicts_soonest_expiring() {
        let store = MemoryRecordingStore::new(Duration::from_secs(60), "").with_max_bytes(6);
        let a = store.put("loc/a", recording()).await.unwrap();
        pause().await;
        let b = store.put("loc/b", recording()).await.unwrap();
        pause().await;
        // refreshing `a` leaves `b` closest to expiry
        store.reuse("loc/a").await.unwrap().unwrap();
        pause().await;
        let c = store.put("loc/c", recording()).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert_eq!(store.total_bytes().await, 6);
        assert!(store.get(token_of(&a)).await.unwrap().is_some());
        assert!(store.get(token_of(&b)).await.unwrap().is_none());
        assert!(store.get(token_of(&c)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_oversized_recording_rejected() {
        let store = MemoryRecordingStore::new(Duration::from_secs(60), "").with_max_bytes(2);
        let err = store.put("loc/m1", recording()).await.unwrap_err();
        assert!(matches!(err, DomainError::Store(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_entries_hidden_and_purged() {
        let store = MemoryRecordingStore::new(Duration::ZERO, "");
        let link = store.put("loc/m1", recording()).await.unwrap();
        store.put("loc/m2", recording()).await.unwrap();

        assert!(store.get(token_of(&link)).await.unwrap().is_none());
        assert_eq!(store.purge_expired().await.unwrap(), 2);
        assert!(store.is_empty().await);
        assert_eq!(store.total_bytes().await, 0);
        assert_eq!(store.purge_expired().await.unwrap(), 0);
    }
}
