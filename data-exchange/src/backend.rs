//! Blob storage behind the exchange endpoints

use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Token -> blob storage used by [`crate::DataExchange`]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Store the data, returning a fresh token (`None` if the backend is full)
    fn store(&self, data: Bytes) -> Option<String>;

    /// Look up the data stored under the token
    fn retrieve(&self, token: &str) -> Option<Bytes>;

    /// Remove the token, returning whether it existed
    fn remove(&self, token: &str) -> bool;

    /// Drop expired entries
    fn purge(&self);

    /// Number of stored blobs
    fn len(&self) -> usize;

    /// Whether no blobs are stored
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Seconds after which stored blobs are purged (never when absent)
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Maximum number of blobs held at once (unbounded when absent)
    #[serde(default)]
    pub max_entries: Option<usize>,
}

#[derive(Debug)]
struct StoredBlob {
    data: Bytes,
    created: Instant,
}

/// In-memory backend with optional expiry
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: DashMap<String, StoredBlob>,
    // Stored blobs plus stores in flight; reserved before insert
    slots: AtomicUsize,
    ttl: Option<Duration>,
    max_entries: Option<usize>,
}

impl InMemoryBackend {
    /// Create an unbounded backend without expiry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend from configuration
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            entries: DashMap::new(),
            slots: AtomicUsize::new(0),
            ttl: config.ttl_secs.map(Duration::from_secs),
            max_entries: config.max_entries,
        }
    }

    /// Expire blobs after the given duration
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Limit the number of stored blobs
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }
}

impl Backend for InMemoryBackend {
    fn store(&self, data: Bytes) -> Option<String> {
        let max = self.max_entries.unwrap_or(usize::MAX);
        let reserved = self
            .slots
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1));
        if reserved.is_err() {
            warn!("Backend full ({} blobs), refusing upload", max);
            return None;
        }

        let token = Uuid::new_v4().to_string();
        debug!(token = %token, size = data.len(), "Stored blob");

        self.entries.insert(
            token.clone(),
            StoredBlob {
                data,
                created: Instant::now(),
            },
        );

        Some(token)
    }

    fn retrieve(&self, token: &str) -> Option<Bytes> {
        self.entries.get(token).map(|blob| blob.data.clone())
    }

    fn remove(&self, token: &str) -> bool {
        let removed = self.entries.remove(token).is_some();
        if removed {
            self.slots.fetch_sub(1, Ordering::SeqCst);
        }
        removed
    }

    fn purge(&self) {
        let Some(ttl) = self.ttl else {
            return;
        };

        let mut purged = 0;
        self.entries.retain(|_, blob| {
            let keep = blob.created.elapsed() < ttl;
            if !keep {
                purged += 1;
            }
            keep
        });
        self.slots.fetch_sub(purged, Ordering::SeqCst);

        if purged > 0 {
            info!("Purged {} expired blobs", purged);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
