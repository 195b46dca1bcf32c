//! Storage layer for Waypoint data.
//!
//! Exactly one mission snapshot exists at a time. It lives under a single
//! fixed key in a [`KeyValueStore`], wrapped in a versioned envelope:
//!
//! ```json
//! {"version": 3, "snapshot": { ... }}
//! ```
//!
//! Every successful save bumps the version. A save carrying a stale expected
//! version is rejected, and the write itself only lands if the stored bytes are
//! still the ones the check read. On SQLite that check-and-write is a single
//! transaction, so two processes that both loaded version 3 cannot both write
//! version 4. The file and memory backends give the same guarantee within one
//! process only.

pub mod backend;

pub use backend::{BackendType, FileStore, KeyValueStore, MemoryStore, SqliteStore};

use crate::models::MissionSnapshot;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed key the mission snapshot is stored under.
pub const SNAPSHOT_KEY: &str = "waypoint-mission-snapshot-v1";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "WP_DATA_DIR";

/// A snapshot together with the version it was stored at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub version: u64,
    pub snapshot: MissionSnapshot,
}

/// Versioned persistence for the single mission snapshot.
pub struct MissionStore {
    backend: Box<dyn KeyValueStore>,
}

impl MissionStore {
    /// Wrap a key-value backend.
    pub fn new(backend: Box<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// A store backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Load the current snapshot.
    ///
    /// Absence and undecodable content both yield `Ok(None)`: a corrupt
    /// snapshot means the mission has not started.
    pub fn load(&self) -> Result<Option<StoredSnapshot>> {
        let Some(bytes) = self.backend.get(SNAPSHOT_KEY)? else {
            tracing::debug!("no mission snapshot stored");
            return Ok(None);
        };
        let stored = decode(&bytes);
        if let Some(ref stored) = stored {
            tracing::debug!(version = stored.version, "loaded mission snapshot");
        }
        Ok(stored)
    }

    /// Persist `snapshot` if the stored version still equals `expected`.
    ///
    /// `expected` is `None` when the caller saw no snapshot. Returns the new version.
    pub fn save(&mut self, snapshot: &MissionSnapshot, expected: Option<u64>) -> Result<u64> {
        let current = self.backend.get(SNAPSHOT_KEY)?;
        let found = current.as_deref().and_then(decode).map(|stored| stored.version);
        if found != expected {
            tracing::warn!(?expected, ?found, "rejecting stale snapshot write");
            return Err(Error::StaleWrite { expected, found });
        }

        let version = found.map_or(1, |v| v + 1);
        let envelope = StoredSnapshot {
            version,
            snapshot: snapshot.clone(),
        };
        let bytes = serde_json::to_vec(&envelope)?;
        if !self
            .backend
            .compare_and_set(SNAPSHOT_KEY, current.as_deref(), &bytes)?
        {
            let found = self.load()?.map(|stored| stored.version);
            tracing::warn!(?expected, ?found, "snapshot changed during write");
            return Err(Error::StaleWrite { expected, found });
        }
        tracing::debug!(version, "saved mission snapshot");
        Ok(version)
    }

    /// Remove the snapshot. Returns true if a stored value, decodable or not,
    /// was removed.
    pub fn clear(&mut self) -> Result<bool> {
        let existed = self.backend.get(SNAPSHOT_KEY)?.is_some();
        self.backend.delete(SNAPSHOT_KEY)?;
        Ok(existed)
    }

    /// Get the storage location description.
    pub fn location(&self) -> String {
        self.backend.location()
    }

    /// Get the backend type.
    pub fn backend_type(&self) -> BackendType {
        self.backend.backend_type()
    }
}

fn decode(bytes: &[u8]) -> Option<StoredSnapshot> {
    match serde_json::from_slice::<StoredSnapshot>(bytes) {
        Ok(stored) => Some(stored),
        Err(e) => {
            tracing::warn!(error = %e, "discarding undecodable mission snapshot");
            None
        }
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique ID.
///
/// Format: `<prefix>-<8 hex chars>`, e.g. `task-3fa9c01b`.
pub fn generate_id(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    hasher.update(ID_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let hash = hasher.finalize();
    let hash_hex = format!("{:x}", hash);
    format!("{}-{}", prefix, &hash_hex[..8])
}
