//! Boundaries to the collaborators the synchronization core depends on.
//!
//! # Design
//! - Network-facing capabilities are async traits; storage, sampling, and navigation are sync.
//! - Every trait is object safe so callers can hand in `Arc<dyn _>` implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sluice_core::{Cursor, Snapshot};

use crate::error::{LinkError, StoreError, TransportError};

/// Fetches the next snapshot from the remote engine.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Request changes since `cursor`; zero asks for a full snapshot.
    async fn fetch(&self, cursor: Cursor) -> Result<Snapshot, TransportError>;
}

/// Reports whether the current session is authenticated.
#[async_trait]
pub trait AuthCheck: Send + Sync {
    /// `Ok(false)` means the engine answered and refused the session.
    async fn is_authenticated(&self) -> Result<bool, TransportError>;
}

/// Hands a magnet reference or `.torrent` URL to the engine.
#[async_trait]
pub trait LinkAdder: Send + Sync {
    /// Add a torrent from an already validated link.
    async fn add_torrent_from_link(&self, value: &str) -> Result<(), LinkError>;
}

/// One point of the transfer-speed time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedSample {
    /// When the sample was taken.
    pub at: DateTime<Utc>,
    /// Global download rate in bytes per second.
    pub download_bps: u64,
    /// Global upload rate in bytes per second.
    pub upload_bps: u64,
}

/// Best-effort consumer of speed samples.
pub trait SpeedSink: Send + Sync {
    /// Record a sample; must not block.
    fn push_sample(&self, sample: SpeedSample);
}

/// Opaque persisted string store.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a value; deleting an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Display-layer navigation used after a deep link is handled.
pub trait Navigator: Send + Sync {
    /// Full navigation to the home route, dropping the current address.
    fn reset_to_home(&self);
    /// Reload the current route.
    fn reload(&self);
}
