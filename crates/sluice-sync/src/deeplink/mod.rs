//! Capture of "add this torrent" deep links and their one-time replay.
//!
//! # Design
//! - A captured value is persisted immediately so a full reload does not lose it.
//! - The last successfully replayed value is persisted too; it suppresses re-capture
//!   after the replay's own navigation and makes a stale pending value harmless.
//! - Invalid values are dropped quietly; they are usually addresses without a link.
//! - `replay` takes `&mut self`, so one pending item is replayed at a time.

mod link;

pub use link::{
    DOWNLOAD_PARAM, InvalidDownload, MAX_DOWNLOAD_LEN, extract_download_param, validate_download,
};

use tracing::{debug, info, warn};

use crate::collab::{AuthCheck, KeyValueStore, LinkAdder, Navigator};
use crate::error::{DeepLinkError, StoreError};

/// Storage key for the captured, not yet replayed value.
pub const PENDING_KEY: &str = "sluice.download.pending";
/// Storage key for the most recently replayed value.
pub const LAST_PROCESSED_KEY: &str = "sluice.download.last_processed";

/// Result of inspecting an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The address carries no download parameter.
    Absent,
    /// The parameter was present but unusable; nothing was stored.
    Invalid(InvalidDownload),
    /// The value equals the last replayed one; nothing was stored.
    AlreadyHandled,
    /// The value was validated and persisted as pending.
    Captured(String),
}

/// Result of a replay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// No pending value.
    Nothing,
    /// A value is pending but the session is not authenticated yet.
    AwaitingAuth,
    /// The pending value was already replayed; it was cleared and the route reloaded.
    Stale,
    /// The stored value no longer validates; it was cleared.
    Discarded(InvalidDownload),
    /// The value was handed to the engine.
    Replayed(String),
}

/// Deep-link capture and replay over a persisted store.
#[derive(Debug)]
pub struct DeepLinks<S> {
    store: S,
}

impl<S: KeyValueStore> DeepLinks<S> {
    /// Wrap a store.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Pending value, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read.
    pub fn pending(&self) -> Result<Option<String>, StoreError> {
        self.store.get(PENDING_KEY)
    }

    /// Most recently replayed value, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read.
    pub fn last_processed(&self) -> Result<Option<String>, StoreError> {
        self.store.get(LAST_PROCESSED_KEY)
    }

    /// Drop the pending value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be written.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(PENDING_KEY)
    }

    /// Inspect a navigation address and persist a valid download value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store cannot be read or written.
    pub fn capture(&self, address: &str) -> Result<CaptureOutcome, StoreError> {
        let Some(raw) = extract_download_param(address) else {
            return Ok(CaptureOutcome::Absent);
        };

        let value = match validate_download(&raw) {
            Ok(value) => value,
            Err(reason) => {
                debug!(reason = %reason, "discarding deep link");
                return Ok(CaptureOutcome::Invalid(reason));
            }
        };

        if self.last_processed()?.as_deref() == Some(value.as_str()) {
            debug!("deep link already handled");
            return Ok(CaptureOutcome::AlreadyHandled);
        }

        self.store.set(PENDING_KEY, &value)?;
        info!("deep link captured");
        Ok(CaptureOutcome::Captured(value))
    }

    /// Replay the pending value once the session is authenticated.
    ///
    /// # Errors
    ///
    /// - [`DeepLinkError::Add`] when the engine refuses the link; the value stays pending.
    /// - [`DeepLinkError::Auth`] when the authentication check fails.
    /// - [`DeepLinkError::Store`] when the store fails.
    pub async fn replay(
        &mut self,
        auth: &dyn AuthCheck,
        adder: &dyn LinkAdder,
        navigator: &dyn Navigator,
    ) -> Result<ReplayOutcome, DeepLinkError> {
        let Some(pending) = self.pending()? else {
            return Ok(ReplayOutcome::Nothing);
        };

        match auth.is_authenticated().await {
            Ok(true) => {}
            Ok(false) => return Ok(ReplayOutcome::AwaitingAuth),
            Err(err) => return Err(DeepLinkError::Auth(err)),
        }

        // Another writer may have touched the store since capture.
        if self.last_processed()?.as_deref() == Some(pending.as_str()) {
            self.clear()?;
            info!("stale deep link cleared");
            navigator.reload();
            return Ok(ReplayOutcome::Stale);
        }
        if let Err(reason) = validate_download(&pending) {
            self.clear()?;
            debug!(reason = %reason, "discarding stored deep link");
            return Ok(ReplayOutcome::Discarded(reason));
        }

        self.clear()?;
        match adder.add_torrent_from_link(&pending).await {
            Ok(()) => {
                self.store.set(LAST_PROCESSED_KEY, &pending)?;
                info!("deep link replayed");
                navigator.reset_to_home();
                Ok(ReplayOutcome::Replayed(pending))
            }
            Err(source) => {
                warn!(error = %source, "adding torrent from deep link failed");
                self.store.set(PENDING_KEY, &pending)?;
                Err(DeepLinkError::Add {
                    value: pending,
                    source,
                })
            }
        }
    }
}
