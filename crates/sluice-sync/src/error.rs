//! # Design
//!
//! - Keep error messages constant; store operational context in fields.
//! - One enum per concern so callers can match on what they can act upon.
//! - Collaborator failures carry boxed sources so transports stay pluggable.

use std::error::Error;
use std::path::PathBuf;

use thiserror::Error;

use crate::controller::LoopState;

/// Boxed error source used by collaborator implementations.
pub type BoxedSource = Box<dyn Error + Send + Sync + 'static>;

/// Failure talking to the remote engine.
#[derive(Debug, Error)]
#[error("transport request failed")]
pub struct TransportError {
    /// Operation that failed (for example `fetch_snapshot`).
    pub operation: &'static str,
    /// HTTP status when the engine answered with an error.
    pub status: Option<u16>,
    /// Underlying cause, when one exists.
    #[source]
    pub source: Option<BoxedSource>,
}

impl TransportError {
    /// Build from an underlying error.
    #[must_use]
    pub fn new(operation: &'static str, source: impl Error + Send + Sync + 'static) -> Self {
        Self {
            operation,
            status: None,
            source: Some(Box::new(source)),
        }
    }

    /// Build from an unexpected HTTP status.
    #[must_use]
    pub const fn status(operation: &'static str, status: u16) -> Self {
        Self {
            operation,
            status: Some(status),
            source: None,
        }
    }
}

/// Failure of the add-from-link capability.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The engine refused the link.
    #[error("engine rejected the link")]
    Rejected {
        /// Engine-supplied reason.
        reason: String,
    },
    /// The request never completed.
    #[error("add-from-link request failed")]
    Transport(#[from] TransportError),
}

/// Failure of a persisted key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("key-value store IO failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// File involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The backing file held something other than a JSON object of strings.
    #[error("key-value store parse failure")]
    Parse {
        /// File involved.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by the poll loop controller and its handle.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The authentication check answered "no".
    #[error("session is not authenticated")]
    NotAuthenticated,
    /// The authentication check itself failed.
    #[error("authentication check failed")]
    Auth(#[source] TransportError),
    /// The loop already ended; a fresh session is required.
    #[error("poll loop has stopped")]
    Stopped {
        /// Terminal state the loop reached.
        state: LoopState,
    },
    /// The worker went away before answering.
    #[error("poll loop channel closed")]
    ChannelClosed,
}

/// Errors surfaced by deep-link replay.
#[derive(Debug, Error)]
pub enum DeepLinkError {
    /// Adding the captured link failed; the pending value was kept for retry.
    #[error("failed to add torrent from deep link")]
    Add {
        /// Value that could not be added.
        value: String,
        /// Underlying failure.
        #[source]
        source: LinkError,
    },
    /// The authentication check failed.
    #[error("authentication check failed")]
    Auth(#[source] TransportError),
    /// The pending-download store failed.
    #[error("deep-link store failure")]
    Store(#[from] StoreError),
}

/// Invalid runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field held an unusable value.
    #[error("invalid configuration value")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Offending value, rendered.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// The configuration document did not parse.
    #[error("configuration document is malformed")]
    Parse(#[source] serde_json::Error),
}

/// Convenience alias for controller results.
pub type ControllerResult<T> = Result<T, ControllerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn messages_are_constant_and_sources_chain() {
        let transport = TransportError::new("fetch_snapshot", io::Error::other("reset"));
        assert_eq!(transport.to_string(), "transport request failed");
        assert_eq!(
            transport.source().map(ToString::to_string),
            Some("reset".to_string())
        );

        let status = TransportError::status("fetch_snapshot", 403);
        assert_eq!(status.status, Some(403));
        assert!(status.source().is_none());

        let link = LinkError::from(status);
        let err = DeepLinkError::Add {
            value: "magnet:?xt=urn:btih:abc".into(),
            source: link,
        };
        assert_eq!(err.to_string(), "failed to add torrent from deep link");
        assert!(err.source().is_some());
    }

    #[test]
    fn stopped_error_carries_state() {
        let err = ControllerError::Stopped {
            state: LoopState::LostConnection,
        };
        assert_eq!(err.to_string(), "poll loop has stopped");
        assert!(matches!(
            err,
            ControllerError::Stopped {
                state: LoopState::LostConnection
            }
        ));
    }
}
