#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Poll loop, collaborator boundaries, and deep-link handling for the sync core.

/// Collaborator traits (fetch, auth, add-from-link, storage, sampling, navigation).
pub mod collab;
/// Commands sent from handles to the poll worker.
pub mod command;
/// Runtime configuration.
pub mod config;
/// Poll loop controller and handle.
pub mod controller;
/// Deep-link capture and replay.
pub mod deeplink;
/// Error types.
pub mod error;
/// Bounded speed history.
pub mod history;
/// Key-value store implementations.
pub mod storage;
mod worker;

pub use collab::{AuthCheck, KeyValueStore, LinkAdder, Navigator, SnapshotSource, SpeedSample, SpeedSink};
pub use config::SyncConfig;
pub use controller::{LoopState, PollController, SyncHandle};
pub use deeplink::{
    CaptureOutcome, DeepLinks, InvalidDownload, LAST_PROCESSED_KEY, PENDING_KEY, ReplayOutcome,
    extract_download_param, validate_download,
};
pub use error::{
    BoxedSource, ConfigError, ControllerError, ControllerResult, DeepLinkError, LinkError,
    StoreError, TransportError,
};
pub use history::SpeedHistory;
pub use storage::{JsonFileStore, MemoryStore};
