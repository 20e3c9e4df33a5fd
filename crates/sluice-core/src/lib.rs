#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Synchronization core for a polling torrent-engine client.
//!
//! Layout: `model` (snapshot and record types), `state` (canonical state and
//! merge engine), `filter` (criteria and sidebar counts), `view` (lazily
//! recomputed projection), and `session` (the per-session owner of both).
//! Everything here is synchronous and free of I/O.

pub mod error;
pub mod filter;
pub mod model;
pub mod session;
pub mod state;
pub mod view;

pub use error::{SyncError, SyncResult};
pub use filter::{
    CategoryFilter, FilterCriteria, SearchField, SearchFilter, SidebarCounts, StatusFilter,
    TagFilter, TrackerFilter,
};
pub use model::{
    Category, CategoryPatch, ConnectionStatus, Cursor, PatchEffect, ServerEffect, ServerState,
    ServerStatePatch, Snapshot, Torrent, TorrentId, TorrentPatch, TorrentState,
};
pub use session::{ChangeEvent, ChangeKind, MergeOutcome, SyncSession};
pub use state::{MergeReport, SyncState};
pub use view::{SortColumn, SortSpec, ViewCache};
