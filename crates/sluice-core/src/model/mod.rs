//! Snapshot and record types shared by the merge engine and the view cache.

pub mod server;
pub mod snapshot;
pub mod torrent;

pub use server::{ConnectionStatus, ServerEffect, ServerState, ServerStatePatch};
pub use snapshot::{Category, CategoryPatch, Cursor, Snapshot};
pub use torrent::{PatchEffect, Torrent, TorrentId, TorrentPatch, TorrentState};
