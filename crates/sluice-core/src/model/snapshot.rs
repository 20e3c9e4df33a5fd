//! Wire-level update unit produced by the remote engine on each poll.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::server::ServerStatePatch;
use super::torrent::{TorrentId, TorrentPatch, assign};

/// Position in the engine's change stream. Zero requests a full snapshot.
pub type Cursor = u64;

/// Category record keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    /// Category name (may contain `/` for nested categories).
    pub name: String,
    /// Default save path for torrents in this category.
    pub save_path: String,
}

impl Category {
    /// Materialise a category from a patch.
    #[must_use]
    pub fn from_patch(name: impl Into<String>, patch: CategoryPatch) -> Self {
        let mut category = Self {
            name: name.into(),
            save_path: String::new(),
        };
        category.apply(patch);
        category
    }

    /// Fold a patch onto this category; returns whether anything changed.
    pub fn apply(&mut self, patch: CategoryPatch) -> bool {
        assign(&mut self.save_path, patch.save_path)
    }
}

/// Partial category record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryPatch {
    /// Default save path.
    pub save_path: Option<String>,
}

/// One poll response, either a full replacement or a delta.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    /// Cursor to send with the next request.
    pub cursor: Cursor,
    /// When true the payload replaces all prior state.
    pub full_update: bool,
    /// Torrents added or changed.
    #[serde(default)]
    pub torrents: HashMap<TorrentId, TorrentPatch>,
    /// Torrents removed since the previous cursor.
    #[serde(default)]
    pub torrents_removed: HashSet<TorrentId>,
    /// Categories added or changed.
    #[serde(default)]
    pub categories: HashMap<String, CategoryPatch>,
    /// Categories removed.
    #[serde(default)]
    pub categories_removed: HashSet<String>,
    /// Authoritative tag list; replaces the known tags when present.
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    /// Tags added since the previous cursor, for engines that only report additions.
    #[serde(default)]
    pub tags_added: BTreeSet<String>,
    /// Tags removed.
    #[serde(default)]
    pub tags_removed: HashSet<String>,
    /// Tracker url to the full set of torrents announcing to it.
    #[serde(default)]
    pub trackers: HashMap<String, BTreeSet<TorrentId>>,
    /// Trackers removed.
    #[serde(default)]
    pub trackers_removed: HashSet<String>,
    /// Server/session record, when the engine sent one.
    #[serde(default)]
    pub server_state: Option<ServerStatePatch>,
}

impl Snapshot {
    /// Empty full snapshot at the given cursor.
    #[must_use]
    pub fn full(cursor: Cursor) -> Self {
        Self {
            cursor,
            full_update: true,
            tags: Some(BTreeSet::new()),
            ..Self::default()
        }
    }

    /// Empty delta snapshot at the given cursor.
    #[must_use]
    pub fn delta(cursor: Cursor) -> Self {
        Self {
            cursor,
            ..Self::default()
        }
    }

    /// Builder-style torrent upsert.
    #[must_use]
    pub fn with_torrent(mut self, id: impl Into<TorrentId>, patch: TorrentPatch) -> Self {
        self.torrents.insert(id.into(), patch);
        self
    }

    /// Builder-style torrent removal.
    #[must_use]
    pub fn without_torrent(mut self, id: impl Into<TorrentId>) -> Self {
        self.torrents_removed.insert(id.into());
        self
    }

    /// Builder-style server record.
    #[must_use]
    pub fn with_server_state(mut self, patch: ServerStatePatch) -> Self {
        self.server_state = Some(patch);
        self
    }
}
