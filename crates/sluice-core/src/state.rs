//! Canonical state and the merge engine that folds snapshots into it.
//!
//! # Design
//! - A full snapshot replaces torrents, categories, tags, and trackers wholesale.
//! - A delta applies removals first, then upserts; an id listed in both ends up absent.
//! - Torrent, category, and server records are folded field-wise from partial patches.
//! - The merge report separates filter-relevant changes from throughput ticks.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::error::{SyncError, SyncResult};
use crate::model::{
    Category, CategoryPatch, Cursor, ServerState, ServerStatePatch, Snapshot, Torrent, TorrentId,
    TorrentPatch,
};

/// The client's merged, authoritative local model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    synced: bool,
    cursor: Cursor,
    torrents: HashMap<TorrentId, Torrent>,
    categories: BTreeMap<String, Category>,
    tags: BTreeSet<String>,
    trackers: BTreeMap<String, BTreeSet<TorrentId>>,
    server_state: ServerState,
    lost_connection: bool,
}

/// Outcome of folding one snapshot into the state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Cursor the state advanced to.
    pub cursor: Cursor,
    /// Whether the snapshot was a full replacement.
    pub full_update: bool,
    /// Whether any field that filters, search, or stable sorts depend on changed.
    pub filter_relevant: bool,
    /// Whether anything at all changed.
    pub changed: bool,
    /// Newly advertised refresh interval in milliseconds, when it changed.
    pub refresh_hint_ms: Option<u64>,
}

impl SyncState {
    /// Functional merge: fold `snapshot` onto `current` (or onto nothing).
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LeadingDelta`] when `current` has never seen a full
    /// snapshot and `snapshot` is a delta.
    pub fn merge(current: Option<Self>, snapshot: Snapshot) -> SyncResult<(Self, MergeReport)> {
        let mut state = current.unwrap_or_default();
        let report = state.apply(snapshot)?;
        Ok((state, report))
    }

    /// Fold a snapshot into this state in place.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::LeadingDelta`] when no full snapshot has been
    /// applied yet and `snapshot` is a delta. The state is left untouched.
    pub fn apply(&mut self, snapshot: Snapshot) -> SyncResult<MergeReport> {
        if snapshot.full_update {
            return Ok(self.replace(snapshot));
        }
        if !self.synced {
            return Err(SyncError::LeadingDelta {
                cursor: snapshot.cursor,
            });
        }
        Ok(self.fold(snapshot))
    }

    fn replace(&mut self, snapshot: Snapshot) -> MergeReport {
        let Snapshot {
            cursor,
            torrents,
            categories,
            tags,
            tags_added,
            trackers,
            server_state,
            ..
        } = snapshot;

        self.torrents = torrents
            .into_iter()
            .map(|(id, patch)| {
                let torrent = Torrent::from_patch(id.clone(), patch);
                (id, torrent)
            })
            .collect();
        self.categories = categories
            .into_iter()
            .map(|(name, patch)| {
                let category = Category::from_patch(name.clone(), patch);
                (name, category)
            })
            .collect();
        let mut next_tags = tags.unwrap_or_default();
        next_tags.extend(tags_added);
        self.tags = next_tags;
        self.trackers = trackers
            .into_iter()
            .filter(|(_, ids)| !ids.is_empty())
            .collect();

        let previous_interval = self.server_state.refresh_interval_ms;
        let mut server = ServerState::default();
        if let Some(patch) = server_state {
            server.apply(patch);
        }
        self.server_state = server;
        let refresh_hint_ms = (self.server_state.refresh_interval_ms != previous_interval)
            .then_some(self.server_state.refresh_interval_ms)
            .filter(|ms| *ms > 0);

        self.synced = true;
        self.cursor = cursor;

        MergeReport {
            cursor,
            full_update: true,
            filter_relevant: true,
            changed: true,
            refresh_hint_ms,
        }
    }

    fn fold(&mut self, snapshot: Snapshot) -> MergeReport {
        let Snapshot {
            cursor,
            torrents,
            torrents_removed,
            categories,
            categories_removed,
            tags,
            tags_added,
            tags_removed,
            trackers,
            trackers_removed,
            server_state,
            ..
        } = snapshot;

        let mut report = MergeReport {
            cursor,
            ..MergeReport::default()
        };

        let torrent_effect = self.fold_torrents(torrents, &torrents_removed);
        report.filter_relevant |= torrent_effect.filter_relevant;
        report.changed |= torrent_effect.changed;

        let category_effect = self.fold_categories(categories, &categories_removed);
        report.filter_relevant |= category_effect.filter_relevant;
        report.changed |= category_effect.changed;

        report.filter_relevant |= self.fold_tags(tags, tags_added, &tags_removed);
        report.filter_relevant |= self.fold_trackers(trackers, &trackers_removed);

        if let Some(patch) = server_state {
            let (effect, hint) = self.fold_server(patch);
            report.filter_relevant |= effect.filter_relevant;
            report.changed |= effect.changed;
            report.refresh_hint_ms = hint;
        }

        report.changed |= report.filter_relevant;
        self.cursor = cursor;
        report
    }

    fn fold_torrents(
        &mut self,
        upserts: HashMap<TorrentId, TorrentPatch>,
        removed: &HashSet<TorrentId>,
    ) -> FoldEffect {
        let mut effect = FoldEffect::default();

        for id in removed {
            if self.torrents.remove(id).is_some() {
                effect.filter_relevant = true;
            }
            for ids in self.trackers.values_mut() {
                ids.remove(id);
            }
        }
        self.trackers.retain(|_, ids| !ids.is_empty());

        for (id, patch) in upserts {
            if removed.contains(&id) {
                continue;
            }
            if let Some(existing) = self.torrents.get_mut(&id) {
                let patch_effect = existing.apply(patch);
                effect.filter_relevant |= patch_effect.filter_relevant;
                effect.changed |= patch_effect.changed();
            } else {
                let torrent = Torrent::from_patch(id.clone(), patch);
                self.torrents.insert(id, torrent);
                effect.filter_relevant = true;
            }
        }

        effect
    }

    fn fold_categories(
        &mut self,
        upserts: HashMap<String, CategoryPatch>,
        removed: &HashSet<String>,
    ) -> FoldEffect {
        let mut effect = FoldEffect::default();

        for name in removed {
            if self.categories.remove(name).is_some() {
                effect.filter_relevant = true;
            }
        }

        for (name, patch) in upserts {
            if removed.contains(&name) {
                continue;
            }
            if let Some(existing) = self.categories.get_mut(&name) {
                effect.changed |= existing.apply(patch);
            } else {
                let category = Category::from_patch(name.clone(), patch);
                self.categories.insert(name, category);
                effect.filter_relevant = true;
            }
        }

        effect
    }

    fn fold_tags(
        &mut self,
        replacement: Option<BTreeSet<String>>,
        added: BTreeSet<String>,
        removed: &HashSet<String>,
    ) -> bool {
        let mut next = replacement.unwrap_or_else(|| self.tags.clone());
        next.extend(added);
        next.retain(|tag| !removed.contains(tag));
        if next == self.tags {
            return false;
        }
        self.tags = next;
        true
    }

    fn fold_trackers(
        &mut self,
        upserts: HashMap<String, BTreeSet<TorrentId>>,
        removed: &HashSet<String>,
    ) -> bool {
        let mut changed = false;

        for url in removed {
            changed |= self.trackers.remove(url).is_some();
        }

        for (url, ids) in upserts {
            if removed.contains(&url) {
                continue;
            }
            if ids.is_empty() {
                changed |= self.trackers.remove(&url).is_some();
            } else if self.trackers.get(&url) != Some(&ids) {
                self.trackers.insert(url, ids);
                changed = true;
            }
        }

        changed
    }

    fn fold_server(&mut self, patch: ServerStatePatch) -> (FoldEffect, Option<u64>) {
        let effect = self.server_state.apply(patch);
        let hint = effect
            .refresh_interval_changed
            .then_some(self.server_state.refresh_interval_ms)
            .filter(|ms| *ms > 0);
        (
            FoldEffect {
                filter_relevant: effect.subcategories_changed,
                changed: effect.changed,
            },
            hint,
        )
    }

    /// Record the first unrecoverable transport failure. Returns `true` only on the first call.
    pub const fn mark_lost_connection(&mut self) -> bool {
        if self.lost_connection {
            return false;
        }
        self.lost_connection = true;
        true
    }

    /// Whether the session lost its connection to the engine.
    #[must_use]
    pub const fn lost_connection(&self) -> bool {
        self.lost_connection
    }

    /// Whether a full snapshot has been applied.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.synced
    }

    /// Cursor for the next poll.
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// All torrents keyed by id.
    #[must_use]
    pub const fn torrents(&self) -> &HashMap<TorrentId, Torrent> {
        &self.torrents
    }

    /// Look up a torrent by id.
    #[must_use]
    pub fn torrent(&self, id: &str) -> Option<&Torrent> {
        self.torrents.get(id)
    }

    /// Categories keyed by name.
    #[must_use]
    pub const fn categories(&self) -> &BTreeMap<String, Category> {
        &self.categories
    }

    /// Known tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Tracker url to the torrents announcing to it.
    #[must_use]
    pub const fn trackers(&self) -> &BTreeMap<String, BTreeSet<TorrentId>> {
        &self.trackers
    }

    /// Whether `id` announces to `url`, via the tracker map or its current tracker.
    #[must_use]
    pub fn announces_to(&self, torrent: &Torrent, url: &str) -> bool {
        torrent.tracker == url
            || self
                .trackers
                .get(url)
                .is_some_and(|ids| ids.contains(&torrent.hash))
    }

    /// Whether the torrent has no tracker at all.
    #[must_use]
    pub fn is_trackerless(&self, torrent: &Torrent) -> bool {
        torrent.tracker.is_empty()
            && !self
                .trackers
                .values()
                .any(|ids| ids.contains(&torrent.hash))
    }

    /// Latest server/session record.
    #[must_use]
    pub const fn server_state(&self) -> &ServerState {
        &self.server_state
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct FoldEffect {
    filter_relevant: bool,
    changed: bool,
}
