//! Per-session context that owns the canonical state and its view.
//!
//! # Design
//! - One owner: the session holds the state and the cache, nothing is ambient or global.
//! - Every accepted merge or selection change yields a [`ChangeEvent`] for consumers.
//! - The server's nested-category flag is mirrored into the criteria on merge.

use crate::error::SyncResult;
use crate::filter::{FilterCriteria, SidebarCounts};
use crate::model::{Cursor, Snapshot, Torrent};
use crate::state::{MergeReport, SyncState};
use crate::view::{SortSpec, ViewCache};

/// Notification emitted after an accepted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    /// View version after the change.
    pub version: u64,
    /// What happened.
    pub kind: ChangeKind,
}

/// Kind of change carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A snapshot was merged.
    Merged {
        /// Cursor the state advanced to.
        cursor: Cursor,
        /// Whether it was a full replacement.
        full_update: bool,
        /// Whether the filtered view was invalidated.
        filter_relevant: bool,
    },
    /// Filter criteria changed.
    CriteriaChanged,
    /// Ordering changed.
    SortChanged,
    /// The connection to the engine was lost for good.
    ConnectionLost,
}

/// Result of applying one snapshot to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merge engine report.
    pub report: MergeReport,
    /// Event to publish.
    pub event: ChangeEvent,
}

/// Canonical state plus its derived view for one authenticated session.
#[derive(Debug, Clone, Default)]
pub struct SyncSession {
    state: SyncState,
    cache: ViewCache,
}

impl SyncSession {
    /// Fresh session with the given selection.
    #[must_use]
    pub fn new(criteria: FilterCriteria, sort: SortSpec) -> Self {
        Self {
            state: SyncState::default(),
            cache: ViewCache::new(criteria, sort),
        }
    }

    /// Merge a snapshot and notify the view.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::SyncError::LeadingDelta`]; the session is unchanged in that case.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> SyncResult<MergeOutcome> {
        let report = self.state.apply(snapshot)?;
        self.cache.note_merge(report.filter_relevant, report.changed);
        self.cache
            .mirror_subcategories(self.state.server_state().use_subcategories);

        Ok(MergeOutcome {
            report,
            event: ChangeEvent {
                version: self.cache.version(),
                kind: ChangeKind::Merged {
                    cursor: report.cursor,
                    full_update: report.full_update,
                    filter_relevant: report.filter_relevant,
                },
            },
        })
    }

    /// Replace the filter criteria. Returns an event only when something changed.
    ///
    /// The nested-category flag always follows the server once synced.
    pub fn set_criteria(&mut self, mut criteria: FilterCriteria) -> Option<ChangeEvent> {
        if self.state.is_synced() {
            criteria.use_subcategories = self.state.server_state().use_subcategories;
        }
        self.cache.set_criteria(criteria).then(|| ChangeEvent {
            version: self.cache.version(),
            kind: ChangeKind::CriteriaChanged,
        })
    }

    /// Replace the ordering. Returns an event only when something changed.
    pub fn set_sort(&mut self, sort: SortSpec) -> Option<ChangeEvent> {
        self.cache.set_sort(sort).then(|| ChangeEvent {
            version: self.cache.version(),
            kind: ChangeKind::SortChanged,
        })
    }

    /// Filtered, sorted torrents; empty until the first full snapshot.
    pub fn view(&mut self) -> Vec<&Torrent> {
        let state = self.state.is_synced().then_some(&self.state);
        self.cache.view(state)
    }

    /// Sidebar counts under the current nested-category setting.
    #[must_use]
    pub fn counts(&self) -> SidebarCounts {
        SidebarCounts::from_state(&self.state, self.cache.criteria().use_subcategories)
    }

    /// Canonical state, once a full snapshot has been merged.
    #[must_use]
    pub fn state(&self) -> Option<&SyncState> {
        self.state.is_synced().then_some(&self.state)
    }

    /// Cursor for the next poll.
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.state.cursor()
    }

    /// Current view version.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.cache.version()
    }

    /// Active criteria.
    #[must_use]
    pub const fn criteria(&self) -> &FilterCriteria {
        self.cache.criteria()
    }

    /// Active ordering.
    #[must_use]
    pub const fn sort(&self) -> SortSpec {
        self.cache.sort()
    }

    /// View recomputation count.
    #[must_use]
    pub const fn recomputations(&self) -> u64 {
        self.cache.recomputations()
    }

    /// Flag the session as disconnected. Returns an event only on the first call.
    pub fn mark_lost_connection(&mut self) -> Option<ChangeEvent> {
        self.state.mark_lost_connection().then(|| {
            self.cache.invalidate();
            ChangeEvent {
                version: self.cache.version(),
                kind: ChangeKind::ConnectionLost,
            }
        })
    }

    /// Whether the session lost its connection.
    #[must_use]
    pub const fn lost_connection(&self) -> bool {
        self.state.lost_connection()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CategoryFilter;
    use crate::model::{ServerStatePatch, TorrentPatch};

    fn in_category(name: &str, category: &str) -> TorrentPatch {
        TorrentPatch {
            name: Some(name.to_string()),
            category: Some(category.to_string()),
            ..TorrentPatch::default()
        }
    }

    fn hashes(session: &mut SyncSession) -> Vec<String> {
        session.view().iter().map(|t| t.hash.clone()).collect()
    }

    #[test]
    fn movies_view_survives_speed_ticks_and_follows_category_moves() {
        let mut session = SyncSession::default();
        assert!(session.view().is_empty());

        session
            .apply_snapshot(
                Snapshot::full(1)
                    .with_torrent("A", in_category("a", "movies"))
                    .with_torrent("B", in_category("b", "tv")),
            )
            .unwrap();
        session.set_criteria(FilterCriteria {
            category: CategoryFilter::Named("movies".into()),
            ..FilterCriteria::default()
        });
        assert_eq!(hashes(&mut session), vec!["A"]);
        let rebuilt = session.recomputations();

        let tick = session
            .apply_snapshot(Snapshot::delta(2).with_torrent(
                "A",
                TorrentPatch {
                    download_bps: Some(1_000),
                    ..TorrentPatch::default()
                },
            ))
            .unwrap();
        assert!(!tick.report.filter_relevant);
        assert_eq!(hashes(&mut session), vec!["A"]);
        assert_eq!(session.recomputations(), rebuilt);

        session
            .apply_snapshot(Snapshot::delta(3).with_torrent(
                "A",
                TorrentPatch {
                    category: Some("tv".into()),
                    ..TorrentPatch::default()
                },
            ))
            .unwrap();
        assert!(hashes(&mut session).is_empty());
        assert_eq!(session.cursor(), 3);
    }

    #[test]
    fn versions_increase_for_every_accepted_change() {
        let mut session = SyncSession::default();
        let first = session.apply_snapshot(Snapshot::full(1)).unwrap();
        let second = session.apply_snapshot(Snapshot::delta(2)).unwrap();
        assert!(second.event.version > first.event.version);

        let sorted = session.set_sort(SortSpec {
            descending: false,
            ..SortSpec::default()
        });
        assert_eq!(sorted.map(|e| e.kind), Some(ChangeKind::SortChanged));
        assert!(session.set_sort(session.sort()).is_none());
    }

    #[test]
    fn leading_delta_leaves_session_unsynced() {
        let mut session = SyncSession::default();
        assert!(session.apply_snapshot(Snapshot::delta(9)).is_err());
        assert!(session.state().is_none());
        assert_eq!(session.cursor(), 0);
        assert_eq!(session.version(), 0);
    }

    #[test]
    fn server_subcategory_flag_is_mirrored() {
        let mut session = SyncSession::default();
        session
            .apply_snapshot(Snapshot::full(1).with_server_state(ServerStatePatch {
                use_subcategories: Some(true),
                ..ServerStatePatch::default()
            }))
            .unwrap();
        assert!(session.criteria().use_subcategories);

        session.set_criteria(FilterCriteria::default());
        assert!(session.criteria().use_subcategories);
    }

    #[test]
    fn connection_loss_is_reported_once() {
        let mut session = SyncSession::default();
        let event = session.mark_lost_connection().unwrap();
        assert_eq!(event.kind, ChangeKind::ConnectionLost);
        assert!(session.mark_lost_connection().is_none());
        assert!(session.lost_connection());
    }
}
