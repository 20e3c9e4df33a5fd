//! Lazily recomputed, filtered and sorted projection of the canonical state.
//!
//! # Design
//! - The cache stores ordered ids, not records; reads resolve them against the live state.
//! - Only filter-relevant merges and criteria changes mark the cache dirty.
//! - A volatile sort column also dirties the cache on value-only merges so order stays correct.
//! - Recomputation builds a fresh list and swaps it in; no partial view is observable.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::SyncError;
use crate::filter::FilterCriteria;
use crate::model::{Torrent, TorrentId};
use crate::state::SyncState;

/// Column a view is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortColumn {
    /// Display name.
    Name,
    /// Lifecycle state.
    State,
    /// Category.
    Category,
    /// Current tracker.
    Tracker,
    /// Save path.
    SavePath,
    /// Time added.
    #[default]
    AddedOn,
    /// Completion ratio.
    Progress,
    /// Download rate.
    DownloadSpeed,
    /// Upload rate.
    UploadSpeed,
    /// Estimated time remaining.
    Eta,
    /// Share ratio.
    Ratio,
    /// Payload size.
    Size,
    /// Bytes downloaded.
    Downloaded,
    /// Bytes uploaded.
    Uploaded,
    /// Time completed.
    CompletedOn,
    /// Queue position.
    Priority,
}

impl SortColumn {
    const ALL: [Self; 16] = [
        Self::Name,
        Self::State,
        Self::Category,
        Self::Tracker,
        Self::SavePath,
        Self::AddedOn,
        Self::Progress,
        Self::DownloadSpeed,
        Self::UploadSpeed,
        Self::Eta,
        Self::Ratio,
        Self::Size,
        Self::Downloaded,
        Self::Uploaded,
        Self::CompletedOn,
        Self::Priority,
    ];

    /// Stable identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::State => "state",
            Self::Category => "category",
            Self::Tracker => "tracker",
            Self::SavePath => "save_path",
            Self::AddedOn => "added_on",
            Self::Progress => "progress",
            Self::DownloadSpeed => "dlspeed",
            Self::UploadSpeed => "upspeed",
            Self::Eta => "eta",
            Self::Ratio => "ratio",
            Self::Size => "size",
            Self::Downloaded => "downloaded",
            Self::Uploaded => "uploaded",
            Self::CompletedOn => "completion_on",
            Self::Priority => "priority",
        }
    }

    /// Whether the column reads a field that changes without a filter-relevant merge.
    #[must_use]
    pub const fn is_volatile(self) -> bool {
        !matches!(
            self,
            Self::Name | Self::State | Self::Category | Self::Tracker | Self::SavePath | Self::AddedOn
        )
    }

    fn compare(self, a: &Torrent, b: &Torrent) -> Ordering {
        match self {
            Self::Name => cmp_ignore_case(&a.name, &b.name),
            Self::State => a.state.as_str().cmp(b.state.as_str()),
            Self::Category => cmp_ignore_case(&a.category, &b.category),
            Self::Tracker => a.tracker.cmp(&b.tracker),
            Self::SavePath => a.save_path.cmp(&b.save_path),
            Self::AddedOn => a.added_on.cmp(&b.added_on),
            Self::Progress => a.progress.total_cmp(&b.progress),
            Self::DownloadSpeed => a.download_bps.cmp(&b.download_bps),
            Self::UploadSpeed => a.upload_bps.cmp(&b.upload_bps),
            Self::Eta => a.eta_secs.cmp(&b.eta_secs),
            Self::Ratio => a.ratio.total_cmp(&b.ratio),
            Self::Size => a.size_bytes.cmp(&b.size_bytes),
            Self::Downloaded => a.downloaded_bytes.cmp(&b.downloaded_bytes),
            Self::Uploaded => a.uploaded_bytes.cmp(&b.uploaded_bytes),
            Self::CompletedOn => a.completion_on.cmp(&b.completion_on),
            Self::Priority => a.priority.cmp(&b.priority),
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortColumn {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|column| column.as_str() == normalized)
            .ok_or_else(|| SyncError::UnknownSelector {
                kind: "sort",
                value: value.to_string(),
            })
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Active ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    /// Primary column.
    pub column: SortColumn,
    /// Reverse the primary column.
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            column: SortColumn::AddedOn,
            descending: true,
        }
    }
}

impl SortSpec {
    /// Total order: the primary column, then name ascending, then hash.
    #[must_use]
    pub fn compare(&self, a: &Torrent, b: &Torrent) -> Ordering {
        let primary = self.column.compare(a, b);
        let primary = if self.descending {
            primary.reverse()
        } else {
            primary
        };
        primary
            .then_with(|| cmp_ignore_case(&a.name, &b.name))
            .then_with(|| a.hash.cmp(&b.hash))
    }
}

/// Derived view of the canonical state under the current criteria and sort.
#[derive(Debug, Clone)]
pub struct ViewCache {
    criteria: FilterCriteria,
    sort: SortSpec,
    dirty: bool,
    version: u64,
    ids: Vec<TorrentId>,
    recomputations: u64,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(FilterCriteria::default(), SortSpec::default())
    }
}

impl ViewCache {
    /// New cache; the first read always recomputes.
    #[must_use]
    pub const fn new(criteria: FilterCriteria, sort: SortSpec) -> Self {
        Self {
            criteria,
            sort,
            dirty: true,
            version: 0,
            ids: Vec::new(),
            recomputations: 0,
        }
    }

    /// Record an accepted merge.
    pub const fn note_merge(&mut self, filter_relevant: bool, changed: bool) {
        self.version += 1;
        if filter_relevant || (changed && self.sort.column.is_volatile()) {
            self.dirty = true;
        }
    }

    /// Replace the criteria. Returns `false` when nothing changed.
    pub fn set_criteria(&mut self, criteria: FilterCriteria) -> bool {
        if self.criteria == criteria {
            return false;
        }
        self.criteria = criteria;
        self.invalidate();
        true
    }

    /// Replace the ordering. Returns `false` when nothing changed.
    pub fn set_sort(&mut self, sort: SortSpec) -> bool {
        if self.sort == sort {
            return false;
        }
        self.sort = sort;
        self.invalidate();
        true
    }

    /// Follow the server's nested-category flag. Returns `true` when it flipped.
    pub const fn mirror_subcategories(&mut self, enabled: bool) -> bool {
        if self.criteria.use_subcategories == enabled {
            return false;
        }
        self.criteria.use_subcategories = enabled;
        self.dirty = true;
        true
    }

    /// Force recomputation on the next read.
    pub const fn invalidate(&mut self) {
        self.dirty = true;
        self.version += 1;
    }

    /// Read the view, recomputing first when dirty. An absent state yields an empty list.
    pub fn view<'s>(&mut self, state: Option<&'s SyncState>) -> Vec<&'s Torrent> {
        let Some(state) = state else {
            return Vec::new();
        };

        if !self.dirty {
            return self.ids.iter().filter_map(|id| state.torrent(id)).collect();
        }

        let mut items: Vec<&Torrent> = state
            .torrents()
            .values()
            .filter(|torrent| self.criteria.matches(state, torrent))
            .collect();
        items.sort_by(|a, b| self.sort.compare(a, b));

        self.ids = items.iter().map(|torrent| torrent.hash.clone()).collect();
        self.dirty = false;
        self.recomputations += 1;
        items
    }

    /// Active criteria.
    #[must_use]
    pub const fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    /// Active ordering.
    #[must_use]
    pub const fn sort(&self) -> SortSpec {
        self.sort
    }

    /// Whether the next read recomputes.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Change counter bumped by every accepted merge or criteria change.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// How many times the view has been rebuilt.
    #[must_use]
    pub const fn recomputations(&self) -> u64 {
        self.recomputations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::CategoryFilter;
    use crate::model::{Snapshot, TorrentPatch};

    fn patch(name: &str, added_on: i64, dl: u64) -> TorrentPatch {
        TorrentPatch {
            name: Some(name.to_string()),
            added_on: Some(added_on),
            download_bps: Some(dl),
            ..TorrentPatch::default()
        }
    }

    fn names(items: &[&Torrent]) -> Vec<String> {
        items.iter().map(|t| t.name.clone()).collect()
    }

    fn seeded() -> SyncState {
        let full = Snapshot::full(1)
            .with_torrent("a", patch("alpha", 10, 5))
            .with_torrent("b", patch("Bravo", 30, 1))
            .with_torrent("c", patch("charlie", 20, 9))
            .with_torrent("d", patch("delta", 20, 0));
        let (state, _) = SyncState::merge(None, full).unwrap();
        state
    }

    #[test]
    fn default_sort_is_newest_first_with_name_tie_break() {
        let state = seeded();
        let mut cache = ViewCache::default();
        assert_eq!(
            names(&cache.view(Some(&state))),
            vec!["Bravo", "charlie", "delta", "alpha"]
        );
    }

    #[test]
    fn absent_state_yields_empty_view() {
        let mut cache = ViewCache::default();
        assert!(cache.view(None).is_empty());
        assert_eq!(cache.recomputations(), 0);
    }

    #[test]
    fn clean_reads_do_not_recompute_but_see_fresh_values() {
        let mut state = seeded();
        let mut cache = ViewCache::default();
        let _ = cache.view(Some(&state));

        let report = state
            .apply(Snapshot::delta(2).with_torrent("a", patch("alpha", 10, 999)))
            .unwrap();
        cache.note_merge(report.filter_relevant, report.changed);

        let view = cache.view(Some(&state));
        assert_eq!(cache.recomputations(), 1);
        assert_eq!(cache.version(), 1);
        let alpha = view.iter().find(|t| t.hash == "a").unwrap();
        assert_eq!(alpha.download_bps, 999);
    }

    #[test]
    fn volatile_sort_recomputes_on_value_only_merge() {
        let mut state = seeded();
        let mut cache = ViewCache::default();
        cache.set_sort(SortSpec {
            column: SortColumn::DownloadSpeed,
            descending: true,
        });
        assert_eq!(
            names(&cache.view(Some(&state))),
            vec!["charlie", "alpha", "Bravo", "delta"]
        );

        let report = state
            .apply(Snapshot::delta(2).with_torrent("d", patch("delta", 20, 50)))
            .unwrap();
        assert!(!report.filter_relevant);
        cache.note_merge(report.filter_relevant, report.changed);
        assert!(cache.is_dirty());
        assert_eq!(names(&cache.view(Some(&state)))[0], "delta");
        assert_eq!(cache.recomputations(), 2);
    }

    #[test]
    fn criteria_changes_dirty_the_cache_once() {
        let state = seeded();
        let mut cache = ViewCache::default();
        let _ = cache.view(Some(&state));
        let criteria = FilterCriteria {
            category: CategoryFilter::Uncategorized,
            ..FilterCriteria::default()
        };
        assert!(cache.set_criteria(criteria.clone()));
        assert!(!cache.set_criteria(criteria));
        assert_eq!(cache.version(), 1);
        assert_eq!(cache.view(Some(&state)).len(), 4);
        assert_eq!(cache.recomputations(), 2);
    }

    #[test]
    fn removed_torrents_vanish_from_a_clean_view() {
        let mut state = seeded();
        let mut cache = ViewCache::default();
        let _ = cache.view(Some(&state));
        state.apply(Snapshot::delta(2).without_torrent("b")).unwrap();
        // Not recorded through note_merge: ids resolve against live records anyway.
        assert_eq!(cache.view(Some(&state)).len(), 3);
    }

    #[test]
    fn sort_columns_parse_and_classify() {
        assert_eq!("dlspeed".parse::<SortColumn>().unwrap(), SortColumn::DownloadSpeed);
        assert!(SortColumn::Ratio.is_volatile());
        assert!(!SortColumn::Name.is_volatile());
    }
}
