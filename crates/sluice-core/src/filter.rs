//! Filter criteria applied when deriving a view from the canonical state.
//!
//! # Design
//! - Every predicate is a pure function of the state and one torrent.
//! - Search is case-insensitive; regex mode fails closed when the pattern does not compile.
//! - Status groups are derived from the torrent state alone.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};

use crate::error::{SyncError, SyncResult};
use crate::model::Torrent;
use crate::state::SyncState;

/// Category selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    /// No category restriction.
    #[default]
    Any,
    /// Only torrents without a category.
    Uncategorized,
    /// Torrents in the named category (and its children when subcategories are on).
    Named(String),
}

impl CategoryFilter {
    fn matches(&self, category: &str, use_subcategories: bool) -> bool {
        match self {
            Self::Any => true,
            Self::Uncategorized => category.is_empty(),
            Self::Named(name) => {
                category == name
                    || (use_subcategories
                        && category
                            .strip_prefix(name.as_str())
                            .is_some_and(|rest| rest.starts_with('/')))
            }
        }
    }
}

/// Tag selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TagFilter {
    /// No tag restriction.
    #[default]
    Any,
    /// Only torrents without tags.
    Untagged,
    /// Torrents carrying the named tag.
    Named(String),
}

/// Tracker selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrackerFilter {
    /// No tracker restriction.
    #[default]
    Any,
    /// Only torrents with no tracker.
    Trackerless,
    /// Torrents announcing to the given url.
    Named(String),
}

/// Status group selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusFilter {
    /// Every torrent.
    #[default]
    All,
    /// Incomplete torrents.
    Downloading,
    /// Complete torrents eligible to seed.
    Seeding,
    /// Complete torrents, including stopped ones.
    Completed,
    /// Torrents not stopped by the user.
    Running,
    /// Torrents stopped by the user.
    Stopped,
    /// Torrents exchanging data.
    Active,
    /// Torrents not exchanging data.
    Inactive,
    /// Stalled in either direction.
    Stalled,
    /// Seeding without peers.
    StalledUploading,
    /// Downloading without peers.
    StalledDownloading,
    /// Hash-checking.
    Checking,
    /// Relocating payload.
    Moving,
    /// Errored or missing files.
    Errored,
}

impl StatusFilter {
    /// Every group in sidebar order.
    pub const ALL: [Self; 14] = [
        Self::All,
        Self::Downloading,
        Self::Seeding,
        Self::Completed,
        Self::Running,
        Self::Stopped,
        Self::Active,
        Self::Inactive,
        Self::Stalled,
        Self::StalledUploading,
        Self::StalledDownloading,
        Self::Checking,
        Self::Moving,
        Self::Errored,
    ];

    /// Stable identifier used in preferences and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Downloading => "downloading",
            Self::Seeding => "seeding",
            Self::Completed => "completed",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Stalled => "stalled",
            Self::StalledUploading => "stalled_uploading",
            Self::StalledDownloading => "stalled_downloading",
            Self::Checking => "checking",
            Self::Moving => "moving",
            Self::Errored => "errored",
        }
    }

    /// Whether a torrent belongs to this group.
    #[must_use]
    pub fn matches(self, torrent: &Torrent) -> bool {
        use crate::model::TorrentState;

        let state = torrent.state;
        match self {
            Self::All => true,
            Self::Downloading => state.is_downloading(),
            Self::Seeding => state.is_uploading(),
            Self::Completed => state.is_completed(),
            Self::Running => !state.is_stopped(),
            Self::Stopped => state.is_stopped(),
            Self::Active => state.is_active(),
            Self::Inactive => !state.is_active(),
            Self::Stalled => state.is_stalled(),
            Self::StalledUploading => state == TorrentState::StalledUploading,
            Self::StalledDownloading => state == TorrentState::StalledDownloading,
            Self::Checking => state.is_checking(),
            Self::Moving => state == TorrentState::Moving,
            Self::Errored => state.is_errored(),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| SyncError::UnknownSelector {
                kind: "status",
                value: value.to_string(),
            })
    }
}

/// Field a free-text search is matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchField {
    /// Display name.
    #[default]
    Name,
    /// Info-hash.
    Hash,
    /// Save path.
    SavePath,
    /// Category name.
    Category,
    /// Any tag.
    Tags,
    /// Current tracker.
    Tracker,
}

impl SearchField {
    const ALL: [Self; 6] = [
        Self::Name,
        Self::Hash,
        Self::SavePath,
        Self::Category,
        Self::Tags,
        Self::Tracker,
    ];

    /// Stable identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Hash => "hash",
            Self::SavePath => "save_path",
            Self::Category => "category",
            Self::Tags => "tags",
            Self::Tracker => "tracker",
        }
    }
}

impl FromStr for SearchField {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == normalized)
            .ok_or_else(|| SyncError::UnknownSelector {
                kind: "search field",
                value: value.to_string(),
            })
    }
}

/// Free-text search with optional regular-expression mode.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    text: String,
    field: SearchField,
    regex: bool,
    needle: String,
    compiled: Option<Regex>,
    error: Option<regex::Error>,
}

impl SearchFilter {
    /// Build a search. In regex mode the pattern is compiled once, here.
    #[must_use]
    pub fn new(text: impl Into<String>, field: SearchField, regex: bool) -> Self {
        let text = text.into();
        let mut filter = Self {
            needle: text.to_lowercase(),
            text,
            field,
            regex,
            compiled: None,
            error: None,
        };
        if regex && !filter.text.is_empty() {
            match RegexBuilder::new(&filter.text)
                .case_insensitive(true)
                .build()
            {
                Ok(compiled) => filter.compiled = Some(compiled),
                Err(err) => filter.error = Some(err),
            }
        }
        filter
    }

    /// Raw search text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Field searched.
    #[must_use]
    pub const fn field(&self) -> SearchField {
        self.field
    }

    /// Whether regex mode is on.
    #[must_use]
    pub const fn is_regex(&self) -> bool {
        self.regex
    }

    /// False when regex mode is on and the pattern failed to compile.
    #[must_use]
    pub const fn regex_valid(&self) -> bool {
        self.error.is_none()
    }

    /// Surface a compile failure to callers that want to report it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidPattern`] when regex mode is on and the pattern is invalid.
    pub fn check(&self) -> SyncResult<()> {
        match &self.error {
            Some(err) => Err(SyncError::InvalidPattern {
                pattern: self.text.clone(),
                source: err.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Whether the torrent matches. An empty search matches everything.
    #[must_use]
    pub fn matches(&self, torrent: &Torrent) -> bool {
        if self.text.is_empty() {
            return true;
        }
        if self.regex {
            let Some(compiled) = &self.compiled else {
                return false;
            };
            return match self.field {
                SearchField::Tags => torrent.tags.iter().any(|tag| compiled.is_match(tag)),
                field => compiled.is_match(haystack(torrent, field)),
            };
        }
        match self.field {
            SearchField::Tags => torrent
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&self.needle)),
            field => haystack(torrent, field)
                .to_lowercase()
                .contains(&self.needle),
        }
    }
}

impl PartialEq for SearchFilter {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.field == other.field && self.regex == other.regex
    }
}

fn haystack(torrent: &Torrent, field: SearchField) -> &str {
    match field {
        SearchField::Name | SearchField::Tags => &torrent.name,
        SearchField::Hash => &torrent.hash,
        SearchField::SavePath => &torrent.save_path,
        SearchField::Category => &torrent.category,
        SearchField::Tracker => &torrent.tracker,
    }
}

/// Active selection used to derive a view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    /// Category selector.
    pub category: CategoryFilter,
    /// Status group.
    pub status: StatusFilter,
    /// Tag selector.
    pub tag: TagFilter,
    /// Tracker selector.
    pub tracker: TrackerFilter,
    /// Treat `a/b` categories as children of `a`.
    pub use_subcategories: bool,
    /// Free-text search.
    pub search: SearchFilter,
}

impl FilterCriteria {
    /// Whether `torrent` satisfies every active predicate.
    #[must_use]
    pub fn matches(&self, state: &SyncState, torrent: &Torrent) -> bool {
        self.status.matches(torrent)
            && self
                .category
                .matches(&torrent.category, self.use_subcategories)
            && match &self.tag {
                TagFilter::Any => true,
                TagFilter::Untagged => torrent.tags.is_empty(),
                TagFilter::Named(tag) => torrent.tags.contains(tag),
            }
            && match &self.tracker {
                TrackerFilter::Any => true,
                TrackerFilter::Trackerless => state.is_trackerless(torrent),
                TrackerFilter::Named(url) => state.announces_to(torrent, url),
            }
            && self.search.matches(torrent)
    }
}

/// Per-group torrent counts for a sidebar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidebarCounts {
    /// Torrents in each status group.
    pub statuses: BTreeMap<StatusFilter, usize>,
    /// Torrents per category, including known empty categories.
    pub categories: BTreeMap<String, usize>,
    /// Torrents without a category.
    pub uncategorized: usize,
    /// Torrents per tag, including known unused tags.
    pub tags: BTreeMap<String, usize>,
    /// Torrents without tags.
    pub untagged: usize,
    /// Torrents per tracker url.
    pub trackers: BTreeMap<String, usize>,
    /// Torrents with no tracker.
    pub trackerless: usize,
}

impl SidebarCounts {
    /// Tally the state. With subcategories on, a torrent in `a/b` also counts toward `a`.
    #[must_use]
    pub fn from_state(state: &SyncState, use_subcategories: bool) -> Self {
        let mut counts = Self {
            statuses: StatusFilter::ALL.into_iter().map(|s| (s, 0)).collect(),
            categories: state.categories().keys().map(|k| (k.clone(), 0)).collect(),
            tags: state.tags().iter().map(|t| (t.clone(), 0)).collect(),
            trackers: state.trackers().keys().map(|u| (u.clone(), 0)).collect(),
            ..Self::default()
        };

        for torrent in state.torrents().values() {
            for (status, count) in &mut counts.statuses {
                if status.matches(torrent) {
                    *count += 1;
                }
            }

            if torrent.category.is_empty() {
                counts.uncategorized += 1;
            } else {
                *counts
                    .categories
                    .entry(torrent.category.clone())
                    .or_default() += 1;
                if use_subcategories {
                    for (idx, _) in torrent.category.match_indices('/') {
                        *counts
                            .categories
                            .entry(torrent.category[..idx].to_string())
                            .or_default() += 1;
                    }
                }
            }

            if torrent.tags.is_empty() {
                counts.untagged += 1;
            }
            for tag in &torrent.tags {
                *counts.tags.entry(tag.clone()).or_default() += 1;
            }

            if state.is_trackerless(torrent) {
                counts.trackerless += 1;
            }
        }

        for (url, count) in &mut counts.trackers {
            *count = state
                .torrents()
                .values()
                .filter(|torrent| state.announces_to(torrent, url))
                .count();
        }
        for torrent in state.torrents().values() {
            if !torrent.tracker.is_empty() && !state.trackers().contains_key(&torrent.tracker) {
                *counts.trackers.entry(torrent.tracker.clone()).or_default() += 1;
            }
        }

        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Snapshot, TorrentPatch, TorrentState};

    fn patch(name: &str, category: &str, state: TorrentState, tags: &[&str]) -> TorrentPatch {
        TorrentPatch {
            name: Some(name.to_string()),
            category: Some(category.to_string()),
            state: Some(state),
            tags: Some(tags.iter().map(ToString::to_string).collect()),
            ..TorrentPatch::default()
        }
    }

    fn state() -> SyncState {
        let mut full = Snapshot::full(1)
            .with_torrent("a", patch("Ubuntu ISO", "linux", TorrentState::Downloading, &["hd"]))
            .with_torrent("b", patch("Debian", "linux/stable", TorrentState::StalledUploading, &[]))
            .with_torrent("c", patch("Film", "", TorrentState::PausedDownloading, &["hd", "x"]));
        full.trackers
            .insert("udp://t1".into(), ["a".to_string()].into_iter().collect());
        let (state, _) = SyncState::merge(None, full).unwrap();
        state
    }

    fn matching(state: &SyncState, criteria: &FilterCriteria) -> Vec<String> {
        let mut ids: Vec<String> = state
            .torrents()
            .values()
            .filter(|t| criteria.matches(state, t))
            .map(|t| t.hash.clone())
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn category_prefix_only_with_subcategories() {
        let state = state();
        let mut criteria = FilterCriteria {
            category: CategoryFilter::Named("linux".into()),
            ..FilterCriteria::default()
        };
        assert_eq!(matching(&state, &criteria), vec!["a"]);
        criteria.use_subcategories = true;
        assert_eq!(matching(&state, &criteria), vec!["a", "b"]);
        criteria.category = CategoryFilter::Uncategorized;
        assert_eq!(matching(&state, &criteria), vec!["c"]);
    }

    #[test]
    fn status_tag_and_tracker_selectors() {
        let state = state();
        let criteria = FilterCriteria {
            status: StatusFilter::Stopped,
            ..FilterCriteria::default()
        };
        assert_eq!(matching(&state, &criteria), vec!["c"]);

        let criteria = FilterCriteria {
            tag: TagFilter::Untagged,
            ..FilterCriteria::default()
        };
        assert_eq!(matching(&state, &criteria), vec!["b"]);

        let criteria = FilterCriteria {
            tracker: TrackerFilter::Trackerless,
            ..FilterCriteria::default()
        };
        assert_eq!(matching(&state, &criteria), vec!["b", "c"]);

        let criteria = FilterCriteria {
            tracker: TrackerFilter::Named("udp://t1".into()),
            ..FilterCriteria::default()
        };
        assert_eq!(matching(&state, &criteria), vec!["a"]);
    }

    #[test]
    fn search_is_case_insensitive_and_regex_fails_closed() {
        let state = state();
        let criteria = FilterCriteria {
            search: SearchFilter::new("ubuntu", SearchField::Name, false),
            ..FilterCriteria::default()
        };
        assert_eq!(matching(&state, &criteria), vec!["a"]);

        let criteria = FilterCriteria {
            search: SearchFilter::new("^(deb|film)", SearchField::Name, true),
            ..FilterCriteria::default()
        };
        assert_eq!(matching(&state, &criteria), vec!["b", "c"]);

        let broken = SearchFilter::new("([", SearchField::Name, true);
        assert!(!broken.regex_valid());
        assert!(matches!(
            broken.check(),
            Err(SyncError::InvalidPattern { .. })
        ));
        let criteria = FilterCriteria {
            search: broken,
            ..FilterCriteria::default()
        };
        assert!(matching(&state, &criteria).is_empty());

        let literal = SearchFilter::new("([", SearchField::Name, false);
        assert!(literal.regex_valid());
    }

    #[test]
    fn tag_search_matches_any_tag() {
        let state = state();
        let criteria = FilterCriteria {
            search: SearchFilter::new("X", SearchField::Tags, false),
            ..FilterCriteria::default()
        };
        assert_eq!(matching(&state, &criteria), vec!["c"]);
    }

    #[test]
    fn selectors_parse_from_text() {
        assert_eq!(
            "stalled-uploading".parse::<StatusFilter>().unwrap(),
            StatusFilter::StalledUploading
        );
        assert_eq!("save_path".parse::<SearchField>().unwrap(), SearchField::SavePath);
        assert!(matches!(
            "bogus".parse::<StatusFilter>(),
            Err(SyncError::UnknownSelector { kind: "status", .. })
        ));
    }

    #[test]
    fn sidebar_counts_roll_up_subcategories() {
        let state = state();
        let counts = SidebarCounts::from_state(&state, true);
        assert_eq!(counts.statuses[&StatusFilter::All], 3);
        assert_eq!(counts.statuses[&StatusFilter::Stalled], 1);
        assert_eq!(counts.categories["linux"], 2);
        assert_eq!(counts.categories["linux/stable"], 1);
        assert_eq!(counts.uncategorized, 1);
        assert_eq!(counts.tags["hd"], 2);
        assert_eq!(counts.untagged, 1);
        assert_eq!(counts.trackers["udp://t1"], 1);
        assert_eq!(counts.trackerless, 2);
    }
}
