//! Torrent records and the partial patches that deltas carry for them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Engine-assigned torrent identifier (the info-hash string).
pub type TorrentId = String;

/// Lifecycle state reported by the remote engine for a torrent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TorrentState {
    /// Engine reported an I/O or tracker error.
    #[serde(rename = "error")]
    Error,
    /// Payload files are missing on disk.
    #[serde(rename = "missingFiles")]
    MissingFiles,
    /// Seeding and actively uploading.
    #[serde(rename = "uploading")]
    Uploading,
    /// Completed and paused (older engine naming).
    #[serde(rename = "pausedUP")]
    PausedUploading,
    /// Completed and stopped.
    #[serde(rename = "stoppedUP")]
    StoppedUploading,
    /// Completed and waiting in the upload queue.
    #[serde(rename = "queuedUP")]
    QueuedUploading,
    /// Seeding with no connected peers.
    #[serde(rename = "stalledUP")]
    StalledUploading,
    /// Rechecking completed data.
    #[serde(rename = "checkingUP")]
    CheckingUploading,
    /// Forced seeding, bypassing the queue.
    #[serde(rename = "forcedUP")]
    ForcedUploading,
    /// Preallocating disk space.
    #[serde(rename = "allocating")]
    Allocating,
    /// Actively downloading.
    #[serde(rename = "downloading")]
    Downloading,
    /// Fetching metadata for a magnet reference.
    #[serde(rename = "metaDL")]
    DownloadingMetadata,
    /// Forced metadata fetch, bypassing the queue.
    #[serde(rename = "forcedMetaDL")]
    ForcedDownloadingMetadata,
    /// Incomplete and paused (older engine naming).
    #[serde(rename = "pausedDL")]
    PausedDownloading,
    /// Incomplete and stopped.
    #[serde(rename = "stoppedDL")]
    StoppedDownloading,
    /// Waiting in the download queue.
    #[serde(rename = "queuedDL")]
    QueuedDownloading,
    /// Downloading with no connected peers.
    #[serde(rename = "stalledDL")]
    StalledDownloading,
    /// Rechecking incomplete data.
    #[serde(rename = "checkingDL")]
    CheckingDownloading,
    /// Forced download, bypassing the queue.
    #[serde(rename = "forcedDL")]
    ForcedDownloading,
    /// Validating fast-resume data at startup.
    #[serde(rename = "checkingResumeData")]
    CheckingResumeData,
    /// Moving payload to a new location.
    #[serde(rename = "moving")]
    Moving,
    /// Any state this client does not recognise.
    #[default]
    #[serde(rename = "unknown")]
    #[serde(other)]
    Unknown,
}

impl TorrentState {
    /// Wire name used by the engine.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::MissingFiles => "missingFiles",
            Self::Uploading => "uploading",
            Self::PausedUploading => "pausedUP",
            Self::StoppedUploading => "stoppedUP",
            Self::QueuedUploading => "queuedUP",
            Self::StalledUploading => "stalledUP",
            Self::CheckingUploading => "checkingUP",
            Self::ForcedUploading => "forcedUP",
            Self::Allocating => "allocating",
            Self::Downloading => "downloading",
            Self::DownloadingMetadata => "metaDL",
            Self::ForcedDownloadingMetadata => "forcedMetaDL",
            Self::PausedDownloading => "pausedDL",
            Self::StoppedDownloading => "stoppedDL",
            Self::QueuedDownloading => "queuedDL",
            Self::StalledDownloading => "stalledDL",
            Self::CheckingDownloading => "checkingDL",
            Self::ForcedDownloading => "forcedDL",
            Self::CheckingResumeData => "checkingResumeData",
            Self::Moving => "moving",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a wire name, mapping anything unrecognised to [`Self::Unknown`].
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == value)
            .unwrap_or(Self::Unknown)
    }

    const ALL: [Self; 22] = [
        Self::Error,
        Self::MissingFiles,
        Self::Uploading,
        Self::PausedUploading,
        Self::StoppedUploading,
        Self::QueuedUploading,
        Self::StalledUploading,
        Self::CheckingUploading,
        Self::ForcedUploading,
        Self::Allocating,
        Self::Downloading,
        Self::DownloadingMetadata,
        Self::ForcedDownloadingMetadata,
        Self::PausedDownloading,
        Self::StoppedDownloading,
        Self::QueuedDownloading,
        Self::StalledDownloading,
        Self::CheckingDownloading,
        Self::ForcedDownloading,
        Self::CheckingResumeData,
        Self::Moving,
        Self::Unknown,
    ];

    /// Incomplete torrents, whether running, queued, or stopped.
    #[must_use]
    pub const fn is_downloading(self) -> bool {
        matches!(
            self,
            Self::Downloading
                | Self::DownloadingMetadata
                | Self::ForcedDownloadingMetadata
                | Self::StalledDownloading
                | Self::CheckingDownloading
                | Self::PausedDownloading
                | Self::StoppedDownloading
                | Self::QueuedDownloading
                | Self::ForcedDownloading
        )
    }

    /// Complete torrents that are eligible to seed.
    #[must_use]
    pub const fn is_uploading(self) -> bool {
        matches!(
            self,
            Self::Uploading
                | Self::StalledUploading
                | Self::CheckingUploading
                | Self::QueuedUploading
                | Self::ForcedUploading
        )
    }

    /// Complete torrents, including stopped ones.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        self.is_uploading() || matches!(self, Self::PausedUploading | Self::StoppedUploading)
    }

    /// Stopped or paused by the user.
    #[must_use]
    pub const fn is_stopped(self) -> bool {
        matches!(
            self,
            Self::PausedDownloading
                | Self::PausedUploading
                | Self::StoppedDownloading
                | Self::StoppedUploading
        )
    }

    /// States where the engine is exchanging data or moving files.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Downloading
                | Self::DownloadingMetadata
                | Self::ForcedDownloadingMetadata
                | Self::ForcedDownloading
                | Self::Uploading
                | Self::ForcedUploading
                | Self::Moving
        )
    }

    /// Stalled in either direction.
    #[must_use]
    pub const fn is_stalled(self) -> bool {
        matches!(self, Self::StalledUploading | Self::StalledDownloading)
    }

    /// Hash-checking data.
    #[must_use]
    pub const fn is_checking(self) -> bool {
        matches!(
            self,
            Self::CheckingUploading | Self::CheckingDownloading | Self::CheckingResumeData
        )
    }

    /// Errored or missing files.
    #[must_use]
    pub const fn is_errored(self) -> bool {
        matches!(self, Self::Error | Self::MissingFiles)
    }
}

/// Fully materialised torrent record held by the canonical state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Torrent {
    /// Info-hash identifying the torrent.
    pub hash: TorrentId,
    /// Display name.
    pub name: String,
    /// Engine-reported lifecycle state.
    pub state: TorrentState,
    /// Current download rate in bytes per second.
    pub download_bps: u64,
    /// Current upload rate in bytes per second.
    pub upload_bps: u64,
    /// Completion ratio in the range 0.0–1.0.
    pub progress: f64,
    /// Estimated seconds remaining; the engine uses a large sentinel for "infinite".
    pub eta_secs: i64,
    /// Share ratio.
    pub ratio: f64,
    /// Category name; empty when uncategorized.
    pub category: String,
    /// Tags applied to the torrent.
    pub tags: BTreeSet<String>,
    /// Tracker currently in use; empty when none is working.
    pub tracker: String,
    /// Save path on the engine host.
    pub save_path: String,
    /// Selected payload size in bytes.
    pub size_bytes: u64,
    /// Total bytes downloaded.
    pub downloaded_bytes: u64,
    /// Total bytes uploaded.
    pub uploaded_bytes: u64,
    /// Unix timestamp when the torrent was added.
    pub added_on: i64,
    /// Unix timestamp when the torrent completed (non-positive when incomplete).
    pub completion_on: i64,
    /// Queue position (non-positive when not queued).
    pub priority: i64,
}

impl Torrent {
    /// Materialise a record from a patch for an id the state has not seen.
    #[must_use]
    pub fn from_patch(hash: impl Into<TorrentId>, patch: TorrentPatch) -> Self {
        let mut torrent = Self {
            hash: hash.into(),
            ..Self::default()
        };
        torrent.apply(patch);
        torrent
    }

    /// Fold a partial patch onto this record.
    pub fn apply(&mut self, patch: TorrentPatch) -> PatchEffect {
        let mut effect = PatchEffect::default();

        effect.filter_relevant |= assign(&mut self.name, patch.name);
        effect.filter_relevant |= assign(&mut self.state, patch.state);
        effect.filter_relevant |= assign(&mut self.category, patch.category);
        effect.filter_relevant |= assign(&mut self.tags, patch.tags);
        effect.filter_relevant |= assign(&mut self.tracker, patch.tracker);
        effect.filter_relevant |= assign(&mut self.save_path, patch.save_path);
        effect.filter_relevant |= assign(&mut self.added_on, patch.added_on);

        effect.volatile |= assign(&mut self.download_bps, patch.download_bps);
        effect.volatile |= assign(&mut self.upload_bps, patch.upload_bps);
        effect.volatile |= assign(&mut self.progress, patch.progress);
        effect.volatile |= assign(&mut self.eta_secs, patch.eta_secs);
        effect.volatile |= assign(&mut self.ratio, patch.ratio);
        effect.volatile |= assign(&mut self.size_bytes, patch.size_bytes);
        effect.volatile |= assign(&mut self.downloaded_bytes, patch.downloaded_bytes);
        effect.volatile |= assign(&mut self.uploaded_bytes, patch.uploaded_bytes);
        effect.volatile |= assign(&mut self.completion_on, patch.completion_on);
        effect.volatile |= assign(&mut self.priority, patch.priority);

        effect
    }
}

/// Partial torrent record; `None` fields keep their prior value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TorrentPatch {
    /// Display name.
    pub name: Option<String>,
    /// Lifecycle state.
    pub state: Option<TorrentState>,
    /// Download rate in bytes per second.
    pub download_bps: Option<u64>,
    /// Upload rate in bytes per second.
    pub upload_bps: Option<u64>,
    /// Completion ratio in the range 0.0–1.0.
    pub progress: Option<f64>,
    /// Estimated seconds remaining.
    pub eta_secs: Option<i64>,
    /// Share ratio.
    pub ratio: Option<f64>,
    /// Category name.
    pub category: Option<String>,
    /// Full tag set (tags always travel as a whole).
    pub tags: Option<BTreeSet<String>>,
    /// Current tracker.
    pub tracker: Option<String>,
    /// Save path.
    pub save_path: Option<String>,
    /// Payload size in bytes.
    pub size_bytes: Option<u64>,
    /// Total bytes downloaded.
    pub downloaded_bytes: Option<u64>,
    /// Total bytes uploaded.
    pub uploaded_bytes: Option<u64>,
    /// Unix timestamp when added.
    pub added_on: Option<i64>,
    /// Unix timestamp when completed.
    pub completion_on: Option<i64>,
    /// Queue position.
    pub priority: Option<i64>,
}

impl From<Torrent> for TorrentPatch {
    fn from(value: Torrent) -> Self {
        Self {
            name: Some(value.name),
            state: Some(value.state),
            download_bps: Some(value.download_bps),
            upload_bps: Some(value.upload_bps),
            progress: Some(value.progress),
            eta_secs: Some(value.eta_secs),
            ratio: Some(value.ratio),
            category: Some(value.category),
            tags: Some(value.tags),
            tracker: Some(value.tracker),
            save_path: Some(value.save_path),
            size_bytes: Some(value.size_bytes),
            downloaded_bytes: Some(value.downloaded_bytes),
            uploaded_bytes: Some(value.uploaded_bytes),
            added_on: Some(value.added_on),
            completion_on: Some(value.completion_on),
            priority: Some(value.priority),
        }
    }
}

/// What a patch changed on a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchEffect {
    /// A field used by filters, search, or stable sort columns changed.
    pub filter_relevant: bool,
    /// A throughput/progress style field changed.
    pub volatile: bool,
}

impl PatchEffect {
    /// Whether anything changed at all.
    #[must_use]
    pub const fn changed(self) -> bool {
        self.filter_relevant || self.volatile
    }
}

pub(crate) fn assign<T: PartialEq>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *slot != value => {
            *slot = value;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_wire_names_round_trip_through_serde() {
        let json = serde_json::to_string(&TorrentState::StalledDownloading).unwrap();
        assert_eq!(json, "\"stalledDL\"");
        let parsed: TorrentState = serde_json::from_str("\"forcedMetaDL\"").unwrap();
        assert_eq!(parsed, TorrentState::ForcedDownloadingMetadata);
        let unknown: TorrentState = serde_json::from_str("\"somethingNew\"").unwrap();
        assert_eq!(unknown, TorrentState::Unknown);
    }

    #[test]
    fn from_wire_matches_as_str() {
        assert_eq!(TorrentState::from_wire("pausedUP"), TorrentState::PausedUploading);
        assert_eq!(TorrentState::from_wire("bogus"), TorrentState::Unknown);
    }

    #[test]
    fn state_groups_follow_engine_semantics() {
        assert!(TorrentState::StoppedDownloading.is_downloading());
        assert!(TorrentState::StoppedDownloading.is_stopped());
        assert!(!TorrentState::StoppedDownloading.is_completed());
        assert!(TorrentState::StoppedUploading.is_completed());
        assert!(!TorrentState::StoppedUploading.is_uploading());
        assert!(TorrentState::Moving.is_active());
        assert!(!TorrentState::StalledDownloading.is_active());
        assert!(TorrentState::MissingFiles.is_errored());
        assert!(TorrentState::CheckingResumeData.is_checking());
    }

    #[test]
    fn speed_only_patch_is_volatile() {
        let mut torrent = Torrent::from_patch(
            "a",
            TorrentPatch {
                name: Some("alpha".into()),
                category: Some("movies".into()),
                ..TorrentPatch::default()
            },
        );
        let effect = torrent.apply(TorrentPatch {
            download_bps: Some(1_024),
            progress: Some(0.5),
            ..TorrentPatch::default()
        });
        assert!(effect.volatile);
        assert!(!effect.filter_relevant);
        assert_eq!(torrent.name, "alpha");
        assert_eq!(torrent.download_bps, 1_024);
    }

    #[test]
    fn unchanged_values_report_no_effect() {
        let mut torrent = Torrent::from_patch(
            "a",
            TorrentPatch {
                category: Some("tv".into()),
                ..TorrentPatch::default()
            },
        );
        let effect = torrent.apply(TorrentPatch {
            category: Some("tv".into()),
            ..TorrentPatch::default()
        });
        assert!(!effect.changed());

        let effect = torrent.apply(TorrentPatch {
            category: Some("movies".into()),
            ..TorrentPatch::default()
        });
        assert!(effect.filter_relevant);
    }

    #[test]
    fn full_patch_round_trips_a_record() {
        let original = Torrent {
            hash: "abc".into(),
            name: "demo".into(),
            state: TorrentState::Uploading,
            tags: ["a".to_string()].into_iter().collect(),
            added_on: 42,
            ..Torrent::default()
        };
        let rebuilt = Torrent::from_patch("abc", TorrentPatch::from(original.clone()));
        assert_eq!(rebuilt, original);
    }
}
