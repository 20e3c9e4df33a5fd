//! Snapshot and torrent builders.

use sluice_core::{Cursor, ServerStatePatch, Snapshot, TorrentPatch, TorrentState};

/// Patch describing a torrent with a name and category, downloading.
#[must_use]
pub fn torrent(name: &str, category: &str) -> TorrentPatch {
    TorrentPatch {
        name: Some(name.to_string()),
        category: Some(category.to_string()),
        state: Some(TorrentState::Downloading),
        ..TorrentPatch::default()
    }
}

/// Patch changing only the download rate.
#[must_use]
pub fn speed(download_bps: u64) -> TorrentPatch {
    TorrentPatch {
        download_bps: Some(download_bps),
        ..TorrentPatch::default()
    }
}

/// Patch moving a torrent to another category.
#[must_use]
pub fn recategorize(category: &str) -> TorrentPatch {
    TorrentPatch {
        category: Some(category.to_string()),
        ..TorrentPatch::default()
    }
}

/// Full snapshot holding the given torrents.
#[must_use]
pub fn full(cursor: Cursor, torrents: &[(&str, TorrentPatch)]) -> Snapshot {
    torrents
        .iter()
        .fold(Snapshot::full(cursor), |snapshot, (id, patch)| {
            snapshot.with_torrent(*id, patch.clone())
        })
}

/// Delta snapshot upserting the given torrents.
#[must_use]
pub fn delta(cursor: Cursor, torrents: &[(&str, TorrentPatch)]) -> Snapshot {
    torrents
        .iter()
        .fold(Snapshot::delta(cursor), |snapshot, (id, patch)| {
            snapshot.with_torrent(*id, patch.clone())
        })
}

/// Server patch advertising global speeds.
#[must_use]
pub fn server_speeds(download_bps: u64, upload_bps: u64) -> ServerStatePatch {
    ServerStatePatch {
        download_bps: Some(download_bps),
        upload_bps: Some(upload_bps),
        ..ServerStatePatch::default()
    }
}

/// Server patch advertising a refresh interval.
#[must_use]
pub fn refresh_hint(refresh_interval_ms: u64) -> ServerStatePatch {
    ServerStatePatch {
        refresh_interval_ms: Some(refresh_interval_ms),
        ..ServerStatePatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_fill_the_expected_maps() {
        let snapshot = full(3, &[("a", torrent("alpha", "movies")), ("b", speed(1))]);
        assert!(snapshot.full_update);
        assert_eq!(snapshot.cursor, 3);
        assert_eq!(snapshot.torrents.len(), 2);

        let snapshot = delta(4, &[("a", recategorize("tv"))]);
        assert!(!snapshot.full_update);
        assert_eq!(
            snapshot.torrents["a"].category.as_deref(),
            Some("tv")
        );
    }
}
