//! `sync/maindata` payloads as the WebUI sends them, and their mapping onto snapshots.
//!
//! # Design
//! - Every field is optional on the wire; deltas only carry what changed.
//! - Negative counters (the engine uses `-1` for "unknown") clamp to zero.
//! - Full responses carry the authoritative tag list; deltas only list additions.

use std::collections::{BTreeSet, HashMap};

use serde::Deserialize;
use sluice_core::{
    CategoryPatch, ConnectionStatus, ServerStatePatch, Snapshot, TorrentPatch, TorrentState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MainData {
    pub(crate) rid: u64,
    pub(crate) full_update: bool,
    pub(crate) torrents: HashMap<String, WireTorrent>,
    pub(crate) torrents_removed: Vec<String>,
    pub(crate) categories: HashMap<String, WireCategory>,
    pub(crate) categories_removed: Vec<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) tags_removed: Vec<String>,
    pub(crate) trackers: HashMap<String, Vec<String>>,
    pub(crate) trackers_removed: Vec<String>,
    pub(crate) server_state: Option<WireServerState>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireTorrent {
    name: Option<String>,
    state: Option<String>,
    dlspeed: Option<i64>,
    upspeed: Option<i64>,
    progress: Option<f64>,
    eta: Option<i64>,
    ratio: Option<f64>,
    category: Option<String>,
    tags: Option<String>,
    tracker: Option<String>,
    save_path: Option<String>,
    size: Option<i64>,
    downloaded: Option<i64>,
    uploaded: Option<i64>,
    added_on: Option<i64>,
    completion_on: Option<i64>,
    priority: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireCategory {
    #[serde(rename = "savePath")]
    save_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireServerState {
    dl_info_speed: Option<i64>,
    up_info_speed: Option<i64>,
    dl_info_data: Option<i64>,
    up_info_data: Option<i64>,
    dl_rate_limit: Option<i64>,
    up_rate_limit: Option<i64>,
    connection_status: Option<String>,
    refresh_interval: Option<i64>,
    use_alt_speed_limits: Option<bool>,
    use_subcategories: Option<bool>,
    free_space_on_disk: Option<i64>,
    queueing: Option<bool>,
    dht_nodes: Option<i64>,
}

impl MainData {
    pub(crate) fn into_snapshot(self) -> Snapshot {
        let mut snapshot = if self.full_update {
            Snapshot::full(self.rid)
        } else {
            Snapshot::delta(self.rid)
        };

        snapshot.torrents = self
            .torrents
            .into_iter()
            .map(|(hash, torrent)| (hash, torrent.into_patch()))
            .collect();
        snapshot.torrents_removed = self.torrents_removed.into_iter().collect();
        snapshot.categories = self
            .categories
            .into_iter()
            .map(|(name, category)| {
                (
                    name,
                    CategoryPatch {
                        save_path: category.save_path,
                    },
                )
            })
            .collect();
        snapshot.categories_removed = self.categories_removed.into_iter().collect();

        let tags: BTreeSet<String> = self.tags.into_iter().collect();
        if self.full_update {
            snapshot.tags = Some(tags);
        } else {
            snapshot.tags_added = tags;
        }
        snapshot.tags_removed = self.tags_removed.into_iter().collect();

        snapshot.trackers = self
            .trackers
            .into_iter()
            .map(|(url, hashes)| (url, hashes.into_iter().collect()))
            .collect();
        snapshot.trackers_removed = self.trackers_removed.into_iter().collect();
        snapshot.server_state = self.server_state.map(WireServerState::into_patch);
        snapshot
    }
}

impl WireTorrent {
    fn into_patch(self) -> TorrentPatch {
        TorrentPatch {
            name: self.name,
            state: self.state.as_deref().map(TorrentState::from_wire),
            download_bps: unsigned(self.dlspeed),
            upload_bps: unsigned(self.upspeed),
            progress: self.progress,
            eta_secs: self.eta,
            ratio: self.ratio,
            category: self.category,
            tags: self.tags.as_deref().map(split_tags),
            tracker: self.tracker,
            save_path: self.save_path,
            size_bytes: unsigned(self.size),
            downloaded_bytes: unsigned(self.downloaded),
            uploaded_bytes: unsigned(self.uploaded),
            added_on: self.added_on,
            completion_on: self.completion_on,
            priority: self.priority,
        }
    }
}

impl WireServerState {
    fn into_patch(self) -> ServerStatePatch {
        ServerStatePatch {
            download_bps: unsigned(self.dl_info_speed),
            upload_bps: unsigned(self.up_info_speed),
            downloaded_session: unsigned(self.dl_info_data),
            uploaded_session: unsigned(self.up_info_data),
            download_limit: unsigned(self.dl_rate_limit),
            upload_limit: unsigned(self.up_rate_limit),
            connection_status: self.connection_status.as_deref().map(connection_status),
            refresh_interval_ms: unsigned(self.refresh_interval),
            use_alt_speed_limits: self.use_alt_speed_limits,
            use_subcategories: self.use_subcategories,
            free_space_on_disk: unsigned(self.free_space_on_disk),
            queueing: self.queueing,
            dht_nodes: unsigned(self.dht_nodes),
        }
    }
}

fn unsigned(value: Option<i64>) -> Option<u64> {
    value.map(|v| u64::try_from(v).unwrap_or(0))
}

fn split_tags(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

fn connection_status(raw: &str) -> ConnectionStatus {
    match raw {
        "connected" => ConnectionStatus::Connected,
        "firewalled" => ConnectionStatus::Firewalled,
        _ => ConnectionStatus::Disconnected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(value: serde_json::Value) -> Snapshot {
        serde_json::from_value::<MainData>(value)
            .expect("valid maindata")
            .into_snapshot()
    }

    #[test]
    fn full_response_maps_every_section() {
        let snapshot = decode(json!({
            "rid": 7,
            "full_update": true,
            "torrents": {
                "abc": {
                    "name": "Debian ISO",
                    "state": "stalledUP",
                    "dlspeed": 0,
                    "upspeed": 512,
                    "eta": 8_640_000,
                    "category": "linux",
                    "tags": "iso, debian",
                    "tracker": "udp://tracker.example:1337",
                    "size": -1
                }
            },
            "categories": { "linux": { "name": "linux", "savePath": "/data/linux" } },
            "tags": ["iso", "debian", "unused"],
            "trackers": { "udp://tracker.example:1337": ["abc"] },
            "server_state": {
                "dl_info_speed": 100,
                "connection_status": "firewalled",
                "refresh_interval": 2000,
                "use_subcategories": true
            }
        }));

        assert!(snapshot.full_update);
        assert_eq!(snapshot.cursor, 7);
        let torrent = &snapshot.torrents["abc"];
        assert_eq!(torrent.state, Some(TorrentState::StalledUploading));
        assert_eq!(torrent.upload_bps, Some(512));
        assert_eq!(torrent.size_bytes, Some(0));
        assert_eq!(
            torrent.tags,
            Some(BTreeSet::from(["debian".to_string(), "iso".to_string()]))
        );
        assert_eq!(
            snapshot.categories["linux"].save_path.as_deref(),
            Some("/data/linux")
        );
        assert_eq!(snapshot.tags.as_ref().map(BTreeSet::len), Some(3));
        assert!(snapshot.tags_added.is_empty());
        assert!(snapshot.trackers["udp://tracker.example:1337"].contains("abc"));

        let server = snapshot.server_state.expect("server state");
        assert_eq!(server.download_bps, Some(100));
        assert_eq!(server.upload_bps, None);
        assert_eq!(server.connection_status, Some(ConnectionStatus::Firewalled));
        assert_eq!(server.refresh_interval_ms, Some(2_000));
        assert_eq!(server.use_subcategories, Some(true));
    }

    #[test]
    fn delta_response_keeps_absent_fields_unset() {
        let snapshot = decode(json!({
            "rid": 8,
            "torrents": { "abc": { "dlspeed": 2048 } },
            "torrents_removed": ["def"],
            "tags": ["new"],
            "tags_removed": ["old"],
            "categories_removed": ["tv"]
        }));

        assert!(!snapshot.full_update);
        let patch = &snapshot.torrents["abc"];
        assert_eq!(patch.download_bps, Some(2_048));
        assert_eq!(patch.name, None);
        assert_eq!(patch.tags, None);
        assert!(snapshot.torrents_removed.contains("def"));
        assert!(snapshot.tags.is_none());
        assert!(snapshot.tags_added.contains("new"));
        assert!(snapshot.tags_removed.contains("old"));
        assert!(snapshot.categories_removed.contains("tv"));
        assert!(snapshot.server_state.is_none());
    }

    #[test]
    fn empty_tag_string_clears_tags() {
        let snapshot = decode(json!({ "rid": 9, "torrents": { "abc": { "tags": "" } } }));
        assert_eq!(snapshot.torrents["abc"].tags, Some(BTreeSet::new()));
    }
}
