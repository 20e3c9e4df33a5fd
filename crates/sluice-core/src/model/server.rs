//! Global transfer/session record reported alongside every snapshot.

use serde::{Deserialize, Serialize};

use super::torrent::assign;

/// Engine connectivity as reported by the remote session.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Incoming connections are reachable.
    Connected,
    /// Outgoing only; incoming connections are blocked.
    Firewalled,
    /// The engine has no network connectivity.
    #[default]
    Disconnected,
}

/// Latest server/session record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerState {
    /// Global download rate in bytes per second.
    pub download_bps: u64,
    /// Global upload rate in bytes per second.
    pub upload_bps: u64,
    /// Bytes downloaded this session.
    pub downloaded_session: u64,
    /// Bytes uploaded this session.
    pub uploaded_session: u64,
    /// Global download limit in bytes per second (0 = unlimited).
    pub download_limit: u64,
    /// Global upload limit in bytes per second (0 = unlimited).
    pub upload_limit: u64,
    /// Connectivity as seen by the engine.
    pub connection_status: ConnectionStatus,
    /// Refresh interval the engine advertises to clients, in milliseconds.
    pub refresh_interval_ms: u64,
    /// Whether alternative speed limits are engaged.
    pub use_alt_speed_limits: bool,
    /// Whether `a/b` categories are treated as nested.
    pub use_subcategories: bool,
    /// Free space at the default save path.
    pub free_space_on_disk: u64,
    /// Whether torrent queueing is enabled.
    pub queueing: bool,
    /// Number of DHT nodes.
    pub dht_nodes: u64,
}

/// Partial server record; `None` fields keep their prior value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerStatePatch {
    /// Global download rate.
    pub download_bps: Option<u64>,
    /// Global upload rate.
    pub upload_bps: Option<u64>,
    /// Session download total.
    pub downloaded_session: Option<u64>,
    /// Session upload total.
    pub uploaded_session: Option<u64>,
    /// Global download limit.
    pub download_limit: Option<u64>,
    /// Global upload limit.
    pub upload_limit: Option<u64>,
    /// Connectivity.
    pub connection_status: Option<ConnectionStatus>,
    /// Advertised refresh interval in milliseconds.
    pub refresh_interval_ms: Option<u64>,
    /// Alternative speed limits flag.
    pub use_alt_speed_limits: Option<bool>,
    /// Nested categories flag.
    pub use_subcategories: Option<bool>,
    /// Free disk space.
    pub free_space_on_disk: Option<u64>,
    /// Queueing flag.
    pub queueing: Option<bool>,
    /// DHT node count.
    pub dht_nodes: Option<u64>,
}

impl From<ServerState> for ServerStatePatch {
    fn from(value: ServerState) -> Self {
        Self {
            download_bps: Some(value.download_bps),
            upload_bps: Some(value.upload_bps),
            downloaded_session: Some(value.downloaded_session),
            uploaded_session: Some(value.uploaded_session),
            download_limit: Some(value.download_limit),
            upload_limit: Some(value.upload_limit),
            connection_status: Some(value.connection_status),
            refresh_interval_ms: Some(value.refresh_interval_ms),
            use_alt_speed_limits: Some(value.use_alt_speed_limits),
            use_subcategories: Some(value.use_subcategories),
            free_space_on_disk: Some(value.free_space_on_disk),
            queueing: Some(value.queueing),
            dht_nodes: Some(value.dht_nodes),
        }
    }
}

/// What folding a server patch changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerEffect {
    /// Any field changed.
    pub changed: bool,
    /// The nested-categories flag flipped.
    pub subcategories_changed: bool,
    /// The advertised refresh interval changed.
    pub refresh_interval_changed: bool,
}

impl ServerState {
    /// Fold a patch onto the record.
    pub fn apply(&mut self, patch: ServerStatePatch) -> ServerEffect {
        let subcategories_changed = assign(&mut self.use_subcategories, patch.use_subcategories);
        let refresh_interval_changed =
            assign(&mut self.refresh_interval_ms, patch.refresh_interval_ms);

        let mut changed = subcategories_changed || refresh_interval_changed;
        changed |= assign(&mut self.download_bps, patch.download_bps);
        changed |= assign(&mut self.upload_bps, patch.upload_bps);
        changed |= assign(&mut self.downloaded_session, patch.downloaded_session);
        changed |= assign(&mut self.uploaded_session, patch.uploaded_session);
        changed |= assign(&mut self.download_limit, patch.download_limit);
        changed |= assign(&mut self.upload_limit, patch.upload_limit);
        changed |= assign(&mut self.connection_status, patch.connection_status);
        changed |= assign(&mut self.use_alt_speed_limits, patch.use_alt_speed_limits);
        changed |= assign(&mut self.free_space_on_disk, patch.free_space_on_disk);
        changed |= assign(&mut self.queueing, patch.queueing);
        changed |= assign(&mut self.dht_nodes, patch.dht_nodes);

        ServerEffect {
            changed,
            subcategories_changed,
            refresh_interval_changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_reports_flag_and_interval_changes() {
        let mut state = ServerState::default();
        let effect = state.apply(ServerStatePatch {
            use_subcategories: Some(true),
            refresh_interval_ms: Some(2_000),
            ..ServerStatePatch::default()
        });
        assert!(effect.changed);
        assert!(effect.subcategories_changed);
        assert!(effect.refresh_interval_changed);

        let effect = state.apply(ServerStatePatch {
            download_bps: Some(10),
            refresh_interval_ms: Some(2_000),
            ..ServerStatePatch::default()
        });
        assert!(effect.changed);
        assert!(!effect.subcategories_changed);
        assert!(!effect.refresh_interval_changed);
    }
}
