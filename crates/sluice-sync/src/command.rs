//! Requests a [`crate::SyncHandle`] sends to the poll worker.

use sluice_core::{FilterCriteria, ServerState, SidebarCounts, SortSpec, Torrent};
use tokio::sync::oneshot;

/// Command processed by the worker between polls and while a fetch is in flight.
#[derive(Debug)]
pub enum SyncCommand {
    /// Replace the filter criteria.
    SetCriteria(Box<FilterCriteria>),
    /// Replace the ordering.
    SetSort(SortSpec),
    /// Read the filtered, sorted view.
    View {
        /// Channel used to return owned copies of the visible torrents.
        respond_to: oneshot::Sender<Vec<Torrent>>,
    },
    /// Read sidebar counts.
    Counts {
        /// Channel used to return the counts.
        respond_to: oneshot::Sender<SidebarCounts>,
    },
    /// Read the latest server record.
    ServerState {
        /// Channel used to return the record; `None` before the first full snapshot.
        respond_to: oneshot::Sender<Option<ServerState>>,
    },
}
