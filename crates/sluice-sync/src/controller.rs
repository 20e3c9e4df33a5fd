//! Poll loop lifecycle and the handle consumers use to talk to it.
//!
//! # Design
//! - `Idle -> Running -> (Stopped | LostConnection)`; terminal states are final for a session.
//! - `start` takes `&mut self`, so concurrent starts are ruled out at compile time; a repeat
//!   start while running hands back the existing handle.
//! - The worker task owns the session; the handle only sends commands and reads watches.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use sluice_core::{
    ChangeEvent, FilterCriteria, ServerState, SidebarCounts, SortSpec, SyncSession, Torrent,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{info, warn};

use crate::collab::{AuthCheck, SnapshotSource, SpeedSink};
use crate::command::SyncCommand;
use crate::config::SyncConfig;
use crate::error::{ConfigError, ControllerError, ControllerResult};
use crate::worker;

/// Lifecycle of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Not started yet.
    Idle,
    /// Polling.
    Running,
    /// Shut down on request.
    Stopped,
    /// Halted after a transport failure.
    LostConnection,
}

impl LoopState {
    /// Whether the loop has ended for good.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::LostConnection)
    }
}

/// Owns the poll loop configuration and starts it at most once.
pub struct PollController {
    config: SyncConfig,
    source: Arc<dyn SnapshotSource>,
    speed_sink: Arc<dyn SpeedSink>,
    session: Option<SyncSession>,
    handle: Option<SyncHandle>,
}

impl PollController {
    /// Build an idle controller.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when `config` fails validation.
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn SnapshotSource>,
        speed_sink: Arc<dyn SpeedSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            speed_sink,
            session: None,
            handle: None,
        })
    }

    /// Seed the session (for example with restored filter and sort preferences).
    #[must_use]
    pub fn with_session(mut self, session: SyncSession) -> Self {
        self.session = Some(session);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        self.handle
            .as_ref()
            .map_or(LoopState::Idle, SyncHandle::state)
    }

    /// Consult the authentication check and start polling.
    ///
    /// # Errors
    ///
    /// - [`ControllerError::NotAuthenticated`] when the check says no; the controller stays idle.
    /// - [`ControllerError::Auth`] when the check itself fails.
    /// - [`ControllerError::Stopped`] when this controller's loop already ended.
    pub async fn start(&mut self, auth: &dyn AuthCheck) -> ControllerResult<SyncHandle> {
        if let Some(handle) = &self.handle {
            let state = handle.state();
            if state.is_terminal() {
                return Err(ControllerError::Stopped { state });
            }
            return Ok(handle.clone());
        }

        match auth.is_authenticated().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("poll loop not started: session is not authenticated");
                return Err(ControllerError::NotAuthenticated);
            }
            Err(err) => {
                warn!(error = %err, operation = err.operation, "authentication check failed");
                return Err(ControllerError::Auth(err));
            }
        }

        let session = self.session.take().unwrap_or_default();
        let handle = worker::spawn(
            self.config,
            Arc::clone(&self.source),
            Arc::clone(&self.speed_sink),
            session,
        );
        info!(
            refresh_interval_ms = self.config.refresh_interval_ms,
            "poll loop started"
        );
        self.handle = Some(handle.clone());
        Ok(handle)
    }
}

/// Cloneable handle to a running poll loop.
#[derive(Clone)]
pub struct SyncHandle {
    commands: mpsc::Sender<SyncCommand>,
    shutdown: Arc<watch::Sender<bool>>,
    interval: Arc<watch::Sender<Duration>>,
    state: watch::Receiver<LoopState>,
    events: broadcast::Sender<ChangeEvent>,
    version: Arc<AtomicU64>,
}

impl SyncHandle {
    pub(crate) const fn new(
        commands: mpsc::Sender<SyncCommand>,
        shutdown: Arc<watch::Sender<bool>>,
        interval: Arc<watch::Sender<Duration>>,
        state: watch::Receiver<LoopState>,
        events: broadcast::Sender<ChangeEvent>,
        version: Arc<AtomicU64>,
    ) -> Self {
        Self {
            commands,
            shutdown,
            interval,
            state,
            events,
            version,
        }
    }

    /// Stop polling. Safe to call any number of times.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Change the poll interval; an in-flight wait restarts with the new duration.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Stopped`] once the loop has ended.
    pub fn set_interval(&self, interval: Duration) -> ControllerResult<()> {
        self.ensure_running()?;
        self.interval.send_replace(interval);
        Ok(())
    }

    /// Replace the filter criteria.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Stopped`] or [`ControllerError::ChannelClosed`] when the worker is gone.
    pub async fn set_criteria(&self, criteria: FilterCriteria) -> ControllerResult<()> {
        self.send(SyncCommand::SetCriteria(Box::new(criteria))).await
    }

    /// Replace the ordering.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Stopped`] or [`ControllerError::ChannelClosed`] when the worker is gone.
    pub async fn set_sort(&self, sort: SortSpec) -> ControllerResult<()> {
        self.send(SyncCommand::SetSort(sort)).await
    }

    /// Owned copy of the current view.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Stopped`] or [`ControllerError::ChannelClosed`] when the worker is gone.
    pub async fn view(&self) -> ControllerResult<Vec<Torrent>> {
        let (respond_to, rx) = oneshot::channel();
        self.send(SyncCommand::View { respond_to }).await?;
        rx.await.map_err(|_| ControllerError::ChannelClosed)
    }

    /// Sidebar counts.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Stopped`] or [`ControllerError::ChannelClosed`] when the worker is gone.
    pub async fn counts(&self) -> ControllerResult<SidebarCounts> {
        let (respond_to, rx) = oneshot::channel();
        self.send(SyncCommand::Counts { respond_to }).await?;
        rx.await.map_err(|_| ControllerError::ChannelClosed)
    }

    /// Latest server record, once a full snapshot has been merged.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Stopped`] or [`ControllerError::ChannelClosed`] when the worker is gone.
    pub async fn server_state(&self) -> ControllerResult<Option<ServerState>> {
        let (respond_to, rx) = oneshot::channel();
        self.send(SyncCommand::ServerState { respond_to }).await?;
        rx.await.map_err(|_| ControllerError::ChannelClosed)
    }

    /// View version as of the last published change.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Receive change events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoopState {
        *self.state.borrow()
    }

    /// Wait until the loop reaches a terminal state and return it.
    pub async fn wait_stopped(&self) -> LoopState {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|state| state.is_terminal())
            .await
            .map(|reached| *reached);
        reached.unwrap_or_else(|_| *state.borrow())
    }

    fn ensure_running(&self) -> ControllerResult<()> {
        let state = self.state();
        if state.is_terminal() {
            return Err(ControllerError::Stopped { state });
        }
        Ok(())
    }

    async fn send(&self, command: SyncCommand) -> ControllerResult<()> {
        self.commands.send(command).await.map_err(|_| {
            let state = self.state();
            if state.is_terminal() {
                ControllerError::Stopped { state }
            } else {
                ControllerError::ChannelClosed
            }
        })
    }
}
