#![allow(clippy::redundant_pub_crate)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use sluice_core::{ChangeEvent, Snapshot, SyncSession};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::collab::{SnapshotSource, SpeedSample, SpeedSink};
use crate::command::SyncCommand;
use crate::config::SyncConfig;
use crate::controller::{LoopState, SyncHandle};

pub(crate) fn spawn(
    config: SyncConfig,
    source: Arc<dyn SnapshotSource>,
    speed_sink: Arc<dyn SpeedSink>,
    session: SyncSession,
) -> SyncHandle {
    let (commands_tx, commands) = mpsc::channel(config.command_buffer);
    let (shutdown_tx, shutdown) = watch::channel(false);
    let (interval_tx, interval) = watch::channel(config.refresh_interval());
    let (state_tx, state_rx) = watch::channel(LoopState::Running);
    let (events, _) = broadcast::channel(config.event_buffer);
    let version = Arc::new(AtomicU64::new(session.version()));

    let mut inbox = Inbox {
        commands,
        shutdown,
        interval,
    };
    let mut worker = Worker {
        config,
        source,
        speed_sink,
        session,
        interval: config.refresh_interval(),
        events: events.clone(),
        version: Arc::clone(&version),
    };

    tokio::spawn(async move {
        let outcome = worker.poll(&mut inbox).await;
        state_tx.send_replace(outcome);
        match outcome {
            LoopState::LostConnection => {
                info!("poll loop halted after connection loss; serving reads only");
                worker.serve_reads(&mut inbox).await;
            }
            _ => info!("poll loop stopped"),
        }
    });

    SyncHandle::new(
        commands_tx,
        Arc::new(shutdown_tx),
        Arc::new(interval_tx),
        state_rx,
        events,
        version,
    )
}

struct Inbox {
    commands: mpsc::Receiver<SyncCommand>,
    shutdown: watch::Receiver<bool>,
    interval: watch::Receiver<Duration>,
}

struct Worker {
    config: SyncConfig,
    source: Arc<dyn SnapshotSource>,
    speed_sink: Arc<dyn SpeedSink>,
    session: SyncSession,
    interval: Duration,
    events: broadcast::Sender<ChangeEvent>,
    version: Arc<AtomicU64>,
}

impl Worker {
    /// Run wait/fetch/merge cycles until shutdown or a transport failure.
    async fn poll(&mut self, inbox: &mut Inbox) -> LoopState {
        let mut deadline = Instant::now();

        loop {
            let sleep = sleep_until(deadline);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    biased;
                    _ = inbox.shutdown.wait_for(|stop| *stop) => return LoopState::Stopped,
                    changed = inbox.interval.changed() => {
                        if changed.is_err() {
                            return LoopState::Stopped;
                        }
                        let requested = *inbox.interval.borrow_and_update();
                        self.interval = self.clamp(requested);
                        deadline = Instant::now() + self.interval;
                        sleep.as_mut().reset(deadline);
                        debug!(interval = ?self.interval, "poll wait restarted with new interval");
                    }
                    command = inbox.commands.recv() => match command {
                        Some(command) => self.handle(command),
                        None => return LoopState::Stopped,
                    },
                    () = &mut sleep => break,
                }
            }

            let cursor = self.session.cursor();
            let source = Arc::clone(&self.source);
            let fetch = source.fetch(cursor);
            tokio::pin!(fetch);
            let result = loop {
                tokio::select! {
                    biased;
                    _ = inbox.shutdown.wait_for(|stop| *stop) => return LoopState::Stopped,
                    command = inbox.commands.recv() => match command {
                        Some(command) => self.handle(command),
                        None => return LoopState::Stopped,
                    },
                    result = &mut fetch => break result,
                }
            };

            match result {
                Ok(snapshot) => self.absorb(snapshot),
                Err(err) => {
                    error!(
                        error = %err,
                        operation = err.operation,
                        status = ?err.status,
                        cursor,
                        "snapshot fetch failed; polling halted"
                    );
                    if let Some(event) = self.session.mark_lost_connection() {
                        self.publish(event);
                    }
                    return LoopState::LostConnection;
                }
            }

            deadline = Instant::now() + self.interval;
        }
    }

    /// After a connection loss, keep answering reads until shutdown.
    async fn serve_reads(&mut self, inbox: &mut Inbox) {
        loop {
            tokio::select! {
                biased;
                _ = inbox.shutdown.wait_for(|stop| *stop) => break,
                command = inbox.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
            }
        }
    }

    fn absorb(&mut self, snapshot: Snapshot) {
        let cursor = snapshot.cursor;
        match self.session.apply_snapshot(snapshot) {
            Ok(outcome) => {
                debug!(
                    cursor,
                    full_update = outcome.report.full_update,
                    filter_relevant = outcome.report.filter_relevant,
                    "snapshot merged"
                );
                self.sample();
                if let Some(hint) = outcome.report.refresh_hint_ms {
                    self.adopt_hint(hint);
                }
                self.publish(outcome.event);
            }
            Err(err) => warn!(error = %err, cursor, "snapshot rejected"),
        }
    }

    fn sample(&self) {
        if let Some(state) = self.session.state() {
            let server = state.server_state();
            self.speed_sink.push_sample(SpeedSample {
                at: Utc::now(),
                download_bps: server.download_bps,
                upload_bps: server.upload_bps,
            });
        }
    }

    fn adopt_hint(&mut self, advertised_ms: u64) {
        let next = self.config.clamp_interval(advertised_ms);
        if next != self.interval {
            info!(
                previous = ?self.interval,
                next = ?next,
                "engine changed refresh interval"
            );
            self.interval = next;
        }
    }

    fn clamp(&self, requested: Duration) -> Duration {
        let floor = Duration::from_millis(self.config.min_refresh_interval_ms);
        requested.max(floor)
    }

    fn handle(&mut self, command: SyncCommand) {
        match command {
            SyncCommand::SetCriteria(criteria) => {
                if let Some(event) = self.session.set_criteria(*criteria) {
                    self.publish(event);
                }
            }
            SyncCommand::SetSort(sort) => {
                if let Some(event) = self.session.set_sort(sort) {
                    self.publish(event);
                }
            }
            SyncCommand::View { respond_to } => {
                let view = self.session.view().into_iter().cloned().collect();
                let _ = respond_to.send(view);
            }
            SyncCommand::Counts { respond_to } => {
                let _ = respond_to.send(self.session.counts());
            }
            SyncCommand::ServerState { respond_to } => {
                let server = self
                    .session
                    .state()
                    .map(|state| state.server_state().clone());
                let _ = respond_to.send(server);
            }
        }
    }

    fn publish(&self, event: ChangeEvent) {
        self.version.store(event.version, Ordering::Release);
        // No subscribers is fine; the version counter still moves.
        let _ = self.events.send(event);
    }
}
