//! Scripted collaborators for exercising the poll loop and deep-link replay.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use sluice_core::{Cursor, Snapshot};
use sluice_sync::{AuthCheck, LinkAdder, LinkError, Navigator, SnapshotSource, TransportError};
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scripted poll response.
#[derive(Debug)]
pub enum Step {
    /// Answer with a snapshot.
    Snapshot(Snapshot),
    /// Answer with a snapshot after a delay.
    Delayed(Duration, Snapshot),
    /// Fail with a transport error.
    Fail,
}

/// Snapshot source that replays a script and records every request.
///
/// Once the script runs out, fetches never complete.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<(Cursor, Instant)>>,
}

impl ScriptedSource {
    /// Source answering with `steps` in order.
    #[must_use]
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Cursors requested so far.
    #[must_use]
    pub fn cursors(&self) -> Vec<Cursor> {
        lock(&self.requests).iter().map(|(cursor, _)| *cursor).collect()
    }

    /// Instants at which fetches started.
    #[must_use]
    pub fn request_times(&self) -> Vec<Instant> {
        lock(&self.requests).iter().map(|(_, at)| *at).collect()
    }

    /// Number of fetches issued.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch(&self, cursor: Cursor) -> Result<Snapshot, TransportError> {
        lock(&self.requests).push((cursor, Instant::now()));
        let step = lock(&self.steps).pop_front();
        match step {
            Some(Step::Snapshot(snapshot)) => Ok(snapshot),
            Some(Step::Delayed(delay, snapshot)) => {
                tokio::time::sleep(delay).await;
                Ok(snapshot)
            }
            Some(Step::Fail) => Err(TransportError::new(
                "fetch_snapshot",
                io::Error::new(io::ErrorKind::ConnectionReset, "scripted failure"),
            )),
            None => std::future::pending().await,
        }
    }
}

/// Authentication check with a fixed answer.
#[derive(Debug)]
pub struct StaticAuth {
    answer: Option<bool>,
    calls: AtomicUsize,
}

impl StaticAuth {
    /// Always authenticated.
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            answer: Some(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// Never authenticated.
    #[must_use]
    pub const fn deny() -> Self {
        Self {
            answer: Some(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// The check itself fails.
    #[must_use]
    pub const fn failing() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times the check ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthCheck for StaticAuth {
    async fn is_authenticated(&self) -> Result<bool, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .ok_or_else(|| TransportError::status("auth_check", 503))
    }
}

/// Link adder that records every value and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingAdder {
    added: Mutex<Vec<String>>,
    failures: AtomicUsize,
}

impl RecordingAdder {
    /// Adder that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Values passed to successful and failed calls alike.
    #[must_use]
    pub fn added(&self) -> Vec<String> {
        lock(&self.added).clone()
    }
}

#[async_trait]
impl LinkAdder for RecordingAdder {
    async fn add_torrent_from_link(&self, value: &str) -> Result<(), LinkError> {
        lock(&self.added).push(value.to_string());
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LinkError::Rejected {
                reason: "scripted rejection".to_string(),
            });
        }
        Ok(())
    }
}

/// Navigator that counts calls.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    resets: AtomicUsize,
    reloads: AtomicUsize,
}

impl RecordingNavigator {
    /// Fresh navigator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls to `reset_to_home`.
    #[must_use]
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// Calls to `reload`.
    #[must_use]
    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn reset_to_home(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}
