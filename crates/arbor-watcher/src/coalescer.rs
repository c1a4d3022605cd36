//! Debouncing of raw file notifications into settled batches

use arbor_core::{ChangeSet, FileChange};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Time source for the debounce timer.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalescerState {
    /// Nothing pending.
    Idle,
    /// Changes pending, waiting for the quiet period.
    Accumulating,
}

#[derive(Default)]
struct Pending {
    changes: ChangeSet,
    last_change: Option<Instant>,
}

/// Merges bursts of changes per path and releases them as one batch once no
/// new change has arrived for the quiet period.
///
/// Inserts and drains share one lock, so a change is either in the batch
/// being drained or stays pending for the next one.
pub struct ChangeCoalescer {
    quiet_period: Duration,
    clock: Arc<dyn Clock>,
    pending: Mutex<Pending>,
}

impl std::fmt::Debug for ChangeCoalescer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeCoalescer")
            .field("quiet_period", &self.quiet_period)
            .field("pending", &self.pending_len())
            .finish()
    }
}

impl ChangeCoalescer {
    pub fn new(quiet_period: Duration) -> Self {
        Self::with_clock(quiet_period, Arc::new(SystemClock))
    }

    pub fn with_clock(quiet_period: Duration, clock: Arc<dyn Clock>) -> Self {
        ChangeCoalescer {
            quiet_period,
            clock,
            pending: Mutex::new(Pending::default()),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a change and restart the quiet period.
    pub fn push(&self, change: FileChange) {
        let mut pending = self.lock();
        debug!("Pending change: {:?}", change);
        pending.changes.push(change);
        pending.last_change = Some(self.clock.now());
    }

    /// Put a batch that could not be delivered back in front of whatever
    /// arrived since it was drained.
    pub fn requeue(&self, batch: Vec<FileChange>) {
        let mut pending = self.lock();
        let newer = std::mem::take(&mut pending.changes).into_changes();
        pending.changes = batch.into_iter().chain(newer).collect();
        if pending.last_change.is_none() {
            pending.last_change = Some(self.clock.now());
        }
    }

    /// Record a rename.
    ///
    /// A rename keeping the extension between two relevant paths stays a
    /// rename; otherwise it is a deletion of the old path and a creation of
    /// the new one, each only when that path is relevant.
    pub fn push_rename(&self, from: &Path, to: &Path, is_relevant: impl Fn(&Path) -> bool) {
        let old_relevant = is_relevant(from);
        let new_relevant = is_relevant(to);

        if old_relevant && new_relevant && from.extension() == to.extension() {
            self.push(FileChange::renamed(from, to));
            return;
        }
        if old_relevant {
            self.push(FileChange::deleted(from));
        }
        if new_relevant {
            self.push(FileChange::created(to));
        }
    }

    /// Emit the pending batch if the quiet period has elapsed.
    pub fn poll(&self) -> Option<Vec<FileChange>> {
        let mut pending = self.lock();
        let last_change = pending.last_change?;
        if self.clock.now().saturating_duration_since(last_change) < self.quiet_period {
            return None;
        }
        Self::drain(&mut pending)
    }

    /// Emit whatever is pending right away.
    pub fn flush(&self) -> Option<Vec<FileChange>> {
        Self::drain(&mut self.lock())
    }

    fn drain(pending: &mut Pending) -> Option<Vec<FileChange>> {
        pending.last_change = None;
        if pending.changes.is_empty() {
            return None;
        }
        let batch = std::mem::take(&mut pending.changes).into_changes();
        info!("Emitting batch of {} file changes", batch.len());
        Some(batch)
    }

    pub fn state(&self) -> CoalescerState {
        if self.lock().changes.is_empty() {
            CoalescerState::Idle
        } else {
            CoalescerState::Accumulating
        }
    }

    /// When the pending batch becomes due, if anything is pending.
    pub fn deadline(&self) -> Option<Instant> {
        let pending = self.lock();
        if pending.changes.is_empty() {
            return None;
        }
        pending.last_change.map(|t| t + self.quiet_period)
    }

    pub fn pending_len(&self) -> usize {
        self.lock().changes.len()
    }

    /// Poll on a fixed tick and forward each batch to `batches`.
    ///
    /// Returns when the receiving side is dropped.
    pub async fn run(self: Arc<Self>, batches: mpsc::Sender<Vec<FileChange>>) {
        let tick = (self.quiet_period / 4).max(Duration::from_millis(10));
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if batches.is_closed() {
                break;
            }
            if let Some(batch) = self.poll() {
                if let Err(mpsc::error::SendError(batch)) = batches.send(batch).await {
                    self.requeue(batch);
                    break;
                }
            }
        }
        debug!("Coalescer tick task stopped");
    }
}
