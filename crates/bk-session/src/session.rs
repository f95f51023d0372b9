use crate::snapshot::{snapshot_message, Snapshotter};
use bk_core::clock::{Clock, SystemClock};
use bk_core::config::SessionConfig;
use bk_core::error::Result;
use bk_outline::Node;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const DEFAULT_GOAL: u64 = 1000;

/// Both must be exceeded before a snapshot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionThresholds {
    /// Minimum time since the last snapshot.
    pub commit: Duration,
    /// Minimum time since the last observed change.
    pub change: Duration,
}

impl Default for SessionThresholds {
    fn default() -> Self {
        Self {
            commit: Duration::from_secs(30),
            change: Duration::from_secs(5),
        }
    }
}

impl SessionThresholds {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            commit: Duration::from_secs(config.commit_threshold_secs),
            change: Duration::from_secs(config.change_threshold_secs),
        }
    }
}

/// One progress report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Words written this session; negative after net deletions.
    pub words: i64,
    pub goal: u64,
    pub start: u64,
    pub total: u64,
    /// Nothing changed on disk since the previous tick.
    pub cached: bool,
    pub snapshot_taken: bool,
}

impl SessionStatus {
    pub fn goal_reached(&self) -> bool {
        self.words >= 0 && self.words as u64 >= self.goal
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " {}/{} - Session; {} start; {} total;",
            self.words, self.goal, self.start, self.total
        )?;
        if self.cached {
            write!(f, " (cached)")?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Session<S> {
    goal: u64,
    start: u64,
    clock: Arc<dyn Clock>,
    thresholds: SessionThresholds,
    last_snapshot: Instant,
    last_change: Option<Instant>,
    snapshotter: S,
}

impl<S: Snapshotter> Session<S> {
    /// `start` defaults to the outline's current word count, `goal` to
    /// [`DEFAULT_GOAL`].
    pub fn new(outline: &Node, snapshotter: S, goal: Option<u64>, start: Option<u64>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let start = start.unwrap_or_else(|| outline.count() as u64);
        Self {
            goal: goal.unwrap_or(DEFAULT_GOAL),
            start,
            last_snapshot: clock.now(),
            clock,
            thresholds: SessionThresholds::default(),
            last_change: None,
            snapshotter,
        }
    }

    /// Replace the clock; the snapshot timer restarts from its `now`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.last_snapshot = clock.now();
        self.clock = clock;
        self
    }

    pub fn with_thresholds(mut self, thresholds: SessionThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn goal(&self) -> u64 {
        self.goal
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn snapshotter(&self) -> &S {
        &self.snapshotter
    }

    /// Observe the outline once: record whether it changed, report progress
    /// and snapshot if due.
    pub fn tick(&mut self, outline: &Node) -> Result<SessionStatus> {
        let changed = outline.is_changed();
        let now = self.clock.now();
        if changed {
            self.last_change = Some(now);
        }
        let total = outline.count() as u64;
        let mut status = SessionStatus {
            words: total as i64 - self.start as i64,
            goal: self.goal,
            start: self.start,
            total,
            cached: !changed,
            snapshot_taken: false,
        };
        status.snapshot_taken = self.maybe_snapshot(now)?;
        Ok(status)
    }

    fn maybe_snapshot(&mut self, now: Instant) -> Result<bool> {
        if !self.snapshotter.is_repo() {
            return Ok(false);
        }
        let quiet = self
            .last_change
            .map_or(true, |t| now.saturating_duration_since(t) > self.thresholds.change);
        let due = now.saturating_duration_since(self.last_snapshot) > self.thresholds.commit;
        debug!(quiet, due, "snapshot check");
        if quiet && due && self.snapshotter.is_dirty()? {
            let message = snapshot_message();
            self.snapshotter.snapshot(&message)?;
            self.last_snapshot = now;
            info!(message = %message, "session snapshot");
            return Ok(true);
        }
        Ok(false)
    }
}
