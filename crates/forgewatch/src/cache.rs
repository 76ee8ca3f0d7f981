//! Last published status, shared with consumers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::aggregator::PollOutcome;
use crate::status::PrinterStatus;

/// What consumers see between polls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedStatus {
    /// Most recent usable snapshot, kept across failed cycles.
    pub status: Option<PrinterStatus>,
    /// When the last cycle outcome was published.
    pub last_updated: Option<DateTime<Utc>>,
    /// False after a failed cycle.
    pub available: bool,
}

impl CachedStatus {
    /// Holding a snapshot that the latest cycle could not refresh.
    pub fn is_stale(&self) -> bool {
        !self.available && self.status.is_some()
    }

    /// The value to publish after `outcome`.
    pub fn next(&self, outcome: &PollOutcome, now: DateTime<Utc>) -> Self {
        match outcome.status() {
            Some(status) => Self {
                status: Some(status.clone()),
                last_updated: Some(now),
                available: true,
            },
            None => Self {
                status: self.status.clone(),
                last_updated: Some(now),
                available: false,
            },
        }
    }
}

/// Single-writer holder of the current [`CachedStatus`].
///
/// Each publish swaps in a whole new value, so readers never see a mix of two
/// cycles.
#[derive(Debug)]
pub struct StatusCache {
    tx: watch::Sender<CachedStatus>,
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusCache {
    /// Empty cache: no status, unavailable.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(CachedStatus::default());
        Self { tx }
    }

    /// Copy of the current value.
    pub fn current(&self) -> CachedStatus {
        self.tx.borrow().clone()
    }

    /// Fold a cycle outcome into the cache and return what was published.
    pub fn publish(&self, outcome: &PollOutcome) -> CachedStatus {
        let next = self.tx.borrow().next(outcome, Utc::now());
        self.tx.send_replace(next.clone());
        next
    }

    /// Receiver notified on every publish.
    pub fn subscribe(&self) -> watch::Receiver<CachedStatus> {
        self.tx.subscribe()
    }
}
