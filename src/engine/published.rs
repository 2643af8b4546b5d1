//! The published campaign view shared with every consumer.
//!
//! The scheduler is the only writer. Readers load the current [`Published`]
//! value without locking; each cycle swaps in a new one.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::watch;

use crate::data::CampaignSnapshot;

/// Freshness of the published view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    /// No cycle has completed yet.
    NotReady,
    Fresh,
    /// Recent cycles failed; the snapshot is the last good one.
    Stale,
}

impl PublishStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PublishStatus::NotReady => "not ready",
            PublishStatus::Fresh => "fresh",
            PublishStatus::Stale => "stale",
        }
    }
}

/// What readers see.
#[derive(Debug, Clone, Default)]
pub struct Published {
    /// Last successfully built snapshot.
    pub snapshot: Option<Arc<CampaignSnapshot>>,
    pub stale: bool,
    pub consecutive_failures: u32,
    /// Error from the most recent failed cycle, cleared on success.
    pub last_error: Option<String>,
    /// Cycles attempted so far.
    pub cycles: u64,
}

impl Published {
    pub fn status(&self) -> PublishStatus {
        match (&self.snapshot, self.stale) {
            (None, _) => PublishStatus::NotReady,
            (Some(_), true) => PublishStatus::Stale,
            (Some(_), false) => PublishStatus::Fresh,
        }
    }
}

/// Cloneable read accessor for the published view.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    current: Arc<ArcSwap<Published>>,
    cycles: Arc<watch::Sender<u64>>,
}

impl Default for SnapshotHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            current: Arc::new(ArcSwap::from_pointee(Published::default())),
            cycles: Arc::new(tx),
        }
    }

    /// The current published view.
    pub fn load(&self) -> Arc<Published> {
        self.current.load_full()
    }

    /// The current snapshot, if any cycle has succeeded.
    pub fn snapshot(&self) -> Option<Arc<CampaignSnapshot>> {
        self.current.load().snapshot.clone()
    }

    /// Receiver that changes after every cycle.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.cycles.subscribe()
    }

    /// Replace the published view with a freshly built snapshot.
    pub(crate) fn publish(&self, snapshot: Arc<CampaignSnapshot>) {
        let previous = self.current.load();
        let cycles = previous.cycles + 1;
        self.current.store(Arc::new(Published {
            snapshot: Some(snapshot),
            stale: false,
            consecutive_failures: 0,
            last_error: None,
            cycles,
        }));
        self.cycles.send_replace(cycles);
    }

    /// Record a failed cycle. The previous snapshot is kept and marked stale
    /// once `stale_after` consecutive failures have occurred.
    pub(crate) fn record_failure(&self, error: String, stale_after: u32) -> u32 {
        let previous = self.current.load_full();
        let failures = previous.consecutive_failures + 1;
        let cycles = previous.cycles + 1;
        self.current.store(Arc::new(Published {
            snapshot: previous.snapshot.clone(),
            stale: failures >= stale_after,
            consecutive_failures: failures,
            last_error: Some(error),
            cycles,
        }));
        self.cycles.send_replace(cycles);
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CampaignSummary;
    use crate::engine::{CampaignRoot, DeltaReport, DiscoveryMode};
    use chrono::Utc;

    fn snapshot() -> Arc<CampaignSnapshot> {
        Arc::new(CampaignSnapshot {
            timestamp: Utc::now(),
            root: CampaignRoot {
                path: "/out".into(),
                mode: DiscoveryMode::Single,
            },
            instances: Vec::new(),
            summary: CampaignSummary::default(),
            warnings: Vec::new(),
            delta: DeltaReport::default(),
            system: None,
        })
    }

    #[test]
    fn test_not_ready_before_first_publish() {
        let handle = SnapshotHandle::new();
        assert_eq!(handle.load().status(), PublishStatus::NotReady);
        assert!(handle.snapshot().is_none());
    }

    #[test]
    fn test_publish_makes_fresh() {
        let handle = SnapshotHandle::new();
        let reader = handle.clone();
        handle.publish(snapshot());
        assert_eq!(reader.load().status(), PublishStatus::Fresh);
        assert_eq!(reader.load().cycles, 1);
    }

    #[test]
    fn test_failures_mark_stale_but_keep_snapshot() {
        let handle = SnapshotHandle::new();
        handle.publish(snapshot());

        assert_eq!(handle.record_failure("root gone".to_string(), 2), 1);
        assert_eq!(handle.load().status(), PublishStatus::Fresh);

        assert_eq!(handle.record_failure("root gone".to_string(), 2), 2);
        let published = handle.load();
        assert_eq!(published.status(), PublishStatus::Stale);
        assert!(published.snapshot.is_some());
        assert_eq!(published.last_error.as_deref(), Some("root gone"));

        handle.publish(snapshot());
        assert_eq!(handle.load().status(), PublishStatus::Fresh);
        assert_eq!(handle.load().consecutive_failures, 0);
    }

    #[test]
    fn test_readers_hold_old_snapshot() {
        let handle = SnapshotHandle::new();
        handle.publish(snapshot());
        let held = handle.snapshot().unwrap();
        handle.publish(snapshot());
        let current = handle.snapshot().unwrap();
        assert!(!Arc::ptr_eq(&held, &current));
    }

    #[tokio::test]
    async fn test_subscribers_see_cycles() {
        let handle = SnapshotHandle::new();
        let mut rx = handle.subscribe();
        handle.publish(snapshot());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
    }
}
