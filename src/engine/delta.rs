//! Inter-cycle delta tracking.
//!
//! Counters are compared against the previous cycle's persisted state. A
//! counter that went down means the instance restarted, so the new value is
//! the delta.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::StateStore;
use crate::data::InstanceSnapshot;
use crate::error::StoreError;

/// Counters tracked per instance and for the campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceCounters {
    pub crashes: u64,
    pub hangs: u64,
    pub execs: u64,
}

impl InstanceCounters {
    fn delta_from(&self, previous: &InstanceCounters) -> InstanceCounters {
        InstanceCounters {
            crashes: counter_delta(previous.crashes, self.crashes),
            hangs: counter_delta(previous.hangs, self.hangs),
            execs: counter_delta(previous.execs, self.execs),
        }
    }
}

impl std::ops::AddAssign for InstanceCounters {
    fn add_assign(&mut self, other: Self) {
        // Corrupt status files can report counters near u64::MAX
        self.crashes = self.crashes.saturating_add(other.crashes);
        self.hangs = self.hangs.saturating_add(other.hangs);
        self.execs = self.execs.saturating_add(other.execs);
    }
}

/// What survives between cycles, and across restarts of the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviousCycleState {
    pub timestamp: DateTime<Utc>,
    pub root: PathBuf,
    pub instances: BTreeMap<String, InstanceCounters>,
    pub total: InstanceCounters,
}

/// Growth of a monotonic counter. A decrease is a reset, so the delta is the
/// current value.
pub fn counter_delta(previous: u64, current: u64) -> u64 {
    if current < previous {
        current
    } else {
        current - previous
    }
}

/// Deltas for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeltaReport {
    pub new_crashes: u64,
    pub new_hangs: u64,
    /// Crashes across every tracked instance, dead ones included. This is
    /// the basis `new_crashes` is measured against, unlike the summary total
    /// which follows the dead-instance policy.
    pub total_crashes: u64,
    /// Per-instance deltas.
    pub instances: BTreeMap<String, InstanceCounters>,
    /// True when there was no previous state; all deltas are zero.
    pub baseline: bool,
    /// Campaign executions per second since the previous cycle.
    pub exec_rate: Option<f64>,
}

/// Compute the deltas for this cycle and the state to persist for the next.
///
/// Degraded instances carry their previous counters forward. A degraded
/// instance with no previous counters is left out until it can be read.
pub fn compute(
    previous: Option<&PreviousCycleState>,
    root: &Path,
    instances: &[InstanceSnapshot],
    now: DateTime<Utc>,
) -> (DeltaReport, PreviousCycleState) {
    let mut counters = BTreeMap::new();
    for instance in instances {
        let carried = previous.and_then(|p| p.instances.get(&instance.id));
        let current = if instance.data_health.is_degraded() {
            match carried {
                Some(counters) => *counters,
                None => continue,
            }
        } else {
            InstanceCounters {
                crashes: instance.crashes().unwrap_or(0),
                hangs: instance.hangs().unwrap_or(0),
                execs: instance.execs().unwrap_or(0),
            }
        };
        counters.insert(instance.id.clone(), current);
    }

    let mut total = InstanceCounters::default();
    for c in counters.values() {
        total += *c;
    }

    let report = match previous {
        None => DeltaReport {
            instances: counters.keys().map(|id| (id.clone(), InstanceCounters::default())).collect(),
            baseline: true,
            total_crashes: total.crashes,
            ..DeltaReport::default()
        },
        Some(previous) => {
            let per_instance: BTreeMap<String, InstanceCounters> = counters
                .iter()
                .map(|(id, current)| {
                    // An instance new to an existing baseline contributes everything
                    let prior = previous.instances.get(id).copied().unwrap_or_default();
                    (id.clone(), current.delta_from(&prior))
                })
                .collect();

            // Summed per instance: an instance that vanished is not a reset
            let mut campaign = InstanceCounters::default();
            for delta in per_instance.values() {
                campaign += *delta;
            }

            let elapsed = (now - previous.timestamp).num_milliseconds() as f64 / 1000.0;
            let exec_rate = (elapsed > 0.0).then(|| campaign.execs as f64 / elapsed);

            DeltaReport {
                new_crashes: campaign.crashes,
                new_hangs: campaign.hangs,
                total_crashes: total.crashes,
                instances: per_instance,
                baseline: false,
                exec_rate,
            }
        }
    };

    let state = PreviousCycleState {
        timestamp: now,
        root: root.to_path_buf(),
        instances: counters,
        total,
    };
    (report, state)
}

/// Owns the previous-cycle state and its persistence.
///
/// The store is read once, on the first cycle; afterwards the in-memory
/// state is authoritative and written back at the end of every cycle.
#[derive(Debug)]
pub struct DeltaTracker {
    store: Box<dyn StateStore>,
    previous: Option<PreviousCycleState>,
    loaded: bool,
}

impl DeltaTracker {
    pub fn new(store: Box<dyn StateStore>) -> Self {
        Self {
            store,
            previous: None,
            loaded: false,
        }
    }

    pub fn previous(&self) -> Option<&PreviousCycleState> {
        self.previous.as_ref()
    }

    /// Compute this cycle's deltas and persist the new state.
    pub fn observe(
        &mut self,
        root: &Path,
        instances: &[InstanceSnapshot],
        now: DateTime<Utc>,
    ) -> DeltaReport {
        if !self.loaded {
            self.previous = match self.store.load() {
                Ok(state) => state,
                Err(StoreError::Corrupt(e)) => {
                    warn!(error = %e, "Persisted delta state is corrupt, starting from zero");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load persisted delta state");
                    None
                }
            };
            self.loaded = true;
        }

        let (report, state) = compute(self.previous.as_ref(), root, instances, now);
        if let Err(e) = self.store.save(&state) {
            warn!(error = %e, "Failed to persist delta state");
        } else {
            debug!(total_crashes = state.total.crashes, "Persisted delta state");
        }
        self.previous = Some(state);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::status::{parse_status_str, DEFAULT_REQUIRED_FIELDS};
    use crate::data::DataHealth;
    use crate::engine::store::{FileStateStore, MemoryStateStore};
    use tempfile::TempDir;

    fn instance(id: &str, crashes: u64) -> InstanceSnapshot {
        let content = format!("execs_done : 100\nrun_time : 1\nsaved_crashes : {}\n", crashes);
        InstanceSnapshot {
            id: id.to_string(),
            record: parse_status_str(&content, DEFAULT_REQUIRED_FIELDS).typed,
            ..InstanceSnapshot::default()
        }
    }

    fn previous(instances: &[(&str, u64)]) -> PreviousCycleState {
        let instances: BTreeMap<String, InstanceCounters> = instances
            .iter()
            .map(|(id, crashes)| {
                (
                    id.to_string(),
                    InstanceCounters {
                        crashes: *crashes,
                        hangs: 0,
                        execs: 100,
                    },
                )
            })
            .collect();
        let mut total = InstanceCounters::default();
        for c in instances.values() {
            total += *c;
        }
        PreviousCycleState {
            timestamp: Utc::now() - chrono::Duration::seconds(10),
            root: PathBuf::from("/out"),
            instances,
            total,
        }
    }

    #[test]
    fn test_counter_delta() {
        assert_eq!(counter_delta(5, 8), 3);
        assert_eq!(counter_delta(5, 5), 0);
        assert_eq!(counter_delta(5, 0), 0);
        assert_eq!(counter_delta(5, 2), 2);
    }

    #[test]
    fn test_reset_to_zero_reports_zero() {
        let prev = previous(&[("main", 5)]);
        let (report, state) = compute(Some(&prev), Path::new("/out"), &[instance("main", 0)], Utc::now());
        assert_eq!(report.new_crashes, 0);
        assert_eq!(state.total.crashes, 0);
    }

    #[test]
    fn test_growth_after_reset_is_reported() {
        let prev = previous(&[("main", 0)]);
        let (report, _) = compute(Some(&prev), Path::new("/out"), &[instance("main", 3)], Utc::now());
        assert_eq!(report.new_crashes, 3);
        assert_eq!(report.instances["main"].crashes, 3);
    }

    #[test]
    fn test_first_cycle_is_baseline() {
        let (report, state) = compute(None, Path::new("/out"), &[instance("main", 7)], Utc::now());
        assert!(report.baseline);
        assert_eq!(report.new_crashes, 0);
        assert_eq!(report.exec_rate, None);
        assert_eq!(state.total.crashes, 7);
    }

    #[test]
    fn test_new_instance_contributes_its_count() {
        let prev = previous(&[("main", 2)]);
        let (report, _) = compute(
            Some(&prev),
            Path::new("/out"),
            &[instance("main", 2), instance("secondary", 4)],
            Utc::now(),
        );
        assert_eq!(report.instances["main"].crashes, 0);
        assert_eq!(report.instances["secondary"].crashes, 4);
        assert_eq!(report.new_crashes, 4);
    }

    #[test]
    fn test_removed_instance_is_not_a_reset() {
        let prev = previous(&[("a", 5), ("b", 5)]);
        let (report, state) = compute(Some(&prev), Path::new("/out"), &[instance("a", 5)], Utc::now());
        assert_eq!(report.new_crashes, 0);
        assert_eq!(report.instances["a"].crashes, 0);
        assert!(!report.instances.contains_key("b"));
        assert_eq!(report.total_crashes, 5);
        assert_eq!(state.total.crashes, 5);
    }

    #[test]
    fn test_counters_saturate() {
        let mut total = InstanceCounters {
            crashes: 1,
            hangs: 0,
            execs: u64::MAX,
        };
        total += InstanceCounters {
            crashes: 2,
            hangs: 0,
            execs: u64::MAX,
        };
        assert_eq!(total.execs, u64::MAX);
        assert_eq!(total.crashes, 3);
    }

    #[test]
    fn test_degraded_instance_carries_counters_forward() {
        let prev = previous(&[("main", 6)]);
        let mut broken = instance("main", 0);
        broken.data_health = DataHealth::Unreadable;

        let (report, state) = compute(Some(&prev), Path::new("/out"), &[broken], Utc::now());
        assert_eq!(report.new_crashes, 0);
        assert_eq!(state.instances["main"].crashes, 6);
    }

    #[test]
    fn test_exec_rate_since_previous_cycle() {
        let prev = previous(&[("main", 0)]);
        let now = prev.timestamp + chrono::Duration::seconds(10);
        let mut current = instance("main", 0);
        current.record = parse_status_str(
            "execs_done : 1100\nrun_time : 1\nsaved_crashes : 0\n",
            DEFAULT_REQUIRED_FIELDS,
        )
        .typed;
        let (report, _) = compute(Some(&prev), Path::new("/out"), &[current], now);
        assert_eq!(report.exec_rate, Some(100.0));
    }

    #[test]
    fn test_tracker_persists_across_restarts() {
        let dir = TempDir::new().unwrap();
        let root = Path::new("/out");

        let mut tracker = DeltaTracker::new(Box::new(FileStateStore::for_campaign(dir.path(), root)));
        let first = tracker.observe(root, &[instance("main", 1)], Utc::now());
        assert!(first.baseline);

        // A new monitor process picks up the stored counters
        let mut restarted =
            DeltaTracker::new(Box::new(FileStateStore::for_campaign(dir.path(), root)));
        let report = restarted.observe(root, &[instance("main", 4)], Utc::now());
        assert!(!report.baseline);
        assert_eq!(report.new_crashes, 3);
    }

    #[test]
    fn test_tracker_keeps_state_in_memory() {
        let root = Path::new("/out");
        let mut tracker = DeltaTracker::new(Box::new(MemoryStateStore::default()));
        tracker.observe(root, &[instance("main", 5)], Utc::now());
        let report = tracker.observe(root, &[instance("main", 0)], Utc::now());
        assert_eq!(report.new_crashes, 0);
        assert_eq!(tracker.previous().unwrap().total.crashes, 0);
    }
}
