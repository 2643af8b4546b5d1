//! Historical tracking of published snapshots for sparklines and rates.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use super::campaign::CampaignSnapshot;

/// Maximum number of snapshots to keep.
const MAX_HISTORY_SIZE: usize = 60;

/// Tracks counters across snapshots for trend display.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// Execution counts per instance (instance id -> readings).
    pub instance_execs: HashMap<String, VecDeque<u64>>,
    /// Crash counts per instance.
    pub instance_crashes: HashMap<String, VecDeque<u64>>,
    /// Campaign execution totals.
    pub campaign_execs: VecDeque<u64>,
    /// Snapshot timestamps.
    pub timestamps: VecDeque<DateTime<Utc>>,
}

fn push_bounded<T>(values: &mut VecDeque<T>, value: T) {
    values.push_back(value);
    if values.len() > MAX_HISTORY_SIZE {
        values.pop_front();
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a snapshot. A snapshot already recorded (same timestamp) is ignored.
    pub fn record(&mut self, snapshot: &CampaignSnapshot) {
        if self.timestamps.back() == Some(&snapshot.timestamp) {
            return;
        }

        for instance in &snapshot.instances {
            if let Some(execs) = instance.execs() {
                push_bounded(self.instance_execs.entry(instance.id.clone()).or_default(), execs);
            }
            if let Some(crashes) = instance.crashes() {
                push_bounded(
                    self.instance_crashes.entry(instance.id.clone()).or_default(),
                    crashes,
                );
            }
        }

        // Instances that left the campaign
        self.instance_execs.retain(|id, _| snapshot.instance(id).is_some());
        self.instance_crashes.retain(|id, _| snapshot.instance(id).is_some());

        push_bounded(&mut self.campaign_execs, snapshot.summary.total_execs);
        push_bounded(&mut self.timestamps, snapshot.timestamp);
    }

    /// Sparkline of execution progress for one instance (0-7 per bar).
    pub fn execs_sparkline(&self, instance: &str) -> Vec<u8> {
        normalize_sparkline(self.instance_execs.get(instance))
    }

    /// Sparkline of campaign-wide execution progress.
    pub fn campaign_sparkline(&self) -> Vec<u8> {
        normalize_sparkline(Some(&self.campaign_execs))
    }

    /// Executions per second for one instance between the last two readings.
    pub fn exec_rate(&self, instance: &str) -> Option<f64> {
        self.rate(self.instance_execs.get(instance)?)
    }

    fn rate(&self, values: &VecDeque<u64>) -> Option<f64> {
        if values.len() < 2 || self.timestamps.len() < 2 {
            return None;
        }

        let current = *values.back()?;
        let previous = *values.get(values.len() - 2)?;
        let delta = current as i64 - previous as i64;

        let current_time = self.timestamps.back()?;
        let previous_time = self.timestamps.get(self.timestamps.len() - 2)?;
        let elapsed = (*current_time - *previous_time).num_milliseconds() as f64 / 1000.0;

        if elapsed > 0.0 {
            Some(delta as f64 / elapsed)
        } else {
            None
        }
    }
}

/// Normalize consecutive deltas to 0-7 for the eight bar levels.
fn normalize_sparkline(data: Option<&VecDeque<u64>>) -> Vec<u8> {
    let Some(values) = data else {
        return Vec::new();
    };

    if values.len() < 2 {
        return Vec::new();
    }

    let deltas: Vec<i64> =
        values.iter().zip(values.iter().skip(1)).map(|(a, b)| *b as i64 - *a as i64).collect();

    let max = deltas.iter().copied().max().unwrap_or(1).max(1);
    let min = deltas.iter().copied().min().unwrap_or(0).min(0);
    let range = (max - min).max(1) as f64;

    deltas
        .iter()
        .map(|&v| {
            let normalized = ((v - min) as f64 / range * 7.0) as u8;
            normalized.min(7)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::campaign::{CampaignSummary, InstanceSnapshot};
    use crate::data::status::{parse_status_str, DEFAULT_REQUIRED_FIELDS};
    use crate::engine::{CampaignRoot, DeltaReport, DiscoveryMode};
    use chrono::Duration;

    fn snapshot(at: DateTime<Utc>, instances: Vec<(&str, u64)>) -> CampaignSnapshot {
        let instances: Vec<InstanceSnapshot> = instances
            .into_iter()
            .map(|(id, execs)| InstanceSnapshot {
                id: id.to_string(),
                record: parse_status_str(&format!("execs_done : {}\n", execs), DEFAULT_REQUIRED_FIELDS)
                    .typed,
                ..InstanceSnapshot::default()
            })
            .collect();
        let total_execs = instances.iter().filter_map(|i| i.execs()).sum();
        CampaignSnapshot {
            timestamp: at,
            root: CampaignRoot {
                path: "/tmp/out".into(),
                mode: DiscoveryMode::SyncDirectory,
            },
            instances,
            summary: CampaignSummary {
                total_execs,
                ..CampaignSummary::default()
            },
            warnings: Vec::new(),
            delta: DeltaReport::default(),
            system: None,
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut h = History::new();
        let start = Utc::now();
        for i in 0..100 {
            h.record(&snapshot(start + Duration::seconds(i), vec![("main", i as u64)]));
        }
        assert_eq!(h.timestamps.len(), MAX_HISTORY_SIZE);
        assert_eq!(h.instance_execs["main"].len(), MAX_HISTORY_SIZE);
    }

    #[test]
    fn test_same_snapshot_recorded_once() {
        let mut h = History::new();
        let s = snapshot(Utc::now(), vec![("main", 10)]);
        h.record(&s);
        h.record(&s);
        assert_eq!(h.timestamps.len(), 1);
    }

    #[test]
    fn test_sparkline_needs_two_readings() {
        let mut h = History::new();
        h.record(&snapshot(Utc::now(), vec![("main", 10)]));
        assert!(h.execs_sparkline("main").is_empty());
        assert!(h.execs_sparkline("unknown").is_empty());
    }

    #[test]
    fn test_sparkline_constant_progress() {
        let mut h = History::new();
        let start = Utc::now();
        for i in 0..5 {
            h.record(&snapshot(start + Duration::seconds(i), vec![("main", i as u64 * 100)]));
        }
        let sparkline = h.execs_sparkline("main");
        assert_eq!(sparkline.len(), 4);
        assert!(sparkline.iter().all(|&v| v == sparkline[0]));
        assert_eq!(h.campaign_sparkline().len(), 4);
    }

    #[test]
    fn test_exec_rate_from_timestamps() {
        let mut h = History::new();
        let start = Utc::now();
        h.record(&snapshot(start, vec![("main", 1000)]));
        assert!(h.exec_rate("main").is_none());
        h.record(&snapshot(start + Duration::seconds(5), vec![("main", 6000)]));
        assert_eq!(h.exec_rate("main"), Some(1000.0));
    }

    #[test]
    fn test_departed_instances_dropped() {
        let mut h = History::new();
        let start = Utc::now();
        h.record(&snapshot(start, vec![("a", 1), ("b", 1)]));
        h.record(&snapshot(start + Duration::seconds(1), vec![("a", 2)]));
        assert!(!h.instance_execs.contains_key("b"));
    }
}
