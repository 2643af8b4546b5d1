//! Per-instance snapshot construction.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::discovery::InstanceDir;
use crate::data::plot::PLOT_FILE;
use crate::data::{
    parse_plot_file, parse_status_file, DataHealth, InstanceSnapshot, TypedStatusRecord,
    DEFAULT_REQUIRED_FIELDS, STATUS_FILE,
};
use crate::probe::{resolve, Liveness, LivenessInputs, ProcessProbe, ResourceSampler, SETUP_MARKER};

/// Builds one [`InstanceSnapshot`] from an instance directory.
///
/// Never fails: unreadable or incomplete status files produce a degraded
/// snapshot, and liveness is still resolved from file timestamps.
#[derive(Debug, Clone)]
pub struct InstanceBuilder {
    probe: Arc<dyn ProcessProbe>,
    sampler: Option<Arc<ResourceSampler>>,
    required_fields: Vec<String>,
    recency_window: Duration,
    plot_max_points: usize,
}

impl InstanceBuilder {
    pub fn new(probe: Arc<dyn ProcessProbe>) -> Self {
        Self {
            probe,
            sampler: None,
            required_fields: DEFAULT_REQUIRED_FIELDS.iter().map(|s| s.to_string()).collect(),
            recency_window: Duration::from_secs(60),
            plot_max_points: 1000,
        }
    }

    pub fn sampler(mut self, sampler: Arc<ResourceSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn required_fields(mut self, fields: Vec<String>) -> Self {
        self.required_fields = fields;
        self
    }

    pub fn recency_window(mut self, window: Duration) -> Self {
        self.recency_window = window;
        self
    }

    pub fn plot_max_points(mut self, max: usize) -> Self {
        self.plot_max_points = max;
        self
    }

    pub fn build(&self, dir: &InstanceDir, now: SystemTime) -> InstanceSnapshot {
        let status_path = dir.path.join(STATUS_FILE);
        let status_modified = modified(&status_path);
        let setup_modified = modified(&dir.path.join(SETUP_MARKER));

        let mut parse_warnings = Vec::new();
        let (record, data_health) = match parse_status_file(&status_path, &self.required_fields) {
            Ok(parsed) => {
                parse_warnings.extend(parsed.warnings);
                let health = if parsed.complete {
                    DataHealth::Complete
                } else {
                    DataHealth::Incomplete
                };
                (parsed.typed, health)
            }
            Err(e) => {
                debug!(instance = %dir.id, error = %e, "Status file unavailable");
                parse_warnings.push(e.to_string());
                (TypedStatusRecord::default(), DataHealth::Unreadable)
            }
        };

        let pid = record
            .u64("fuzzer_pid")
            .and_then(|pid| u32::try_from(pid).ok())
            .filter(|pid| *pid > 0);
        let inputs = LivenessInputs {
            pid,
            probe: pid.map(|pid| self.probe.probe(pid)),
            status_modified,
            setup_modified,
            now,
        };
        let liveness = resolve(&inputs, self.recency_window);

        // Sampling failure never changes the liveness result
        let resources = match (liveness, pid, &self.sampler) {
            (Liveness::Alive, Some(pid), Some(sampler)) => sampler.sample(pid),
            _ => None,
        };

        let plot = parse_plot_file(&dir.path.join(PLOT_FILE), self.plot_max_points);
        parse_warnings.extend(plot.warnings.into_iter().map(|w| format!("{}: {}", PLOT_FILE, w)));

        if data_health.is_degraded() {
            debug!(instance = %dir.id, ?data_health, ?liveness, "Instance data degraded");
        }

        InstanceSnapshot {
            id: dir.id.clone(),
            dir: dir.path.clone(),
            record,
            liveness,
            resources,
            plot: plot.samples,
            warnings: Vec::new(),
            data_health,
            parse_warnings,
            status_modified: status_modified.map(DateTime::<Utc>::from),
        }
    }

    /// Snapshot for an instance whose build did not complete (timed out or
    /// panicked). Liveness is unknown and the data unreadable.
    pub fn placeholder(dir: &InstanceDir, reason: impl Into<String>) -> InstanceSnapshot {
        InstanceSnapshot {
            id: dir.id.clone(),
            dir: dir.path.clone(),
            liveness: Liveness::Unknown,
            data_health: DataHealth::Unreadable,
            parse_warnings: vec![reason.into()],
            ..InstanceSnapshot::default()
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
