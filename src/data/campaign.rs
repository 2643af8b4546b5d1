//! Instance and campaign snapshots, and cross-instance aggregation.
//!
//! This module turns the per-instance snapshots of one cycle into a campaign
//! summary and evaluates the warning rules against both.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::health::{evaluate_instance, evaluate_summary, Thresholds, WarningRecord};
use super::plot::PlotSample;
use super::status::TypedStatusRecord;
use crate::engine::{CampaignRoot, DeltaReport};
use crate::probe::{Liveness, ResourceUsage, SystemInfo};

/// How much of an instance's status file could be used this cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataHealth {
    #[default]
    Complete,
    /// Parsed, but a required field is missing or did not coerce.
    Incomplete,
    /// The status file is missing or could not be read.
    Unreadable,
}

impl DataHealth {
    pub fn is_degraded(&self) -> bool {
        !matches!(self, DataHealth::Complete)
    }
}

/// Everything known about one instance at one poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    /// Directory name; unique within the campaign.
    pub id: String,
    pub dir: PathBuf,
    pub record: TypedStatusRecord,
    pub liveness: Liveness,
    pub resources: Option<ResourceUsage>,
    pub plot: Vec<PlotSample>,
    pub warnings: Vec<WarningRecord>,
    pub data_health: DataHealth,
    /// Soft parse problems from the status and plot files.
    pub parse_warnings: Vec<String>,
    pub status_modified: Option<DateTime<Utc>>,
}

impl InstanceSnapshot {
    pub fn pid(&self) -> Option<u32> {
        self.record.u64("fuzzer_pid").and_then(|pid| u32::try_from(pid).ok())
    }

    pub fn execs(&self) -> Option<u64> {
        self.record.u64("execs_done")
    }

    pub fn crashes(&self) -> Option<u64> {
        self.record.u64("saved_crashes")
    }

    pub fn hangs(&self) -> Option<u64> {
        self.record.u64("saved_hangs")
    }

    pub fn speed(&self) -> Option<f64> {
        self.record.f64("execs_per_sec")
    }

    pub fn coverage(&self) -> Option<f64> {
        self.record.f64("bitmap_cvg")
    }

    pub fn stability(&self) -> Option<f64> {
        self.record.f64("stability")
    }

    pub fn run_time(&self) -> Option<Duration> {
        self.record.duration("run_time")
    }

    pub fn banner(&self) -> Option<&str> {
        self.record.text("afl_banner")
    }

    /// Latest activity: the record's `last_update`, else the file mtime.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        unix_time(self.record.u64("last_update")).or(self.status_modified)
    }

    /// Highest warning severity, if any.
    pub fn worst_severity(&self) -> Option<super::health::Severity> {
        self.warnings.iter().map(|w| w.severity).max()
    }
}

/// Converts a unix-seconds field to a timestamp. Zero means "never".
fn unix_time(secs: Option<u64>) -> Option<DateTime<Utc>> {
    let secs = i64::try_from(secs?).ok().filter(|s| *s > 0)?;
    DateTime::from_timestamp(secs, 0)
}

/// Aggregated campaign figures.
///
/// Liveness counts cover every instance. All other figures cover the
/// `included` instances: complete records, minus dead instances unless the
/// policy includes them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CampaignSummary {
    pub total_instances: usize,
    pub alive: usize,
    pub starting: usize,
    pub dead: usize,
    pub unknown: usize,
    pub degraded: usize,
    pub included: usize,

    pub total_execs: u64,
    pub total_runtime_secs: u64,
    pub total_crashes: u64,
    pub total_hangs: u64,
    pub max_coverage: Option<f64>,
    /// Sum of per-instance speed.
    pub total_speed: f64,
    /// `total_speed` divided by the included instance count.
    pub avg_speed: f64,
    /// Sum of per-instance speed over the last minute.
    pub current_speed: f64,

    pub total_corpus: u64,
    pub pending_total: u64,
    pub pending_favs: u64,
    pub avg_stability: Option<f64>,
    pub min_stability: Option<f64>,
    pub max_cycle: u64,
    pub avg_cycle: f64,
    pub total_edges: u64,

    pub last_activity: Option<DateTime<Utc>>,
    pub last_find: Option<DateTime<Utc>>,
    pub last_crash: Option<DateTime<Utc>>,

    /// Combined CPU usage of alive instances.
    pub cpu_percent: f64,
    /// Combined resident memory of alive instances.
    pub memory_bytes: u64,
}

/// Fold instance snapshots into a summary.
pub fn summarize(instances: &[InstanceSnapshot], include_dead: bool) -> CampaignSummary {
    let mut summary = CampaignSummary {
        total_instances: instances.len(),
        ..CampaignSummary::default()
    };

    let mut stabilities = Vec::new();
    let mut cycles = Vec::new();

    for instance in instances {
        match instance.liveness {
            Liveness::Alive => summary.alive += 1,
            Liveness::Starting => summary.starting += 1,
            Liveness::Dead => summary.dead += 1,
            Liveness::Unknown => summary.unknown += 1,
        }
        if instance.data_health.is_degraded() {
            summary.degraded += 1;
        }

        summary.last_activity = summary.last_activity.max(instance.last_activity());

        if instance.liveness == Liveness::Alive {
            if let Some(usage) = &instance.resources {
                summary.cpu_percent += usage.cpu_percent;
                summary.memory_bytes = summary.memory_bytes.saturating_add(usage.memory_bytes);
            }
        }

        let excluded = instance.liveness == Liveness::Dead && !include_dead;
        if excluded || instance.data_health.is_degraded() {
            continue;
        }
        summary.included += 1;

        // Counters come straight from the status file and may be garbage
        let record = &instance.record;
        summary.total_execs = summary.total_execs.saturating_add(instance.execs().unwrap_or(0));
        summary.total_runtime_secs = summary.total_runtime_secs.saturating_add(instance.run_time().map_or(0, |d| d.as_secs()));
        summary.total_crashes = summary.total_crashes.saturating_add(instance.crashes().unwrap_or(0));
        summary.total_hangs = summary.total_hangs.saturating_add(instance.hangs().unwrap_or(0));
        summary.total_speed += instance.speed().unwrap_or(0.0);
        summary.current_speed += record.f64("execs_ps_last_min").unwrap_or(0.0);
        summary.total_corpus = summary.total_corpus.saturating_add(record.u64("corpus_count").unwrap_or(0));
        summary.pending_total = summary.pending_total.saturating_add(record.u64("pending_total").unwrap_or(0));
        summary.pending_favs = summary.pending_favs.saturating_add(record.u64("pending_favs").unwrap_or(0));
        summary.total_edges = summary.total_edges.saturating_add(record.u64("edges_found").unwrap_or(0));

        if let Some(coverage) = instance.coverage() {
            summary.max_coverage = Some(summary.max_coverage.map_or(coverage, |m| m.max(coverage)));
        }
        if let Some(stability) = instance.stability() {
            stabilities.push(stability);
        }
        if let Some(cycle) = record.u64("cycles_done") {
            cycles.push(cycle);
        }

        summary.last_find = summary.last_find.max(unix_time(record.u64("last_find")));
        summary.last_crash = summary.last_crash.max(unix_time(record.u64("last_crash")));
    }

    if summary.included > 0 {
        summary.avg_speed = summary.total_speed / summary.included as f64;
    }
    if !stabilities.is_empty() {
        summary.avg_stability = Some(stabilities.iter().sum::<f64>() / stabilities.len() as f64);
        summary.min_stability = stabilities.iter().copied().reduce(f64::min);
    }
    if !cycles.is_empty() {
        summary.max_cycle = cycles.iter().copied().max().unwrap_or(0);
        summary.avg_cycle = cycles.iter().map(|&c| c as f64).sum::<f64>() / cycles.len() as f64;
    }

    summary
}

/// Compute the summary and evaluate warnings.
///
/// Each instance's `warnings` are replaced with its rule results. The
/// returned list holds campaign-level warnings, most severe first.
pub fn aggregate(
    instances: &mut [InstanceSnapshot],
    include_dead: bool,
    thresholds: &Thresholds,
) -> (CampaignSummary, Vec<WarningRecord>) {
    for instance in instances.iter_mut() {
        instance.warnings = evaluate_instance(instance, thresholds);
    }

    let summary = summarize(instances, include_dead);
    let mut warnings = evaluate_summary(&summary, thresholds);
    warnings.sort_by(|a, b| b.severity.cmp(&a.severity));

    (summary, warnings)
}

/// One fully built view of the campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignSnapshot {
    pub timestamp: DateTime<Utc>,
    pub root: CampaignRoot,
    /// Sorted by instance id.
    pub instances: Vec<InstanceSnapshot>,
    pub summary: CampaignSummary,
    /// Campaign-level warnings.
    pub warnings: Vec<WarningRecord>,
    pub delta: DeltaReport,
    pub system: Option<SystemInfo>,
}

impl CampaignSnapshot {
    pub fn instance(&self, id: &str) -> Option<&InstanceSnapshot> {
        self.instances.iter().find(|i| i.id == id)
    }

    /// Campaign and instance warnings together, most severe first.
    pub fn all_warnings(&self) -> Vec<&WarningRecord> {
        let mut all: Vec<&WarningRecord> = self
            .warnings
            .iter()
            .chain(self.instances.iter().flat_map(|i| i.warnings.iter()))
            .collect();
        all.sort_by(|a, b| b.severity.cmp(&a.severity));
        all
    }
}
