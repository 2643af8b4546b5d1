//! Rule-based health evaluation.
//!
//! Rules are evaluated against each instance's typed record and against the
//! campaign summary. A rule whose input field is missing or did not parse is
//! skipped for that instance.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::campaign::{CampaignSummary, DataHealth, InstanceSnapshot};
use super::duration::{format_duration, human};
use crate::probe::Liveness;

/// Thresholds for the warning rules.
///
/// These are configuration, loaded through [`Settings`](crate::settings::Settings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Timeout percentage (`total_tmout / execs_done`) that triggers a warning.
    pub timeout_ratio: f64,
    /// Executions per second below which an instance is slow.
    pub min_exec_speed: f64,
    /// Cycles without new finds that trigger a warning.
    pub cycles_wo_finds_warning: u64,
    /// Cycles without new finds that trigger critical status.
    pub cycles_wo_finds_critical: u64,
    /// Stability percentage below which a warning is raised.
    pub min_stability: f64,
    /// Slowest single execution above which an info note is raised.
    #[serde(with = "human")]
    pub slowest_exec: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            timeout_ratio: 10.0,
            min_exec_speed: 100.0,
            cycles_wo_finds_warning: 10,
            cycles_wo_finds_critical: 50,
            min_stability: 80.0,
            slowest_exec: Duration::from_millis(100),
        }
    }
}

/// Severity of a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

impl Severity {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Critical => "CRIT",
        }
    }
}

/// Stable identifier for a warning rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    InstanceDead,
    HighTimeoutRatio,
    SlowExecution,
    NoExecutionData,
    StalledCycles,
    LowStability,
    SlowestExecution,
    StatusIncomplete,
    StatusUnreadable,
    LivenessUnknown,
    DeadInstances,
    NoAliveInstances,
    NewCrashes,
    NotificationFailed,
}

impl WarningKind {
    /// Short label for display, matching the serialized name.
    pub fn label(&self) -> &'static str {
        match self {
            WarningKind::InstanceDead => "instance_dead",
            WarningKind::HighTimeoutRatio => "high_timeout_ratio",
            WarningKind::SlowExecution => "slow_execution",
            WarningKind::NoExecutionData => "no_execution_data",
            WarningKind::StalledCycles => "stalled_cycles",
            WarningKind::LowStability => "low_stability",
            WarningKind::SlowestExecution => "slowest_execution",
            WarningKind::StatusIncomplete => "status_incomplete",
            WarningKind::StatusUnreadable => "status_unreadable",
            WarningKind::LivenessUnknown => "liveness_unknown",
            WarningKind::DeadInstances => "dead_instances",
            WarningKind::NoAliveInstances => "no_alive_instances",
            WarningKind::NewCrashes => "new_crashes",
            WarningKind::NotificationFailed => "notification_failed",
        }
    }
}

/// One evaluated warning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarningRecord {
    pub severity: Severity,
    pub kind: WarningKind,
    /// Instance the warning is about; `None` for campaign-level warnings.
    pub instance: Option<String>,
    pub message: String,
}

impl WarningRecord {
    pub fn for_instance(
        instance: &str,
        severity: Severity,
        kind: WarningKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            instance: Some(instance.to_string()),
            message: message.into(),
        }
    }

    pub fn for_campaign(severity: Severity, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            instance: None,
            message: message.into(),
        }
    }
}

/// Evaluate the per-instance rule table.
pub fn evaluate_instance(instance: &InstanceSnapshot, thresholds: &Thresholds) -> Vec<WarningRecord> {
    let id = instance.id.as_str();
    let mut warnings = Vec::new();
    let mut push = |severity, kind, message: String| {
        warnings.push(WarningRecord::for_instance(id, severity, kind, message));
    };

    match instance.data_health {
        DataHealth::Complete => {}
        DataHealth::Incomplete => push(
            Severity::Warn,
            WarningKind::StatusIncomplete,
            "status file is missing required fields".to_string(),
        ),
        DataHealth::Unreadable => push(
            Severity::Warn,
            WarningKind::StatusUnreadable,
            "status file could not be read".to_string(),
        ),
    }

    match instance.liveness {
        Liveness::Dead => {
            push(Severity::Warn, WarningKind::InstanceDead, "instance is not running".to_string());
            // Performance rules describe a running process
            return warnings;
        }
        Liveness::Unknown => push(
            Severity::Info,
            WarningKind::LivenessUnknown,
            "process state could not be determined".to_string(),
        ),
        Liveness::Alive | Liveness::Starting => {}
    }

    let record = &instance.record;
    let execs = record.u64("execs_done");

    if let (Some(timeouts), Some(execs)) = (record.u64("total_tmout"), execs) {
        if execs > 0 {
            let ratio = timeouts as f64 / execs as f64 * 100.0;
            if ratio >= thresholds.timeout_ratio {
                push(
                    Severity::Warn,
                    WarningKind::HighTimeoutRatio,
                    format!("high timeout ratio: {:.1}%", ratio),
                );
            }
        }
    }

    if let Some(speed) = record.f64("execs_per_sec") {
        if speed == 0.0 {
            if execs.is_some_and(|e| e > 0) {
                push(
                    Severity::Info,
                    WarningKind::NoExecutionData,
                    "no execution speed reported yet".to_string(),
                );
            }
        } else if speed < thresholds.min_exec_speed {
            push(
                Severity::Warn,
                WarningKind::SlowExecution,
                format!("slow execution: {:.1} execs/sec", speed),
            );
        }
    }

    if let Some(cycles) = record.u64("cycles_wo_finds") {
        if cycles > thresholds.cycles_wo_finds_critical {
            push(
                Severity::Critical,
                WarningKind::StalledCycles,
                format!("no new paths in {} cycles, consider stopping", cycles),
            );
        } else if cycles > thresholds.cycles_wo_finds_warning {
            push(
                Severity::Warn,
                WarningKind::StalledCycles,
                format!("no new paths in {} cycles", cycles),
            );
        }
    }

    if let Some(stability) = record.f64("stability") {
        if stability < thresholds.min_stability {
            push(
                Severity::Warn,
                WarningKind::LowStability,
                format!("low stability: {:.1}%", stability),
            );
        }
    }

    if let Some(slowest) = record.duration("slowest_exec_ms") {
        if slowest > thresholds.slowest_exec {
            push(
                Severity::Info,
                WarningKind::SlowestExecution,
                format!("slowest execution took {}", format_duration(slowest)),
            );
        }
    }

    warnings
}

/// Evaluate the campaign-level rules against an aggregated summary.
pub fn evaluate_summary(summary: &CampaignSummary, thresholds: &Thresholds) -> Vec<WarningRecord> {
    let mut warnings = Vec::new();

    if summary.dead > 0 {
        warnings.push(WarningRecord::for_campaign(
            Severity::Warn,
            WarningKind::DeadInstances,
            format!("{} of {} instances are dead", summary.dead, summary.total_instances),
        ));
    }

    if summary.total_instances > 0 && summary.alive == 0 && summary.starting == 0 {
        warnings.push(WarningRecord::for_campaign(
            Severity::Critical,
            WarningKind::NoAliveInstances,
            "no instance is running",
        ));
    }

    if summary.included > 0
        && summary.total_speed > 0.0
        && summary.avg_speed < thresholds.min_exec_speed
    {
        warnings.push(WarningRecord::for_campaign(
            Severity::Warn,
            WarningKind::SlowExecution,
            format!("average speed {:.1} execs/sec", summary.avg_speed),
        ));
    }

    warnings
}
