//! Plain-text campaign report, printed by one-shot mode.

use std::fmt::Write as _;
use std::io::Write;

use chrono::{DateTime, Local, Utc};

use super::SnapshotConsumer;
use crate::data::duration::format_span;
use crate::data::{CampaignSnapshot, InstanceSnapshot};
use crate::engine::{DiscoveryMode, PublishStatus, Published};

/// Render the full report: summary, instance table and warnings.
pub fn render_report(snapshot: &CampaignSnapshot) -> String {
    let mut out = String::new();
    let summary = &snapshot.summary;

    let mode = match snapshot.root.mode {
        DiscoveryMode::Single => "single instance",
        DiscoveryMode::SyncDirectory => "sync directory",
    };
    let _ = writeln!(out, "fuzzwatch campaign report");
    let _ = writeln!(out, "Root:        {} ({})", snapshot.root.path.display(), mode);
    let _ = writeln!(out, "Taken:       {}", local_time(snapshot.timestamp));
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "Instances:   {} total, {} alive, {} starting, {} dead, {} unknown",
        summary.total_instances, summary.alive, summary.starting, summary.dead, summary.unknown
    );
    if summary.degraded > 0 {
        let _ = writeln!(out, "             {} with unreadable or incomplete data", summary.degraded);
    }
    let _ = writeln!(
        out,
        "Executions:  {} ({:.2}/s total, {:.2}/s avg, {:.2}/s last minute)",
        group_digits(summary.total_execs),
        summary.total_speed,
        summary.avg_speed,
        summary.current_speed
    );
    let crash_delta = if snapshot.delta.baseline || snapshot.delta.new_crashes == 0 {
        String::new()
    } else {
        format!(" (+{} since last cycle)", snapshot.delta.new_crashes)
    };
    let _ = writeln!(out, "Crashes:     {}{}", summary.total_crashes, crash_delta);
    let _ = writeln!(out, "Hangs:       {}", summary.total_hangs);
    let _ = writeln!(out, "Coverage:    {}", percent(summary.max_coverage));
    if let (Some(avg), Some(min)) = (summary.avg_stability, summary.min_stability) {
        let _ = writeln!(out, "Stability:   {:.2}% avg, {:.2}% min", avg, min);
    }
    let _ = writeln!(
        out,
        "Corpus:      {} ({} pending, {} favoured)",
        summary.total_corpus, summary.pending_total, summary.pending_favs
    );
    let _ = writeln!(
        out,
        "Cycles:      {} max, {:.1} avg",
        summary.max_cycle, summary.avg_cycle
    );
    let _ = writeln!(
        out,
        "Run time:    {}",
        format_span(std::time::Duration::from_secs(summary.total_runtime_secs))
    );
    let _ = writeln!(out, "Last find:   {}", ago(snapshot.timestamp, summary.last_find));
    let _ = writeln!(out, "Last crash:  {}", ago(snapshot.timestamp, summary.last_crash));
    if let Some(system) = &snapshot.system {
        let _ = writeln!(
            out,
            "Host:        {} CPUs at {:.1}%, memory {:.1}% used",
            system.cpu_count,
            system.cpu_percent,
            system.memory_percent()
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<20} {:<9} {:>14} {:>10} {:>9} {:>8} {:>6} {:>8}",
        "INSTANCE", "STATE", "EXECS", "EXEC/S", "COVERAGE", "CRASHES", "HANGS", "STAB"
    );
    for instance in &snapshot.instances {
        let _ = writeln!(out, "{}", instance_row(instance));
    }

    let warnings = snapshot.all_warnings();
    let _ = writeln!(out);
    if warnings.is_empty() {
        let _ = writeln!(out, "No warnings");
    } else {
        let _ = writeln!(out, "Warnings:");
        for warning in warnings {
            let scope = warning.instance.as_deref().unwrap_or("campaign");
            let _ = writeln!(
                out,
                "  [{}] {}: {}",
                warning.severity.symbol(),
                scope,
                warning.message
            );
        }
    }

    out
}

fn instance_row(instance: &InstanceSnapshot) -> String {
    let mut state = instance.liveness.label().to_string();
    if instance.data_health.is_degraded() {
        state.push('*');
    }
    format!(
        "{:<20} {:<9} {:>14} {:>10} {:>9} {:>8} {:>6} {:>8}",
        truncate(&instance.id, 20),
        state,
        instance.execs().map(group_digits).unwrap_or_else(|| "-".to_string()),
        instance.speed().map(|s| format!("{:.2}", s)).unwrap_or_else(|| "-".to_string()),
        percent(instance.coverage()),
        opt(instance.crashes()),
        opt(instance.hangs()),
        percent(instance.stability()),
    )
}

fn opt(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v))
        .unwrap_or_else(|| "-".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}~", kept)
    }
}

/// 1234567 -> "1,234,567".
pub(crate) fn group_digits(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn local_time(t: DateTime<Utc>) -> String {
    t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn ago(now: DateTime<Utc>, then: Option<DateTime<Utc>>) -> String {
    match then {
        None => "never".to_string(),
        Some(then) => match (now - then).to_std() {
            Ok(elapsed) => format!("{} ago", format_span(elapsed)),
            Err(_) => local_time(then),
        },
    }
}

/// Writes the text report to an output stream.
pub struct TextReport<W> {
    out: W,
}

impl<W: Write> TextReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W> std::fmt::Debug for TextReport<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextReport").finish_non_exhaustive()
    }
}

impl<W: Write + Send> SnapshotConsumer for TextReport<W> {
    fn name(&self) -> &str {
        "text-report"
    }

    fn consume(&mut self, published: &Published) -> anyhow::Result<()> {
        let Some(snapshot) = &published.snapshot else {
            anyhow::bail!("No campaign snapshot available yet");
        };
        if published.status() == PublishStatus::Stale {
            writeln!(
                self.out,
                "WARNING: data is stale after {} failed cycle(s): {}",
                published.consecutive_failures,
                published.last_error.as_deref().unwrap_or("unknown error")
            )?;
        }
        self.out.write_all(render_report(snapshot).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::status::{parse_status_str, DEFAULT_REQUIRED_FIELDS};
    use crate::data::{CampaignSummary, DataHealth, Severity, WarningKind, WarningRecord};
    use crate::engine::{CampaignRoot, DeltaReport};
    use crate::probe::Liveness;
    use std::sync::Arc;

    fn snapshot() -> CampaignSnapshot {
        let main = InstanceSnapshot {
            id: "main".to_string(),
            record: parse_status_str(
                "execs_done : 1000000\nrun_time : 3600\nexecs_per_sec : 500.5\nbitmap_cvg : 45.20%\nsaved_crashes : 3\nsaved_hangs : 1\n",
                DEFAULT_REQUIRED_FIELDS,
            )
            .typed,
            liveness: Liveness::Alive,
            ..InstanceSnapshot::default()
        };
        let broken = InstanceSnapshot {
            id: "secondary".to_string(),
            liveness: Liveness::Dead,
            data_health: DataHealth::Unreadable,
            warnings: vec![WarningRecord::for_instance(
                "secondary",
                Severity::Warn,
                WarningKind::InstanceDead,
                "instance is not running",
            )],
            ..InstanceSnapshot::default()
        };
        CampaignSnapshot {
            timestamp: Utc::now(),
            root: CampaignRoot {
                path: "/out".into(),
                mode: DiscoveryMode::SyncDirectory,
            },
            instances: vec![main, broken],
            summary: CampaignSummary {
                total_instances: 2,
                alive: 1,
                dead: 1,
                degraded: 1,
                total_execs: 1_000_000,
                total_crashes: 3,
                max_coverage: Some(45.2),
                ..CampaignSummary::default()
            },
            warnings: Vec::new(),
            delta: DeltaReport {
                new_crashes: 1,
                ..DeltaReport::default()
            },
            system: None,
        }
    }

    #[test]
    fn test_report_sections() {
        let report = render_report(&snapshot());
        assert!(report.contains("Root:        /out (sync directory)"));
        assert!(report.contains("2 total, 1 alive, 0 starting, 1 dead, 0 unknown"));
        assert!(report.contains("Executions:  1,000,000"));
        assert!(report.contains("Crashes:     3 (+1 since last cycle)"));
        assert!(report.contains("Coverage:    45.20%"));
        assert!(report.contains("Last crash:  never"));
        assert!(report.contains("[WARN] secondary: instance is not running"));
    }

    #[test]
    fn test_instance_rows() {
        let report = render_report(&snapshot());
        let main = report.lines().find(|l| l.starts_with("main")).unwrap();
        assert!(main.contains("alive"));
        assert!(main.contains("1,000,000"));
        assert!(main.contains("500.50"));
        let secondary = report.lines().find(|l| l.starts_with("secondary")).unwrap();
        assert!(secondary.contains("dead*"));
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits(0), "0");
        assert_eq!(group_digits(999), "999");
        assert_eq!(group_digits(1000), "1,000");
        assert_eq!(group_digits(1234567), "1,234,567");
    }

    #[test]
    fn test_consumer_needs_snapshot() {
        let mut report = TextReport::new(Vec::new());
        assert!(report.consume(&Published::default()).is_err());

        let published = Published {
            snapshot: Some(Arc::new(snapshot())),
            stale: true,
            consecutive_failures: 3,
            last_error: Some("campaign root not found: /out".to_string()),
            cycles: 4,
        };
        report.consume(&published).unwrap();
        let text = String::from_utf8(report.into_inner()).unwrap();
        assert!(text.starts_with("WARNING: data is stale after 3 failed cycle(s)"));
        assert!(text.contains("fuzzwatch campaign report"));
    }
}
