//! JSON document form of the published view.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;

use super::SnapshotConsumer;
use crate::data::{
    CampaignSummary, DataHealth, InstanceSnapshot, TypedStatusRecord, WarningRecord,
};
use crate::engine::{DeltaReport, DiscoveryMode, PublishStatus, Published};
use crate::probe::{Liveness, ResourceUsage, SystemInfo};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMetadata {
    pub tool: &'static str,
    pub version: &'static str,
    pub generated_at: DateTime<Utc>,
    /// When the contained snapshot was taken.
    pub snapshot_time: Option<DateTime<Utc>>,
    pub root: Option<PathBuf>,
    pub mode: Option<DiscoveryMode>,
}

/// One instance as exported. Historical samples are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceEntry {
    pub id: String,
    pub dir: PathBuf,
    pub liveness: Liveness,
    pub data_health: DataHealth,
    pub pid: Option<u32>,
    pub banner: Option<String>,
    pub execs: Option<u64>,
    pub speed: Option<f64>,
    pub coverage: Option<f64>,
    pub stability: Option<f64>,
    pub crashes: Option<u64>,
    pub hangs: Option<u64>,
    pub run_time_secs: Option<u64>,
    pub last_activity: Option<DateTime<Utc>>,
    pub resources: Option<ResourceUsage>,
    pub fields: TypedStatusRecord,
    pub warnings: Vec<WarningRecord>,
    pub parse_warnings: Vec<String>,
}

impl From<&InstanceSnapshot> for InstanceEntry {
    fn from(instance: &InstanceSnapshot) -> Self {
        Self {
            id: instance.id.clone(),
            dir: instance.dir.clone(),
            liveness: instance.liveness,
            data_health: instance.data_health,
            pid: instance.pid(),
            banner: instance.banner().map(str::to_string),
            execs: instance.execs(),
            speed: instance.speed(),
            coverage: instance.coverage(),
            stability: instance.stability(),
            crashes: instance.crashes(),
            hangs: instance.hangs(),
            run_time_secs: instance.run_time().map(|d| d.as_secs()),
            last_activity: instance.last_activity(),
            resources: instance.resources,
            fields: instance.record.clone(),
            warnings: instance.warnings.clone(),
            parse_warnings: instance.parse_warnings.clone(),
        }
    }
}

/// Serializable form of a [`Published`] view.
///
/// Before the first successful cycle the status is `not_ready` and the
/// snapshot fields are empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignDocument {
    pub metadata: DocumentMetadata,
    pub status: PublishStatus,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    pub summary: Option<CampaignSummary>,
    pub instances: Vec<InstanceEntry>,
    /// Campaign and instance warnings, most severe first.
    pub warnings: Vec<WarningRecord>,
    pub delta: Option<DeltaReport>,
    pub system: Option<SystemInfo>,
}

impl CampaignDocument {
    pub fn from_published(published: &Published) -> Self {
        let snapshot = published.snapshot.as_deref();
        Self {
            metadata: DocumentMetadata {
                tool: env!("CARGO_PKG_NAME"),
                version: env!("CARGO_PKG_VERSION"),
                generated_at: Utc::now(),
                snapshot_time: snapshot.map(|s| s.timestamp),
                root: snapshot.map(|s| s.root.path.clone()),
                mode: snapshot.map(|s| s.root.mode),
            },
            status: published.status(),
            consecutive_failures: published.consecutive_failures,
            last_error: published.last_error.clone(),
            summary: snapshot.map(|s| s.summary.clone()),
            instances: snapshot
                .map(|s| s.instances.iter().map(InstanceEntry::from).collect())
                .unwrap_or_default(),
            warnings: snapshot
                .map(|s| s.all_warnings().into_iter().cloned().collect())
                .unwrap_or_default(),
            delta: snapshot.map(|s| s.delta.clone()),
            system: snapshot.and_then(|s| s.system),
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Rewrites a JSON file with the current document after every cycle.
#[derive(Debug, Clone)]
pub struct JsonExport {
    path: PathBuf,
}

impl JsonExport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the document via a temp file so readers never see a partial file.
    pub fn write(&self, document: &CampaignDocument) -> anyhow::Result<()> {
        let json = document.to_json_pretty()?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

impl SnapshotConsumer for JsonExport {
    fn name(&self) -> &str {
        "json-export"
    }

    fn consume(&mut self, published: &Published) -> anyhow::Result<()> {
        self.write(&CampaignDocument::from_published(published))
    }
}
