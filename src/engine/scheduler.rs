//! The poll cycle and the background loop that drives it.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::builder::InstanceBuilder;
use super::delta::DeltaTracker;
use super::discovery::{list_candidates, qualifies, CampaignRoot, DiscoveryMode, InstanceDir};
use super::notify::{summary_text, HookOutcome, NotificationHook};
use super::published::SnapshotHandle;
use super::store::{FileStateStore, MemoryStateStore, StateStore};
use crate::data::{
    aggregate, CampaignSnapshot, InstanceSnapshot, Severity, Thresholds, WarningKind,
    WarningRecord,
};
use crate::error::MonitorError;
use crate::probe::{OsProbe, ProcessProbe, ResourceSampler};
use crate::settings::Settings;

/// Rebuilds the campaign snapshot on every cycle and publishes it.
///
/// # Example
///
/// ```rust,no_run
/// use fuzzwatch::{PollScheduler, Settings};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut scheduler = PollScheduler::builder("/srv/fuzz/out")
///         .settings(&Settings::default())
///         .build();
///
///     let snapshot = scheduler.run_once().await?;
///     println!("{} crashes", snapshot.summary.total_crashes);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct PollScheduler {
    root: PathBuf,
    builder: Arc<InstanceBuilder>,
    sampler: Option<Arc<ResourceSampler>>,
    thresholds: Thresholds,
    include_dead: bool,
    interval: Duration,
    instance_timeout: Duration,
    stale_after: u32,
    tracker: DeltaTracker,
    hook: Option<NotificationHook>,
    pending_hooks: Vec<JoinHandle<HookOutcome>>,
    handle: SnapshotHandle,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
    succeeded: u64,
}

impl PollScheduler {
    pub fn builder(root: impl Into<PathBuf>) -> SchedulerBuilder {
        SchedulerBuilder::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reader for the published view.
    pub fn handle(&self) -> SnapshotHandle {
        self.handle.clone()
    }

    /// Handle that cancels a running cycle and stops the loop.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: self.stop_tx.clone(),
        }
    }

    /// Run one full cycle and publish the result.
    ///
    /// On error nothing is published; the previous snapshot stays in place.
    pub async fn run_cycle(&mut self) -> Result<Arc<CampaignSnapshot>, MonitorError> {
        let now = SystemTime::now();
        let (root, dirs) = self.list_root().await?;
        debug!(root = %root.path.display(), candidates = dirs.len(), "Listed campaign root");

        let mut instances = self.build_instances(root.mode, dirs, now).await?;
        if instances.is_empty() {
            return Err(MonitorError::NoInstancesDiscovered(root.path));
        }
        instances.sort_by(|a, b| a.id.cmp(&b.id));

        let (summary, mut warnings) =
            aggregate(&mut instances, self.include_dead, &self.thresholds);

        let timestamp: DateTime<Utc> = now.into();
        let delta = self.tracker.observe(&root.path, &instances, timestamp);

        warnings.extend(self.collect_hook_outcomes().await);
        let crashed = delta.new_crashes > 0 && !delta.baseline;
        if crashed {
            info!(
                new_crashes = delta.new_crashes,
                total_crashes = delta.total_crashes,
                "New crashes detected"
            );
            warnings.push(WarningRecord::for_campaign(
                Severity::Warn,
                WarningKind::NewCrashes,
                format!(
                    "{} new crash(es) since last cycle ({} total)",
                    delta.new_crashes, delta.total_crashes
                ),
            ));
        }
        warnings.sort_by(|a, b| b.severity.cmp(&a.severity));

        let snapshot = Arc::new(CampaignSnapshot {
            timestamp,
            root,
            instances,
            summary,
            warnings,
            delta,
            system: self.sampler.as_ref().map(|s| s.system_info()),
        });

        if crashed {
            if let Some(hook) = &self.hook {
                self.pending_hooks.push(hook.dispatch(summary_text(&snapshot)));
            }
        }

        self.handle.publish(snapshot.clone());
        self.succeeded += 1;
        debug!(
            instances = snapshot.summary.total_instances,
            alive = snapshot.summary.alive,
            crashes = snapshot.summary.total_crashes,
            "Cycle complete"
        );
        Ok(snapshot)
    }

    /// Run a single cycle and wait for any notification it triggered.
    pub async fn run_once(&mut self) -> Result<Arc<CampaignSnapshot>, MonitorError> {
        let snapshot = self.run_cycle().await?;
        for outcome in self.flush_notifications().await {
            if outcome != HookOutcome::Delivered {
                warn!(?outcome, "Notification not delivered");
            }
        }
        Ok(snapshot)
    }

    /// Wait for every outstanding hook invocation.
    pub async fn flush_notifications(&mut self) -> Vec<HookOutcome> {
        let mut outcomes = Vec::new();
        for pending in self.pending_hooks.drain(..) {
            match pending.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => outcomes.push(HookOutcome::Failed(e.to_string())),
            }
        }
        outcomes
    }

    /// One loop iteration. Failures after the first successful cycle are
    /// recorded on the published view instead of being returned.
    pub async fn tick(&mut self) -> Result<(), MonitorError> {
        match self.run_cycle().await {
            Ok(_) => Ok(()),
            Err(MonitorError::Cancelled) => Ok(()),
            Err(e) if self.succeeded == 0 => Err(e),
            Err(e) => {
                let failures = self.handle.record_failure(e.to_string(), self.stale_after);
                warn!(error = %e, consecutive_failures = failures, "Poll cycle failed");
                Ok(())
            }
        }
    }

    /// Run cycles every interval until stopped.
    ///
    /// The first cycle runs immediately unless one has already succeeded.
    pub async fn run(mut self) -> Result<(), MonitorError> {
        let start = if self.succeeded == 0 {
            Instant::now()
        } else {
            Instant::now() + self.interval
        };
        let mut ticker = tokio::time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stop_rx = self.stop_rx.clone();

        loop {
            if *stop_rx.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await?;
                }
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }

        self.flush_notifications().await;
        debug!("Poll loop stopped");
        Ok(())
    }

    /// Spawn the loop on the current runtime.
    pub fn start(self) -> SchedulerHandle {
        let stop = self.stop_handle();
        let snapshots = self.handle();
        let task = tokio::spawn(self.run());
        SchedulerHandle {
            stop,
            snapshots,
            task,
        }
    }

    /// List the root off the async workers, bounded like an instance read.
    async fn list_root(&self) -> Result<(CampaignRoot, Vec<InstanceDir>), MonitorError> {
        let root = self.root.clone();
        let listing = tokio::task::spawn_blocking(move || list_candidates(&root));
        match tokio::time::timeout(self.instance_timeout, listing).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(MonitorError::RootUnreadable {
                path: self.root.clone(),
                source: io::Error::other(e.to_string()),
            }),
            Err(_) => Err(MonitorError::RootUnreadable {
                path: self.root.clone(),
                source: io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("listing timed out after {:?}", self.instance_timeout),
                ),
            }),
        }
    }

    /// Build every instance in parallel, each under `instance_timeout`.
    ///
    /// In sync mode a candidate that turns out not to be an instance is
    /// dropped. One that times out is kept as a degraded placeholder.
    async fn build_instances(
        &self,
        mode: DiscoveryMode,
        dirs: Vec<InstanceDir>,
        now: SystemTime,
    ) -> Result<Vec<InstanceSnapshot>, MonitorError> {
        let mut stop_rx = self.stop_rx.clone();
        let mut set = JoinSet::new();
        let expected = dirs.len();

        for dir in dirs {
            if *stop_rx.borrow() {
                set.abort_all();
                return Err(MonitorError::Cancelled);
            }
            let builder = self.builder.clone();
            let limit = self.instance_timeout;
            set.spawn(async move {
                let work = {
                    let dir = dir.clone();
                    tokio::task::spawn_blocking(move || {
                        let checked = mode == DiscoveryMode::Single || qualifies(&dir.path);
                        checked.then(|| builder.build(&dir, now))
                    })
                };
                match tokio::time::timeout(limit, work).await {
                    Ok(Ok(snapshot)) => snapshot,
                    Ok(Err(e)) => {
                        warn!(instance = %dir.id, error = %e, "Instance read panicked");
                        Some(InstanceBuilder::placeholder(
                            &dir,
                            format!("instance read failed: {}", e),
                        ))
                    }
                    Err(_) => {
                        warn!(instance = %dir.id, timeout = ?limit, "Instance read timed out");
                        Some(InstanceBuilder::placeholder(
                            &dir,
                            format!("instance read timed out after {:?}", limit),
                        ))
                    }
                }
            });
        }

        let mut instances = Vec::with_capacity(expected);
        let mut listening = true;
        loop {
            tokio::select! {
                joined = set.join_next() => match joined {
                    Some(Ok(Some(snapshot))) => instances.push(snapshot),
                    Some(Ok(None)) => {}
                    Some(Err(e)) => warn!(error = %e, "Instance task failed"),
                    None => break,
                },
                changed = stop_rx.changed(), if listening => {
                    if changed.is_err() {
                        listening = false;
                    } else if *stop_rx.borrow() {
                        set.abort_all();
                        return Err(MonitorError::Cancelled);
                    }
                }
            }
        }
        Ok(instances)
    }

    /// Outcomes of hook runs that finished since the last cycle.
    async fn collect_hook_outcomes(&mut self) -> Vec<WarningRecord> {
        let (finished, running): (Vec<_>, Vec<_>) = self
            .pending_hooks
            .drain(..)
            .partition(|pending| pending.is_finished());
        self.pending_hooks = running;

        let mut warnings = Vec::new();
        for pending in finished {
            let outcome = pending
                .await
                .unwrap_or_else(|e| HookOutcome::Failed(e.to_string()));
            warnings.extend(outcome.warning());
        }
        warnings
    }
}

/// Builder for [`PollScheduler`].
#[derive(Debug)]
pub struct SchedulerBuilder {
    root: PathBuf,
    settings: Settings,
    probe: Option<Arc<dyn ProcessProbe>>,
    store: Option<Box<dyn StateStore>>,
    sampler: Option<Arc<ResourceSampler>>,
    handle: Option<SnapshotHandle>,
}

impl SchedulerBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settings: Settings::default(),
            probe: None,
            store: None,
            sampler: None,
            handle: None,
        }
    }

    pub fn settings(mut self, settings: &Settings) -> Self {
        self.settings = settings.clone();
        self
    }

    /// Liveness probe. Defaults to signalling the OS.
    pub fn probe(mut self, probe: Arc<dyn ProcessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Delta state store. Defaults to a file store under the configured
    /// state directory, or memory when persistence is off.
    pub fn store(mut self, store: Box<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Enable per-process and system resource sampling.
    pub fn sampler(mut self, sampler: Arc<ResourceSampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }

    /// Publish into an existing handle.
    pub fn handle(mut self, handle: SnapshotHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn build(self) -> PollScheduler {
        let settings = self.settings;
        let store = self.store.unwrap_or_else(|| default_store(&settings, &self.root));

        let mut builder = InstanceBuilder::new(self.probe.unwrap_or_else(|| Arc::new(OsProbe)))
            .required_fields(settings.required_fields.clone())
            .recency_window(settings.recency_window)
            .plot_max_points(settings.plot_max_points);
        if let Some(sampler) = &self.sampler {
            builder = builder.sampler(sampler.clone());
        }

        let hook = settings
            .notify_command
            .as_deref()
            .filter(|cmd| !cmd.trim().is_empty())
            .map(|cmd| NotificationHook::new(cmd, settings.notify_timeout));

        let (stop_tx, stop_rx) = watch::channel(false);
        PollScheduler {
            root: self.root,
            builder: Arc::new(builder),
            sampler: self.sampler,
            thresholds: settings.thresholds.clone(),
            include_dead: settings.show_dead,
            interval: settings.interval,
            instance_timeout: settings.instance_timeout,
            stale_after: settings.stale_after_failures.max(1),
            tracker: DeltaTracker::new(store),
            hook,
            pending_hooks: Vec::new(),
            handle: self.handle.unwrap_or_default(),
            stop_tx: Arc::new(stop_tx),
            stop_rx,
            succeeded: 0,
        }
    }
}

fn default_store(settings: &Settings, root: &Path) -> Box<dyn StateStore> {
    if !settings.persist_state {
        return Box::new(MemoryStateStore::default());
    }
    match settings.resolved_state_dir() {
        Some(dir) => {
            // Key on the canonical root so relative and absolute invocations share state
            let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
            Box::new(FileStateStore::for_campaign(&dir, &root))
        }
        None => {
            warn!("No state directory available, delta state will not persist");
            Box::new(MemoryStateStore::default())
        }
    }
}

/// Cancels a running cycle and stops the loop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Handle for a scheduler running in the background.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop: StopHandle,
    snapshots: SnapshotHandle,
    task: JoinHandle<Result<(), MonitorError>>,
}

impl SchedulerHandle {
    pub fn snapshots(&self) -> SnapshotHandle {
        self.snapshots.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(self) -> Result<(), MonitorError> {
        self.stop.stop();
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Poll loop task failed");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::STATUS_FILE;
    use crate::engine::builder::tests::FakeProbe;
    use crate::engine::published::PublishStatus;
    use crate::probe::Liveness;
    use std::fs;
    use tempfile::TempDir;

    fn write_instance(root: &Path, id: &str, status: &str) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(STATUS_FILE), status).unwrap();
    }

    fn status(pid: u32, crashes: u64) -> String {
        format!(
            "start_time        : 1700000000\n\
             last_update       : 1700003600\n\
             fuzzer_pid        : {}\n\
             cycles_done       : 4\n\
             execs_done        : 1000000\n\
             execs_per_sec     : 500.5\n\
             bitmap_cvg        : 45.20%\n\
             saved_crashes     : {}\n\
             saved_hangs       : 0\n\
             stability         : 99.10%\n\
             run_time          : 3600\n",
            pid, crashes
        )
    }

    fn memory_scheduler(root: &Path, probe: FakeProbe) -> PollScheduler {
        PollScheduler::builder(root)
            .probe(Arc::new(probe))
            .store(Box::new(MemoryStateStore::default()))
            .build()
    }

    #[tokio::test]
    async fn test_single_live_instance_end_to_end() {
        let root = TempDir::new().unwrap();
        let pid = std::process::id();
        write_instance(root.path(), "main", &status(pid, 3));

        let mut scheduler = PollScheduler::builder(root.path())
            .store(Box::new(MemoryStateStore::default()))
            .build();
        let snapshot = scheduler.run_once().await.unwrap();

        assert_eq!(snapshot.instances.len(), 1);
        assert_eq!(snapshot.instances[0].liveness, Liveness::Alive);
        assert_eq!(snapshot.summary.total_crashes, 3);
        assert_eq!(snapshot.summary.max_coverage, Some(45.2));
        assert!(snapshot.delta.baseline);
        assert_eq!(scheduler.handle().load().status(), PublishStatus::Fresh);
    }

    #[tokio::test]
    async fn test_unchanged_campaign_is_idempotent() {
        let root = TempDir::new().unwrap();
        write_instance(root.path(), "a", &status(101, 1));
        write_instance(root.path(), "b", &status(102, 2));
        let mut scheduler = memory_scheduler(
            root.path(),
            FakeProbe {
                alive: vec![101, 102],
                ..FakeProbe::default()
            },
        );

        let first = scheduler.run_cycle().await.unwrap();
        let second = scheduler.run_cycle().await.unwrap();
        let third = scheduler.run_cycle().await.unwrap();

        assert_eq!(first.instances, second.instances);
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.warnings, second.warnings);

        // The first cycle is the baseline; after that nothing differs but time
        let mut third = (*third).clone();
        third.timestamp = second.timestamp;
        third.delta.exec_rate = second.delta.exec_rate;
        assert_eq!(*second, third);
        assert_eq!(second.delta.new_crashes, 0);
    }

    #[tokio::test]
    async fn test_broken_instance_does_not_hide_others() {
        let root = TempDir::new().unwrap();
        write_instance(root.path(), "good", &status(7, 2));
        write_instance(root.path(), "broken", "this is not a status file\n");

        let mut scheduler = memory_scheduler(
            root.path(),
            FakeProbe {
                alive: vec![7],
                ..FakeProbe::default()
            },
        );
        let snapshot = scheduler.run_cycle().await.unwrap();

        let ids: Vec<&str> = snapshot.instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["broken", "good"]);
        assert_eq!(snapshot.summary.total_crashes, 2);
        assert_eq!(snapshot.summary.degraded, 1);
        assert!(snapshot
            .instance("broken")
            .unwrap()
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::StatusIncomplete));
    }

    #[tokio::test]
    async fn test_missing_root_fails_first_cycle() {
        let root = TempDir::new().unwrap();
        let mut scheduler = memory_scheduler(&root.path().join("absent"), FakeProbe::default());

        assert!(matches!(
            scheduler.tick().await,
            Err(MonitorError::RootNotFound(_))
        ));
        assert_eq!(scheduler.handle().load().status(), PublishStatus::NotReady);
    }

    #[tokio::test]
    async fn test_later_failures_go_stale() {
        let root = TempDir::new().unwrap();
        let campaign = root.path().join("out");
        write_instance(&campaign, "main", &status(1, 0));

        let mut scheduler = PollScheduler::builder(&campaign)
            .settings(&Settings {
                stale_after_failures: 2,
                ..Settings::default()
            })
            .probe(Arc::new(FakeProbe::default()))
            .store(Box::new(MemoryStateStore::default()))
            .build();
        scheduler.tick().await.unwrap();

        fs::remove_dir_all(&campaign).unwrap();
        scheduler.tick().await.unwrap();
        assert_eq!(scheduler.handle().load().status(), PublishStatus::Fresh);
        scheduler.tick().await.unwrap();

        let published = scheduler.handle().load();
        assert_eq!(published.status(), PublishStatus::Stale);
        assert_eq!(published.consecutive_failures, 2);
        assert!(published.snapshot.is_some());
    }

    #[tokio::test]
    async fn test_new_crashes_raise_warning() {
        let root = TempDir::new().unwrap();
        write_instance(root.path(), "main", &status(5, 1));
        let mut scheduler = memory_scheduler(
            root.path(),
            FakeProbe {
                alive: vec![5],
                ..FakeProbe::default()
            },
        );
        scheduler.run_cycle().await.unwrap();

        write_instance(root.path(), "main", &status(5, 4));
        let snapshot = scheduler.run_cycle().await.unwrap();

        assert_eq!(snapshot.delta.new_crashes, 3);
        assert!(snapshot
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::NewCrashes));
    }

    #[tokio::test]
    async fn test_removed_instance_raises_no_crash_warning() {
        let root = TempDir::new().unwrap();
        write_instance(root.path(), "a", &status(5, 5));
        write_instance(root.path(), "b", &status(6, 5));
        let mut scheduler = memory_scheduler(
            root.path(),
            FakeProbe {
                alive: vec![5, 6],
                ..FakeProbe::default()
            },
        );
        scheduler.run_cycle().await.unwrap();

        fs::remove_dir_all(root.path().join("b")).unwrap();
        let snapshot = scheduler.run_cycle().await.unwrap();

        assert_eq!(snapshot.delta.new_crashes, 0);
        assert_eq!(snapshot.delta.total_crashes, 5);
        assert!(!snapshot
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::NewCrashes));
    }

    #[tokio::test]
    async fn test_non_instance_directories_are_skipped() {
        let root = TempDir::new().unwrap();
        write_instance(root.path(), "main", &status(5, 0));
        fs::create_dir(root.path().join("queue_only")).unwrap();
        fs::write(root.path().join("notes.txt"), "x\n").unwrap();

        let mut scheduler = memory_scheduler(root.path(), FakeProbe::default());
        let snapshot = scheduler.run_cycle().await.unwrap();
        let ids: Vec<&str> = snapshot.instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["main"]);
    }

    #[tokio::test]
    async fn test_root_without_instances_fails() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("queue_only")).unwrap();

        let mut scheduler = memory_scheduler(root.path(), FakeProbe::default());
        assert!(matches!(
            scheduler.run_cycle().await,
            Err(MonitorError::NoInstancesDiscovered(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hook_receives_summary_on_new_crash() {
        let root = TempDir::new().unwrap();
        let campaign = root.path().join("out");
        let received = root.path().join("hook.txt");
        write_instance(&campaign, "main", &status(5, 0));

        let mut scheduler = PollScheduler::builder(&campaign)
            .settings(&Settings {
                notify_command: Some(format!("cat > '{}'", received.display())),
                ..Settings::default()
            })
            .probe(Arc::new(FakeProbe {
                alive: vec![5],
                ..FakeProbe::default()
            }))
            .store(Box::new(MemoryStateStore::default()))
            .build();

        scheduler.run_once().await.unwrap();
        assert!(!received.exists());

        write_instance(&campaign, "main", &status(5, 2));
        scheduler.run_once().await.unwrap();

        let text = fs::read_to_string(&received).unwrap();
        assert!(text.contains("New Crashes: 2"));
        assert!(text.contains("Total Crashes: 2"));
    }

    #[tokio::test]
    async fn test_stopped_cycle_is_discarded() {
        let root = TempDir::new().unwrap();
        write_instance(root.path(), "main", &status(5, 0));
        let mut scheduler = memory_scheduler(root.path(), FakeProbe::default());
        scheduler.run_cycle().await.unwrap();

        scheduler.stop_handle().stop();
        assert!(matches!(
            scheduler.run_cycle().await,
            Err(MonitorError::Cancelled)
        ));
        assert_eq!(scheduler.handle().load().cycles, 1);
    }

    #[tokio::test]
    async fn test_background_loop_publishes_and_stops() {
        let root = TempDir::new().unwrap();
        write_instance(root.path(), "main", &status(5, 0));
        let scheduler = PollScheduler::builder(root.path())
            .settings(&Settings {
                interval: Duration::from_millis(20),
                ..Settings::default()
            })
            .probe(Arc::new(FakeProbe::default()))
            .store(Box::new(MemoryStateStore::default()))
            .build();

        let handle = scheduler.start();
        let snapshots = handle.snapshots();
        let mut cycles = snapshots.subscribe();
        tokio::time::timeout(Duration::from_secs(5), cycles.wait_for(|c| *c >= 2))
            .await
            .unwrap()
            .unwrap();

        handle.shutdown().await.unwrap();
        assert!(snapshots.snapshot().is_some());
    }
}
