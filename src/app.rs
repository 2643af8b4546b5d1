//! Application state and navigation logic.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::consumer::{CampaignDocument, JsonExport, SnapshotConsumer};
use crate::data::{CampaignSnapshot, History, InstanceSnapshot, WarningRecord};
use crate::engine::{PublishStatus, Published, SnapshotHandle};
use crate::ui::instances::{sort_instances_by, SortColumn};
use crate::ui::Theme;

/// Default file written by the export key.
pub const DEFAULT_EXPORT_PATH: &str = "fuzzwatch_export.json";

/// The current view/tab in the TUI.
///
/// Instance detail is shown as an overlay (controlled by
/// `App::show_detail_overlay`) rather than as a separate view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Every instance with liveness and progress.
    Instances,
    /// Campaign and instance warnings, most severe first.
    Warnings,
}

impl View {
    pub fn next(self) -> Self {
        match self {
            View::Instances => View::Warnings,
            View::Warnings => View::Instances,
        }
    }

    pub fn prev(self) -> Self {
        // Two views: previous and next coincide
        self.next()
    }

    pub fn label(&self) -> &'static str {
        match self {
            View::Instances => "Instances",
            View::Warnings => "Warnings",
        }
    }
}

/// Main application state.
#[derive(Debug)]
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,
    pub show_detail_overlay: bool,

    // Published view
    snapshots: SnapshotHandle,
    pub published: Arc<Published>,
    pub history: History,
    root: PathBuf,

    // Navigation state
    pub selected_instance_index: usize,
    pub selected_warning_index: usize,

    // Sorting (Instances view)
    pub sort_column: SortColumn,
    pub sort_ascending: bool,

    // Search/filter
    pub filter_text: String,
    pub filter_active: bool,

    // UI
    pub theme: Theme,
    pub export_path: PathBuf,

    // Status message (temporary feedback)
    pub status_message: Option<(String, std::time::Instant)>,
}

impl App {
    /// Create an App reading from the scheduler's published view.
    pub fn new(snapshots: SnapshotHandle, root: impl Into<PathBuf>) -> Self {
        Self {
            running: true,
            current_view: View::Instances,
            show_help: false,
            show_detail_overlay: false,
            snapshots,
            published: Arc::new(Published::default()),
            history: History::new(),
            root: root.into(),
            selected_instance_index: 0,
            selected_warning_index: 0,
            sort_column: SortColumn::default(),
            sort_ascending: true,
            filter_text: String::new(),
            filter_active: false,
            theme: Theme::auto_detect(),
            export_path: PathBuf::from(DEFAULT_EXPORT_PATH),
            status_message: None,
        }
    }

    /// Use an explicit theme instead of detecting one.
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// The campaign root being watched.
    pub fn source_description(&self) -> String {
        self.root.display().to_string()
    }

    pub fn snapshot(&self) -> Option<&CampaignSnapshot> {
        self.published.snapshot.as_deref()
    }

    pub fn status(&self) -> PublishStatus {
        self.published.status()
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, std::time::Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < std::time::Duration::from_secs(3) {
                return Some(msg);
            }
        }
        None
    }

    /// Pick up the latest published view.
    ///
    /// Returns true if a new cycle was published since the last call.
    pub fn reload_data(&mut self) -> bool {
        let published = self.snapshots.load();
        if published.cycles == self.published.cycles {
            return false;
        }
        // Consuming the published view cannot fail for the App
        let _ = self.consume(&published);
        true
    }

    fn apply(&mut self, published: Arc<Published>) {
        let changed = match (&published.snapshot, &self.published.snapshot) {
            (Some(new), Some(old)) => !Arc::ptr_eq(new, old),
            (Some(_), None) => true,
            _ => false,
        };
        if changed {
            if let Some(snapshot) = &published.snapshot {
                self.history.record(snapshot);
            }
        }
        self.published = published;
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let instances = self.visible_instances().len();
        let warnings = self.visible_warnings().len();
        self.selected_instance_index = self.selected_instance_index.min(instances.saturating_sub(1));
        self.selected_warning_index = self.selected_warning_index.min(warnings.saturating_sub(1));
    }

    /// Instances after filtering and sorting, in display order.
    pub fn visible_instances(&self) -> Vec<&InstanceSnapshot> {
        let Some(snapshot) = self.snapshot() else {
            return Vec::new();
        };
        let mut instances: Vec<&InstanceSnapshot> = snapshot
            .instances
            .iter()
            .filter(|i| self.matches_filter(&i.id) || i.banner().is_some_and(|b| self.matches_filter(b)))
            .collect();
        sort_instances_by(&mut instances, self.sort_column, self.sort_ascending);
        instances
    }

    /// Warnings after filtering, most severe first.
    pub fn visible_warnings(&self) -> Vec<&WarningRecord> {
        let Some(snapshot) = self.snapshot() else {
            return Vec::new();
        };
        snapshot
            .all_warnings()
            .into_iter()
            .filter(|w| {
                self.matches_filter(&w.message)
                    || w.instance.as_deref().is_some_and(|id| self.matches_filter(id))
            })
            .collect()
    }

    /// The instance under the cursor, or the one named by the selected
    /// warning in the Warnings view.
    pub fn selected_instance(&self) -> Option<&InstanceSnapshot> {
        match self.current_view {
            View::Instances => self
                .visible_instances()
                .get(self.selected_instance_index)
                .copied(),
            View::Warnings => {
                let id = self
                    .visible_warnings()
                    .get(self.selected_warning_index)?
                    .instance
                    .clone()?;
                self.snapshot()?.instance(&id)
            }
        }
    }

    /// Switch to the next view.
    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.current_view = self.current_view.prev();
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
    }

    pub fn select_next(&mut self) {
        self.select_next_n(1);
    }

    pub fn select_prev(&mut self) {
        self.select_prev_n(1);
    }

    /// Move selection down by n items.
    pub fn select_next_n(&mut self, n: usize) {
        match self.current_view {
            View::Instances => {
                let max = self.visible_instances().len().saturating_sub(1);
                self.selected_instance_index = (self.selected_instance_index + n).min(max);
            }
            View::Warnings => {
                let max = self.visible_warnings().len().saturating_sub(1);
                self.selected_warning_index = (self.selected_warning_index + n).min(max);
            }
        }
    }

    /// Move selection up by n items.
    pub fn select_prev_n(&mut self, n: usize) {
        match self.current_view {
            View::Instances => {
                self.selected_instance_index = self.selected_instance_index.saturating_sub(n);
            }
            View::Warnings => {
                self.selected_warning_index = self.selected_warning_index.saturating_sub(n);
            }
        }
    }

    pub fn select_first(&mut self) {
        match self.current_view {
            View::Instances => self.selected_instance_index = 0,
            View::Warnings => self.selected_warning_index = 0,
        }
    }

    pub fn select_last(&mut self) {
        match self.current_view {
            View::Instances => {
                self.selected_instance_index = self.visible_instances().len().saturating_sub(1);
            }
            View::Warnings => {
                self.selected_warning_index = self.visible_warnings().len().saturating_sub(1);
            }
        }
    }

    /// Open the detail overlay for the selected instance.
    pub fn enter_detail(&mut self) {
        if self.selected_instance().is_some() {
            self.show_detail_overlay = true;
        }
    }

    /// Navigate back: close the overlay first, then return to Instances.
    pub fn go_back(&mut self) {
        if self.show_detail_overlay {
            self.show_detail_overlay = false;
        } else if self.current_view != View::Instances {
            self.current_view = View::Instances;
        }
    }

    pub fn close_overlay(&mut self) {
        self.show_detail_overlay = false;
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Cycle to the next sort column (Instances view).
    pub fn cycle_sort(&mut self) {
        if self.current_view == View::Instances {
            self.sort_column = self.sort_column.next();
        }
    }

    pub fn toggle_sort_direction(&mut self) {
        if self.current_view == View::Instances {
            self.sort_ascending = !self.sort_ascending;
        }
    }

    /// Enter filter input mode (starts capturing keystrokes for search).
    pub fn start_filter(&mut self) {
        self.filter_active = true;
    }

    /// Exit filter input mode without clearing the filter text.
    pub fn cancel_filter(&mut self) {
        self.filter_active = false;
    }

    /// Clear the filter text and exit filter mode.
    pub fn clear_filter(&mut self) {
        self.filter_text.clear();
        self.filter_active = false;
    }

    pub fn filter_push(&mut self, c: char) {
        self.filter_text.push(c);
        self.clamp_selection();
    }

    pub fn filter_pop(&mut self) {
        self.filter_text.pop();
    }

    /// Case-insensitive substring match against the filter.
    pub fn matches_filter(&self, text: &str) -> bool {
        if self.filter_text.is_empty() {
            return true;
        }
        text.to_lowercase().contains(&self.filter_text.to_lowercase())
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Export the current view as a JSON document.
    pub fn export_state(&self, path: &Path) -> anyhow::Result<()> {
        if self.published.snapshot.is_none() {
            anyhow::bail!("No data to export");
        }
        JsonExport::new(path).write(&CampaignDocument::from_published(&self.published))
    }
}

impl SnapshotConsumer for App {
    fn name(&self) -> &str {
        "tui"
    }

    fn consume(&mut self, published: &Published) -> anyhow::Result<()> {
        self.apply(Arc::new(published.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::status::{parse_status_str, DEFAULT_REQUIRED_FIELDS};
    use crate::data::{CampaignSummary, Severity, WarningKind};
    use crate::engine::{CampaignRoot, DeltaReport, DiscoveryMode};
    use crate::probe::Liveness;
    use chrono::Utc;
    use tempfile::TempDir;

    fn instance(id: &str, execs: u64, liveness: Liveness) -> InstanceSnapshot {
        let content = format!("execs_done : {}\nrun_time : 10\n", execs);
        InstanceSnapshot {
            id: id.to_string(),
            record: parse_status_str(&content, DEFAULT_REQUIRED_FIELDS).typed,
            liveness,
            ..InstanceSnapshot::default()
        }
    }

    fn snapshot() -> Arc<CampaignSnapshot> {
        let mut dead = instance("secondary-2", 50, Liveness::Dead);
        dead.warnings.push(WarningRecord::for_instance(
            "secondary-2",
            Severity::Warn,
            WarningKind::InstanceDead,
            "instance is not running",
        ));
        Arc::new(CampaignSnapshot {
            timestamp: Utc::now(),
            root: CampaignRoot {
                path: "/out".into(),
                mode: DiscoveryMode::SyncDirectory,
            },
            instances: vec![
                instance("main", 300, Liveness::Alive),
                instance("secondary-1", 200, Liveness::Alive),
                dead,
            ],
            summary: CampaignSummary::default(),
            warnings: vec![WarningRecord::for_campaign(
                Severity::Warn,
                WarningKind::DeadInstances,
                "1 instance(s) dead",
            )],
            delta: DeltaReport::default(),
            system: None,
        })
    }

    fn app_with_data() -> App {
        let handle = SnapshotHandle::new();
        handle.publish(snapshot());
        let mut app = App::new(handle, "/out").with_theme(Theme::dark());
        assert!(app.reload_data());
        app
    }

    #[test]
    fn test_reload_only_on_new_cycle() {
        let handle = SnapshotHandle::new();
        let mut app = App::new(handle.clone(), "/out").with_theme(Theme::dark());
        assert!(!app.reload_data());
        assert_eq!(app.status(), PublishStatus::NotReady);

        handle.publish(snapshot());
        assert!(app.reload_data());
        assert!(!app.reload_data());
        assert_eq!(app.status(), PublishStatus::Fresh);
        assert_eq!(app.history.timestamps.len(), 1);
    }

    #[test]
    fn test_filter_and_sort() {
        let mut app = app_with_data();
        app.filter_text = "secondary".to_string();
        let ids: Vec<&str> = app.visible_instances().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["secondary-1", "secondary-2"]);

        app.clear_filter();
        app.sort_column = SortColumn::Execs;
        app.sort_ascending = false;
        assert_eq!(app.visible_instances()[0].id, "main");
    }

    #[test]
    fn test_selection_clamped() {
        let mut app = app_with_data();
        app.select_next_n(10);
        assert_eq!(app.selected_instance_index, 2);
        app.select_prev_n(10);
        assert_eq!(app.selected_instance_index, 0);
        app.select_last();
        assert_eq!(app.selected_instance().unwrap().id, "secondary-2");
    }

    #[test]
    fn test_warning_selects_instance() {
        let mut app = app_with_data();
        app.set_view(View::Warnings);
        assert_eq!(app.visible_warnings().len(), 2);

        // Campaign warning has no instance
        app.select_first();
        let first_is_campaign = app.visible_warnings()[0].instance.is_none();
        if first_is_campaign {
            assert!(app.selected_instance().is_none());
            app.select_next();
        }
        assert_eq!(app.selected_instance().unwrap().id, "secondary-2");
        app.enter_detail();
        assert!(app.show_detail_overlay);
        app.go_back();
        assert!(!app.show_detail_overlay);
        app.go_back();
        assert_eq!(app.current_view, View::Instances);
    }

    #[test]
    fn test_export_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");

        let empty = App::new(SnapshotHandle::new(), "/out").with_theme(Theme::dark());
        assert!(empty.export_state(&path).is_err());

        let app = app_with_data();
        app.export_state(&path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["instances"].as_array().unwrap().len(), 3);
    }
}
