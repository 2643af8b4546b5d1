//! External notification hook for new crashes.
//!
//! The hook is a shell command that receives a plain-text summary on stdin.
//! It runs on its own task; the poll cycle never waits for it.

use std::process::Stdio;
use std::time::Duration;

use chrono::Local;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::data::{CampaignSnapshot, Severity, WarningKind, WarningRecord};

/// Result of one hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Delivered,
    NonZeroExit(Option<i32>),
    Failed(String),
    TimedOut,
}

impl HookOutcome {
    /// Campaign warning for anything but a clean delivery.
    pub fn warning(&self) -> Option<WarningRecord> {
        let message = match self {
            HookOutcome::Delivered => return None,
            HookOutcome::NonZeroExit(Some(code)) => {
                format!("notification command exited with status {}", code)
            }
            HookOutcome::NonZeroExit(None) => "notification command was killed".to_string(),
            HookOutcome::Failed(e) => format!("notification command failed: {}", e),
            HookOutcome::TimedOut => "notification command timed out".to_string(),
        };
        Some(WarningRecord::for_campaign(
            Severity::Warn,
            WarningKind::NotificationFailed,
            message,
        ))
    }
}

/// Plain-text crash summary handed to the hook.
///
/// The crash total counts every instance, dead ones included, so it matches
/// the basis of the new-crash count.
pub fn summary_text(snapshot: &CampaignSnapshot) -> String {
    let summary = &snapshot.summary;
    let timestamp = snapshot.timestamp.with_timezone(&Local);
    format!(
        "fuzzwatch - New Crash Detected!\n\n\
         Timestamp: {}\n\
         Total Crashes: {}\n\
         New Crashes: {}\n\
         Active Instances: {}/{}\n\
         Coverage: {:.2}%\n",
        timestamp.format("%Y-%m-%d %H:%M:%S"),
        snapshot.delta.total_crashes,
        snapshot.delta.new_crashes,
        summary.alive,
        summary.total_instances,
        summary.max_coverage.unwrap_or(0.0),
    )
}

/// A configured notification command.
#[derive(Debug, Clone)]
pub struct NotificationHook {
    command: String,
    timeout: Duration,
}

impl NotificationHook {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run the hook on a background task.
    pub fn dispatch(&self, text: String) -> JoinHandle<HookOutcome> {
        let hook = self.clone();
        tokio::spawn(async move { hook.run(text).await })
    }

    /// Run the hook and wait for it, bounded by the configured timeout.
    pub async fn run(&self, text: String) -> HookOutcome {
        let mut child = match shell(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %self.command, error = %e, "Failed to start notification command");
                return HookOutcome::Failed(e.to_string());
            }
        };

        let deliver = async {
            if let Some(mut stdin) = child.stdin.take() {
                // A command that ignores its input may close the pipe early
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    if e.kind() != std::io::ErrorKind::BrokenPipe {
                        return Err(e);
                    }
                }
            }
            child.wait().await
        };

        let outcome = match tokio::time::timeout(self.timeout, deliver).await {
            Err(_) => HookOutcome::TimedOut,
            Ok(Err(e)) => HookOutcome::Failed(e.to_string()),
            Ok(Ok(status)) if status.success() => HookOutcome::Delivered,
            Ok(Ok(status)) => HookOutcome::NonZeroExit(status.code()),
        };

        match &outcome {
            HookOutcome::Delivered => debug!(command = %self.command, "Notification delivered"),
            other => warn!(command = %self.command, outcome = ?other, "Notification hook failed"),
        }
        outcome
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
