//! Process liveness classification.
//!
//! An instance is classified from four signals: the pid recorded in its
//! status file (probed with `kill(pid, 0)`), the status file's modification
//! time, the setup marker's modification time, and the current time.
//! Classification is recomputed from scratch every cycle.

mod resources;

pub use resources::{ResourceSampler, ResourceUsage, SystemInfo};

use std::fmt::Debug;
use std::time::{Duration, SystemTime};

use serde::Serialize;

/// Name of the optional setup marker inside an instance directory.
pub const SETUP_MARKER: &str = "fuzzer_setup";

/// Liveness of one instance's process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    Alive,
    Starting,
    Dead,
    #[default]
    Unknown,
}

impl Liveness {
    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Liveness::Alive => "alive",
            Liveness::Starting => "starting",
            Liveness::Dead => "dead",
            Liveness::Unknown => "unknown",
        }
    }
}

/// Result of asking the OS whether a pid exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Exists,
    Missing,
    /// The probe could not answer (permission denied, unsupported platform).
    Denied,
}

/// OS-level process existence probe.
pub trait ProcessProbe: Send + Sync + Debug {
    fn probe(&self, pid: u32) -> ProbeOutcome;
}

/// Probe backed by `kill(pid, 0)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsProbe;

impl ProcessProbe for OsProbe {
    #[cfg(unix)]
    fn probe(&self, pid: u32) -> ProbeOutcome {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return ProbeOutcome::Missing;
        };
        if pid <= 0 {
            return ProbeOutcome::Missing;
        }

        // SAFETY: signal 0 performs an existence/permission check only.
        let ret = unsafe { libc::kill(pid, 0) };
        if ret == 0 {
            return ProbeOutcome::Exists;
        }
        match std::io::Error::last_os_error().raw_os_error() {
            Some(libc::ESRCH) => ProbeOutcome::Missing,
            _ => ProbeOutcome::Denied,
        }
    }

    #[cfg(not(unix))]
    fn probe(&self, _pid: u32) -> ProbeOutcome {
        ProbeOutcome::Denied
    }
}

/// Everything the resolver looks at for one instance.
#[derive(Debug, Clone, Copy)]
pub struct LivenessInputs {
    pub pid: Option<u32>,
    /// Probe result for `pid`; `None` when there is no pid.
    pub probe: Option<ProbeOutcome>,
    pub status_modified: Option<SystemTime>,
    pub setup_modified: Option<SystemTime>,
    pub now: SystemTime,
}

/// Classify an instance. Checks are applied in priority order:
///
/// 1. pid present and the process exists → `Alive`
/// 2. setup marker at least as new as the status file, or the status file
///    touched within `recency_window` → `Starting`
/// 3. pid present but gone, or no pid and a stale status file → `Dead`
/// 4. otherwise (probe denied) → `Unknown`
pub fn resolve(inputs: &LivenessInputs, recency_window: Duration) -> Liveness {
    if inputs.pid.is_some() && inputs.probe == Some(ProbeOutcome::Exists) {
        return Liveness::Alive;
    }

    let setup_newer = match (inputs.setup_modified, inputs.status_modified) {
        (Some(setup), Some(status)) => setup >= status,
        (Some(_), None) => true,
        (None, _) => false,
    };
    let recent = inputs
        .status_modified
        .is_some_and(|modified| is_within(modified, inputs.now, recency_window));
    if setup_newer || recent {
        return Liveness::Starting;
    }

    match (inputs.pid, inputs.probe) {
        (Some(_), Some(ProbeOutcome::Missing)) => Liveness::Dead,
        (None, _) => Liveness::Dead,
        _ => Liveness::Unknown,
    }
}

/// True if `then` is no more than `window` before `now`. Times in the future
/// (clock skew) count as recent.
fn is_within(then: SystemTime, now: SystemTime, window: Duration) -> bool {
    match now.duration_since(then) {
        Ok(age) => age <= window,
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    fn at(secs_ago: u64, now: SystemTime) -> Option<SystemTime> {
        Some(now - Duration::from_secs(secs_ago))
    }

    fn inputs(now: SystemTime) -> LivenessInputs {
        LivenessInputs {
            pid: None,
            probe: None,
            status_modified: None,
            setup_modified: None,
            now,
        }
    }

    #[test]
    fn test_alive_regardless_of_file_age() {
        let now = SystemTime::now();
        let i = LivenessInputs {
            pid: Some(100),
            probe: Some(ProbeOutcome::Exists),
            status_modified: at(86_400, now),
            setup_modified: at(10, now),
            ..inputs(now)
        };
        assert_eq!(resolve(&i, WINDOW), Liveness::Alive);
    }

    #[test]
    fn test_setup_marker_newer_is_starting() {
        let now = SystemTime::now();
        let i = LivenessInputs {
            status_modified: at(3_600, now),
            setup_modified: at(600, now),
            ..inputs(now)
        };
        assert_eq!(resolve(&i, WINDOW), Liveness::Starting);
    }

    #[test]
    fn test_stale_file_without_pid_is_dead() {
        let now = SystemTime::now();
        let i = LivenessInputs {
            status_modified: at(600, now),
            ..inputs(now)
        };
        assert_eq!(resolve(&i, WINDOW), Liveness::Dead);
    }

    #[test]
    fn test_recent_file_without_pid_is_starting() {
        let now = SystemTime::now();
        let i = LivenessInputs {
            status_modified: at(5, now),
            ..inputs(now)
        };
        assert_eq!(resolve(&i, WINDOW), Liveness::Starting);
    }

    #[test]
    fn test_missing_process_is_dead() {
        let now = SystemTime::now();
        let i = LivenessInputs {
            pid: Some(100),
            probe: Some(ProbeOutcome::Missing),
            status_modified: at(600, now),
            ..inputs(now)
        };
        assert_eq!(resolve(&i, WINDOW), Liveness::Dead);
    }

    #[test]
    fn test_denied_probe_is_unknown() {
        let now = SystemTime::now();
        let i = LivenessInputs {
            pid: Some(1),
            probe: Some(ProbeOutcome::Denied),
            status_modified: at(600, now),
            ..inputs(now)
        };
        assert_eq!(resolve(&i, WINDOW), Liveness::Unknown);
    }

    #[test]
    fn test_setup_marker_older_than_status_is_ignored() {
        let now = SystemTime::now();
        let i = LivenessInputs {
            status_modified: at(600, now),
            setup_modified: at(3_600, now),
            ..inputs(now)
        };
        assert_eq!(resolve(&i, WINDOW), Liveness::Dead);
    }

    #[test]
    fn test_setup_marker_without_status_file_is_starting() {
        let now = SystemTime::now();
        let i = LivenessInputs {
            setup_modified: at(3_600, now),
            ..inputs(now)
        };
        assert_eq!(resolve(&i, WINDOW), Liveness::Starting);
    }

    #[cfg(unix)]
    #[test]
    fn test_os_probe_finds_own_process() {
        assert_eq!(OsProbe.probe(std::process::id()), ProbeOutcome::Exists);
    }

    #[cfg(unix)]
    #[test]
    fn test_os_probe_rejects_pid_zero() {
        assert_eq!(OsProbe.probe(0), ProbeOutcome::Missing);
    }
}
