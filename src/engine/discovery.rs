//! Campaign root inspection and instance discovery.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::data::STATUS_FILE;
use crate::error::MonitorError;
use crate::probe::SETUP_MARKER;

/// How instances are laid out under the campaign root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
    /// The root itself holds one status file.
    Single,
    /// Each qualifying child directory is one instance.
    SyncDirectory,
}

/// The campaign root and how it was interpreted this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignRoot {
    pub path: PathBuf,
    pub mode: DiscoveryMode,
}

/// One discovered instance directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDir {
    pub id: String,
    pub path: PathBuf,
}

/// Inspect the root and list instance directories, sorted by id.
///
/// The root layout is decided afresh on every call. This probes every child
/// on the calling thread; the scheduler uses [`list_candidates`] and
/// [`qualifies`] instead so each child is probed under its own timeout.
pub fn discover(root: &Path) -> Result<(CampaignRoot, Vec<InstanceDir>), MonitorError> {
    let (campaign, candidates) = list_candidates(root)?;
    if campaign.mode == DiscoveryMode::Single {
        return Ok((campaign, candidates));
    }

    let instances: Vec<InstanceDir> =
        candidates.into_iter().filter(|dir| qualifies(&dir.path)).collect();
    if instances.is_empty() {
        return Err(MonitorError::NoInstancesDiscovered(campaign.path));
    }
    Ok((campaign, instances))
}

/// Decide the root layout and list possible instance directories, sorted
/// by id.
///
/// In single mode the one entry is already known to be an instance. In sync
/// mode only the root listing is read: children are not stat'ed, so a hung
/// child cannot stall the listing. Each candidate still has to pass
/// [`qualifies`].
pub fn list_candidates(root: &Path) -> Result<(CampaignRoot, Vec<InstanceDir>), MonitorError> {
    if !root.is_dir() {
        return Err(MonitorError::RootNotFound(root.to_path_buf()));
    }
    let path = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    if path.join(STATUS_FILE).is_file() {
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string());
        let campaign = CampaignRoot {
            path: path.clone(),
            mode: DiscoveryMode::Single,
        };
        return Ok((campaign, vec![InstanceDir { id, path }]));
    }

    let entries = fs::read_dir(&path).map_err(|source| MonitorError::RootUnreadable {
        path: path.clone(),
        source,
    })?;

    // file_type() comes from the directory listing on most platforms
    let mut candidates: Vec<InstanceDir> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let id = entry.file_name().to_string_lossy().into_owned();
            let listed = entry
                .file_type()
                .map(|t| t.is_dir() || t.is_symlink())
                .unwrap_or(false);
            (listed && !id.starts_with('.')).then(|| InstanceDir {
                id,
                path: entry.path(),
            })
        })
        .collect();

    if candidates.is_empty() {
        return Err(MonitorError::NoInstancesDiscovered(path));
    }
    candidates.sort_by(|a, b| a.id.cmp(&b.id));

    let campaign = CampaignRoot {
        path,
        mode: DiscoveryMode::SyncDirectory,
    };
    Ok((campaign, candidates))
}

/// A child directory is an instance once it holds a status file or a setup
/// marker.
pub fn qualifies(dir: &Path) -> bool {
    dir.is_dir() && (dir.join(STATUS_FILE).exists() || dir.join(SETUP_MARKER).exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_single_instance_root() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join(STATUS_FILE));

        let (root, instances) = discover(dir.path()).unwrap();
        assert_eq!(root.mode, DiscoveryMode::Single);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].path, root.path);
    }

    #[test]
    fn test_sync_directory_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["secondary02", "main", "secondary01", ".hidden", "queue_only"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        touch(&dir.path().join("secondary02").join(STATUS_FILE));
        touch(&dir.path().join("main").join(STATUS_FILE));
        touch(&dir.path().join("secondary01").join(SETUP_MARKER));
        touch(&dir.path().join(".hidden").join(STATUS_FILE));
        touch(&dir.path().join("stray_file"));

        let (root, instances) = discover(dir.path()).unwrap();
        assert_eq!(root.mode, DiscoveryMode::SyncDirectory);
        let ids: Vec<&str> = instances.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["main", "secondary01", "secondary02"]);
    }

    #[test]
    fn test_missing_root() {
        let err = discover(Path::new("/nonexistent/campaign")).unwrap_err();
        assert!(matches!(err, MonitorError::RootNotFound(_)));
    }

    #[test]
    fn test_empty_root_has_no_instances() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("empty")).unwrap();
        let err = discover(dir.path()).unwrap_err();
        assert!(matches!(err, MonitorError::NoInstancesDiscovered(_)));
    }

    #[test]
    fn test_candidates_skip_files_and_hidden_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("queue_only")).unwrap();
        fs::create_dir(dir.path().join(".state")).unwrap();
        touch(&dir.path().join("stray_file"));

        let (root, candidates) = list_candidates(dir.path()).unwrap();
        assert_eq!(root.mode, DiscoveryMode::SyncDirectory);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "queue_only");
        assert!(!qualifies(&candidates[0].path));
    }
}
