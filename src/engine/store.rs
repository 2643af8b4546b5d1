//! Persistence of the previous-cycle state.
//!
//! The file store is keyed by campaign root, written to a temp file and
//! renamed into place, and guarded by an advisory lock so that independent
//! runs against the same campaign do not corrupt each other's counters.

use std::fmt::Debug;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use super::delta::PreviousCycleState;
use crate::error::StoreError;

/// Load/save interface over [`PreviousCycleState`].
pub trait StateStore: Send + Sync + Debug {
    /// Returns `Ok(None)` if nothing has been stored for this campaign yet.
    fn load(&self) -> Result<Option<PreviousCycleState>, StoreError>;
    fn save(&self, state: &PreviousCycleState) -> Result<(), StoreError>;
}

/// File-backed store under a state directory.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
    lock_path: PathBuf,
    root: PathBuf,
}

impl FileStateStore {
    /// Store for one campaign root. The file name is derived from the root.
    pub fn for_campaign(state_dir: &Path, root: &Path) -> Self {
        let key = format!("{:x}", md5::compute(root.to_string_lossy().as_bytes()));
        Self {
            path: state_dir.join(format!("campaign-{}.json", key)),
            lock_path: state_dir.join(format!("campaign-{}.lock", key)),
            root: root.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self, exclusive: bool) -> Result<LockGuard, StoreError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .map_err(|source| StoreError::Lock {
                path: self.lock_path.clone(),
                source,
            })?;
        LockGuard::acquire(file, exclusive).map_err(|source| StoreError::Lock {
            path: self.lock_path.clone(),
            source,
        })
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<PreviousCycleState>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let _guard = self.lock(false)?;

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: PreviousCycleState =
            serde_json::from_slice(&bytes).map_err(StoreError::Corrupt)?;

        // Hash collision or a moved campaign
        if state.root != self.root {
            return Ok(None);
        }
        Ok(Some(state))
    }

    fn save(&self, state: &PreviousCycleState) -> Result<(), StoreError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let json = serde_json::to_vec_pretty(state).map_err(StoreError::Encode)?;

        let _guard = self.lock(true)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

/// Advisory `flock`, released when the descriptor closes on drop.
struct LockGuard {
    #[allow(dead_code)]
    file: File,
}

impl LockGuard {
    #[cfg(unix)]
    fn acquire(file: File, exclusive: bool) -> std::io::Result<Self> {
        use std::os::unix::io::AsRawFd;

        let op = if exclusive {
            libc::LOCK_EX
        } else {
            libc::LOCK_SH
        };
        // SAFETY: the descriptor is owned by `file` and stays open while locked.
        let ret = unsafe { libc::flock(file.as_raw_fd(), op) };
        if ret != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(Self { file })
    }

    #[cfg(not(unix))]
    fn acquire(file: File, _exclusive: bool) -> std::io::Result<Self> {
        Ok(Self { file })
    }
}

/// In-memory store, used when persistence is disabled.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<PreviousCycleState>>,
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<PreviousCycleState>, StoreError> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &PreviousCycleState) -> Result<(), StoreError> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }
}
