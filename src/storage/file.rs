//! File-backed heartbeat storage.
//!
//! One JSON file per app (`heartbeats-<app_id>.json`). Writes go to a temp
//! file in the same directory which is then renamed over the target, so a
//! failed write never leaves a truncated bundle behind.
//!
//! Every read and get-and-set holds two locks:
//!
//! - a process-wide mutex shared by all handles on the same canonical path
//! - an exclusive advisory lock on a sidecar `<file>.lock`, for other
//!   processes using the same directory
//!
//! The sidecar is locked rather than the bundle itself because the bundle
//! is replaced by rename on every write.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use fd_lock::RwLock as FileLock;
use once_cell::sync::Lazy;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{BundleTransform, HeartbeatStorage};
use crate::error::{HeartbeatError, Result};
use crate::heartbeat::HeartbeatsBundle;

/// One mutex per canonical bundle path, shared by every `FileStorage` handle.
static PATH_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = Lazy::new(Default::default);

/// Heartbeat bundle persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage at an explicit file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Storage for `app_id` inside `dir`.
    pub fn for_app(dir: &Path, app_id: &str) -> Self {
        Self::new(dir.join(file_name_for_app(app_id)))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Option<HeartbeatsBundle>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(HeartbeatError::Storage(format!(
                    "Failed to read heartbeats from {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        let bundle = serde_json::from_str(&content).map_err(|e| {
            HeartbeatError::Storage(format!(
                "Failed to parse heartbeats JSON at {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(bundle))
    }

    fn store(&self, bundle: Option<&HeartbeatsBundle>) -> Result<()> {
        let Some(bundle) = bundle else {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(HeartbeatError::Storage(format!(
                    "Failed to clear heartbeats at {}: {}",
                    self.path.display(),
                    e
                ))),
            };
        };

        let parent = self.ensure_parent()?;
        let json = serde_json::to_vec(bundle)?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| {
            HeartbeatError::Storage(format!(
                "Failed to create temp file in {}: {}",
                parent.display(),
                e
            ))
        })?;
        tmp.write_all(&json)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| HeartbeatError::Storage(format!("Failed to write heartbeats: {}", e)))?;
        tmp.persist(&self.path).map_err(|e| {
            HeartbeatError::Storage(format!(
                "Failed to write heartbeats to {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        Ok(())
    }

    /// Directory holding the bundle, created if missing.
    fn ensure_parent(&self) -> Result<&Path> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(|e| {
            HeartbeatError::Storage(format!(
                "Failed to create heartbeat directory {}: {}",
                parent.display(),
                e
            ))
        })?;
        Ok(parent)
    }

    /// Run `f` while holding the path mutex and the sidecar file lock.
    fn exclusive<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let parent = self.ensure_parent()?;
        let file_name = self.path.file_name().ok_or_else(|| {
            HeartbeatError::Storage(format!(
                "Heartbeat path {} has no file name",
                self.path.display()
            ))
        })?;

        let key = parent
            .canonicalize()
            .map(|dir| dir.join(file_name))
            .unwrap_or_else(|_| self.path.clone());
        let path_lock = {
            let mut locks = PATH_LOCKS.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(key).or_default())
        };
        // The guarded state is `()`, so a poisoned lock carries nothing stale.
        let _path_guard = path_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut lock_name = file_name.to_os_string();
        lock_name.push(".lock");
        let lock_path = parent.join(lock_name);
        let mut file_lock = FileLock::new(open_lock_file(&lock_path)?);
        let _file_guard = file_lock.write().map_err(|e| {
            HeartbeatError::Storage(format!(
                "Failed to lock {}: {}",
                lock_path.display(),
                e
            ))
        })?;

        f()
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| {
            HeartbeatError::Storage(format!("Failed to open {}: {}", path.display(), e))
        })
}

impl HeartbeatStorage for FileStorage {
    fn read(&self) -> Result<Option<HeartbeatsBundle>> {
        self.exclusive(|| self.load())
    }

    fn get_and_set(&self, transform: BundleTransform<'_>) -> Result<Option<HeartbeatsBundle>> {
        self.exclusive(|| {
            let previous = self.load()?;
            let next = transform(previous.clone());
            if next == previous {
                debug!("Heartbeat bundle unchanged, skipping write");
                return Ok(previous);
            }

            if let Err(e) = self.store(next.as_ref()) {
                warn!("Heartbeat storage write failed: {}", e);
                return Err(e);
            }
            Ok(previous)
        })
    }
}

/// File name for an app's bundle; characters outside `[A-Za-z0-9._-]` become `_`.
pub(crate) fn file_name_for_app(app_id: &str) -> String {
    let safe: String = app_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("heartbeats-{}.json", safe)
}
