//! Scoped, lock-protected transactions over mapping store files.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::lock::{default_locker, PathLocker};
use crate::mapping::MappingSet;

/// Transactional access to mapping store files.
///
/// The store keeps no state between calls: every transaction re-reads the
/// file, so edits made by other processes between calls are observed.
/// Transactions on the same path are serialized by the [`PathLocker`];
/// transactions on different paths run independently.
#[derive(Debug, Clone)]
pub struct MappingStore {
    locker: Arc<dyn PathLocker>,
}

impl MappingStore {
    /// Creates a store using the platform default locker.
    ///
    /// On unix the lock is a host-wide `flock`. Other targets fall back to
    /// [`crate::InMemoryLocker`], which excludes only within this process.
    pub fn new() -> Self {
        Self::with_locker(default_locker())
    }

    /// Creates a store using a specific locker.
    pub fn with_locker(locker: Arc<dyn PathLocker>) -> Self {
        Self { locker }
    }

    /// Runs `body` against the mapping set stored at `path`.
    ///
    /// The lock is held for the whole call. If `body` returns an error the
    /// set is restored to what was read before the file is rewritten, so a
    /// failed body never commits a partial mutation. The body's error is
    /// returned in that case even if the rewrite fails too.
    pub fn transaction<T, E, F>(&self, path: impl AsRef<Path>, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut MappingSet) -> Result<T, E>,
        E: From<StoreError>,
    {
        let path = path.as_ref();
        let _guard = self.locker.acquire(path)?;

        let mut mappings = Self::load(path);
        let snapshot = mappings.clone();

        let result = body(&mut mappings);
        if result.is_err() {
            debug!(path = %path.display(), "Transaction failed, rolling back");
            mappings = snapshot;
        }

        match (Self::persist(path, &mappings), result) {
            (Ok(()), result) => result,
            (Err(write_err), Ok(_)) => Err(write_err.into()),
            (Err(write_err), Err(body_err)) => {
                warn!(path = %write_err.path().display(), error = %write_err, "Failed to rewrite store after rollback");
                Err(body_err)
            }
        }
    }

    /// Reads the mapping set at `path` under the lock, without writing.
    pub fn read(&self, path: impl AsRef<Path>) -> StoreResult<MappingSet> {
        let path = path.as_ref();
        let _guard = self.locker.acquire(path)?;
        Ok(Self::load(path))
    }

    /// Reads the mapping set at `path` without locking.
    ///
    /// Missing, empty or unparsable files read as an empty set.
    pub fn load(path: impl AsRef<Path>) -> MappingSet {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return MappingSet::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable mapping store, using empty state");
                return MappingSet::new();
            }
        };

        if content.trim().is_empty() {
            return MappingSet::new();
        }

        match serde_yaml::from_str::<Option<MappingSet>>(&content) {
            Ok(mappings) => mappings.unwrap_or_default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt mapping store, using empty state");
                MappingSet::new()
            }
        }
    }

    /// Atomically replaces the file at `path` with `mappings`.
    fn persist(path: &Path, mappings: &MappingSet) -> StoreResult<()> {
        let data = serde_yaml::to_string(mappings).map_err(|e| StoreError::Serialize {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::write(path, e))?;
        tmp.write_all(data.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StoreError::write(path, e))?;
        tmp.persist(path)
            .map_err(|e| StoreError::write(path, e.error))?;

        debug!(path = %path.display(), entries = mappings.len(), "Mapping store written");
        Ok(())
    }
}

impl Default for MappingStore {
    fn default() -> Self {
        Self::new()
    }
}
