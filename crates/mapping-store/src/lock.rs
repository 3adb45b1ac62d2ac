//! Exclusive per-path locks guarding store files.
//!
//! A [`PathLocker`] hands out at most one [`LockGuard`] per path at a time;
//! other callers block in [`PathLocker::acquire`] until the guard is dropped.
//! There is no timeout: a holder that never releases stalls every later
//! transaction on that path.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::StoreResult;

/// Held lock; releases on drop.
pub struct LockGuard {
    _held: Box<dyn Send>,
}

impl LockGuard {
    /// Wraps any value whose drop releases the lock.
    pub fn new<T: Send + 'static>(held: T) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

/// Named exclusive lock keyed by store file path.
pub trait PathLocker: Send + Sync + fmt::Debug {
    /// Blocks until the lock for `path` is held by the caller.
    fn acquire(&self, path: &Path) -> StoreResult<LockGuard>;
}

/// Returns the locker used by [`crate::MappingStore::new`].
///
/// File locks on unix, process-local locks elsewhere. On non-unix targets
/// transactions are therefore only serialized within one process; separate
/// processes sharing a store file are not excluded from each other.
pub fn default_locker() -> Arc<dyn PathLocker> {
    #[cfg(unix)]
    {
        Arc::new(FileLocker)
    }
    #[cfg(not(unix))]
    {
        Arc::new(InMemoryLocker::new())
    }
}

#[cfg(unix)]
pub use self::file::FileLocker;

#[cfg(unix)]
mod file {
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::path::{Path, PathBuf};

    use nix::errno::Errno;
    use nix::fcntl::{Flock, FlockArg};
    use tracing::trace;

    use super::{LockGuard, PathLocker};
    use crate::error::{StoreError, StoreResult};

    /// Advisory `flock(2)` on a `<path>.lock` sidecar file.
    ///
    /// Works across processes and across threads of one process, since each
    /// acquire opens its own file description. The sidecar is created on
    /// first use and left in place.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct FileLocker;

    impl FileLocker {
        /// Returns the sidecar lock file for a store file.
        pub fn lock_path(path: &Path) -> PathBuf {
            let mut name = path.as_os_str().to_owned();
            name.push(".lock");
            PathBuf::from(name)
        }
    }

    impl PathLocker for FileLocker {
        fn acquire(&self, path: &Path) -> StoreResult<LockGuard> {
            let lock_path = Self::lock_path(path);
            let mut file: File = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)
                .map_err(|e| StoreError::lock(path, e))?;

            let held = loop {
                match Flock::lock(file, FlockArg::LockExclusive) {
                    Ok(held) => break held,
                    Err((f, Errno::EINTR)) => file = f,
                    Err((_, errno)) => return Err(StoreError::lock(path, io::Error::from(errno))),
                }
            };

            trace!(lock = %lock_path.display(), "Acquired file lock");
            Ok(LockGuard::new(held))
        }
    }
}

/// Process-local stand-in for [`FileLocker`].
///
/// Serializes callers sharing one `InMemoryLocker` (or a clone of it) without
/// touching the filesystem.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLocker {
    locks: Arc<HeldPaths>,
}

#[derive(Debug, Default)]
struct HeldPaths {
    held: Mutex<HashSet<PathBuf>>,
    released: Condvar,
}

struct InMemoryHold {
    locks: Arc<HeldPaths>,
    path: PathBuf,
}

impl Drop for InMemoryHold {
    fn drop(&mut self) {
        self.locks.held.lock().remove(&self.path);
        self.locks.released.notify_all();
        trace!(path = %self.path.display(), "Released in-memory lock");
    }
}

impl InMemoryLocker {
    /// Creates a locker with no held paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if some guard for `path` is alive.
    pub fn is_locked(&self, path: &Path) -> bool {
        self.locks.held.lock().contains(path)
    }
}

impl PathLocker for InMemoryLocker {
    fn acquire(&self, path: &Path) -> StoreResult<LockGuard> {
        let mut held = self.locks.held.lock();
        while held.contains(path) {
            self.locks.released.wait(&mut held);
        }
        held.insert(path.to_path_buf());
        drop(held);

        trace!(path = %path.display(), "Acquired in-memory lock");
        Ok(LockGuard::new(InMemoryHold {
            locks: Arc::clone(&self.locks),
            path: path.to_path_buf(),
        }))
    }
}
