//! Bounded, admission-controlled map from domain key to open log file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::domain::DomainKey;
use crate::entry::{FileEntry, OpenError};

/// Default number of domains kept open at once.
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// Reasons [`DomainCache::get_or_create`] refuses a domain.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache already holds its maximum number of domains.
    #[error("cache full ({capacity} domains)")]
    Full {
        /// Configured capacity.
        capacity: usize,
    },
    /// The domain's log file could not be created.
    #[error(transparent)]
    Open(#[from] OpenError),
    /// The cache has been drained by shutdown.
    #[error("cache has been shut down")]
    Closed,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<DomainKey, Arc<FileEntry>>,
    closed: bool,
}

/// Domain key to [`FileEntry`] map guarded by one coarse lock.
///
/// Entries are created on first sight and live until [`DomainCache::drain`]. Once `capacity`
/// domains are cached, unseen domains are rejected; nothing is evicted.
#[derive(Debug)]
pub struct DomainCache {
    log_dir: PathBuf,
    capacity: usize,
    roll_size: u64,
    state: Mutex<CacheState>,
}

impl DomainCache {
    /// Create an empty cache writing under `log_dir`.
    pub fn new(log_dir: impl Into<PathBuf>, capacity: usize, roll_size: u64) -> Self {
        Self {
            log_dir: log_dir.into(),
            capacity,
            roll_size,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Directory holding the domain files.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Maximum number of cached domains.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached domains.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether no domain has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up the entry for `domain`, opening its file on first sight.
    ///
    /// The global lock is held across the lookup, the capacity check, and the open, so two
    /// first writers for the same domain always end up sharing one entry.
    pub fn get_or_create(&self, domain: &DomainKey) -> Result<Arc<FileEntry>, CacheError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CacheError::Closed);
        }

        if let Some(entry) = state.entries.get(domain) {
            return Ok(Arc::clone(entry));
        }

        if state.entries.len() >= self.capacity {
            tracing::warn!(capacity = self.capacity, domain = %domain, "Domain cache full");
            return Err(CacheError::Full {
                capacity: self.capacity,
            });
        }

        let entry = match FileEntry::open(&self.log_dir, domain.clone(), self.roll_size) {
            Ok(entry) => Arc::new(entry),
            Err(err) => {
                tracing::error!(domain = %domain, error = %err, "Failed to open domain log file");
                return Err(err.into());
            }
        };
        state.entries.insert(domain.clone(), Arc::clone(&entry));
        tracing::debug!(
            domain = %domain,
            path = %entry.path().display(),
            cached = state.entries.len(),
            "Created cache entry"
        );
        Ok(entry)
    }

    /// Close every cached file and discard the map.
    ///
    /// Each entry is locked in turn while the global lock is held; entries are retired so a writer
    /// still holding one cannot reopen its file. Returns how many handles were open.
    pub fn drain(&self) -> usize {
        let mut state = self.state.lock();
        state.closed = true;
        let mut closed = 0;
        for entry in state.entries.values() {
            if entry.retire() {
                closed += 1;
            }
        }
        state.entries.clear();
        closed
    }
}
