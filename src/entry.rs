//! One cached log file per domain and its reopen-on-failure write protocol.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use crate::domain::DomainKey;

/// Failure to open or create a domain's log file.
#[derive(Debug, Error)]
#[error("failed to open {}: {source}", .path.display())]
pub struct OpenError {
    /// File that could not be opened.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

/// Failure reported by [`FileEntry::write`] after the single reopen attempt.
#[derive(Debug, Error)]
pub enum WriteError {
    /// The handle was unusable and the file could not be reopened.
    #[error("reopen failed: {0}")]
    Reopen(#[from] OpenError),
    /// The file reopened but the retried write failed as well.
    #[error("write to {} failed after reopen: {source}", .path.display())]
    Retry {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O error from the retried write.
        #[source]
        source: io::Error,
    },
    /// The entry was closed by shutdown and no longer accepts writes.
    #[error("log file for {0} has been retired")]
    Retired(String),
}

/// Result of a successful [`FileEntry::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Bytes appended.
    pub bytes: usize,
    /// Whether the handle had to be reopened first.
    pub reopened: bool,
}

#[derive(Debug)]
struct EntryState {
    handle: Option<File>,
    written_bytes: u64,
    retired: bool,
}

/// Open append handle and bookkeeping for a single domain.
///
/// Every access to the handle and the byte counter goes through the entry's own lock, so writers
/// for one domain are serialized and lines never interleave.
#[derive(Debug)]
pub struct FileEntry {
    domain: DomainKey,
    path: PathBuf,
    roll_size: u64,
    state: Mutex<EntryState>,
}

impl FileEntry {
    /// Build the entry for `domain` under `log_dir` and open its file.
    pub fn open(log_dir: &Path, domain: DomainKey, roll_size: u64) -> Result<Self, OpenError> {
        let path = domain_log_path(log_dir, &domain);
        let (handle, size) = open_append(&path)?;
        Ok(Self {
            domain,
            path,
            roll_size,
            state: Mutex::new(EntryState {
                handle: Some(handle),
                written_bytes: size,
                retired: false,
            }),
        })
    }

    /// Domain this entry was created for.
    pub fn domain(&self) -> &DomainKey {
        &self.domain
    }

    /// Path of the domain's log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured roll threshold. Tracked only; no rotation is performed.
    pub fn roll_size(&self) -> u64 {
        self.roll_size
    }

    /// Approximate file size: on-disk size at (re)open plus bytes appended since.
    pub fn written_bytes(&self) -> u64 {
        self.state.lock().written_bytes
    }

    /// Whether a handle is currently held.
    pub fn is_open(&self) -> bool {
        self.state.lock().handle.is_some()
    }

    /// Append `data` in full, reopening the file and retrying once when the handle is missing or
    /// the first write fails.
    ///
    /// When the first attempt got part of `data` out and the reopened file still ends where that
    /// part ended, only the remainder is retried. Otherwise the whole line is written again.
    pub fn write(&self, data: &[u8]) -> Result<WriteReport, WriteError> {
        let mut state = self.state.lock();
        if state.retired {
            return Err(WriteError::Retired(self.domain.to_string()));
        }

        let mut written = 0;
        let first = match state.handle.as_mut() {
            Some(handle) => write_tracked(handle, data, &mut written).map_err(Some),
            None => Err(None),
        };

        let reopened = match first {
            Ok(()) => false,
            Err(cause) => {
                if let Some(err) = cause {
                    tracing::warn!(
                        domain = %self.domain,
                        path = %self.path.display(),
                        error = %err,
                        written,
                        "Write failed; reopening log file"
                    );
                }
                state.handle = None;

                let expected = state.written_bytes + written as u64;
                let (mut handle, size) = open_append(&self.path)?;
                if written > 0 && size != expected {
                    written = 0;
                }
                state.written_bytes = size - written as u64;
                let retried = write_tracked(&mut handle, data, &mut written);
                state.handle = Some(handle);
                retried.map_err(|source| WriteError::Retry {
                    path: self.path.clone(),
                    source,
                })?;
                true
            }
        };

        state.written_bytes += data.len() as u64;
        Ok(WriteReport {
            bytes: data.len(),
            reopened,
        })
    }

    /// Close the handle, if any. A later write reopens the file.
    pub fn close(&self) {
        self.state.lock().handle = None;
    }

    /// Close the handle and refuse any further writes.
    pub(crate) fn retire(&self) -> bool {
        let mut state = self.state.lock();
        state.retired = true;
        state.handle.take().is_some()
    }

    #[cfg(test)]
    fn replace_handle(&self, handle: File) {
        self.state.lock().handle = Some(handle);
    }
}

/// Write `data[*written..]`, advancing `written` as bytes go out so a caller can resume after an
/// error.
fn write_tracked(out: &mut impl Write, data: &[u8], written: &mut usize) -> io::Result<()> {
    while *written < data.len() {
        match out.write(&data[*written..]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => *written += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// `<log_dir>/domain_<domain>.log`
pub fn domain_log_path(log_dir: &Path, domain: &DomainKey) -> PathBuf {
    log_dir.join(format!("domain_{domain}.log"))
}

fn open_append(path: &Path) -> Result<(File, u64), OpenError> {
    let wrap = |source| OpenError {
        path: path.to_path_buf(),
        source,
    };
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .map_err(wrap)?;
    let size = file.metadata().map_err(wrap)?.len();
    Ok((file, size))
}
