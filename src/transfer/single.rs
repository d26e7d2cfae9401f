//! Single file transfer with progress and cancellation

use crate::config::PartialFilePolicy;
use crate::error::{Result, TransferError};
use crate::progress::{deliver_update, ProgressTracker, TransferObserver};
use crate::remote::{ChunkControl, ChunkHook, LocalFileSystem, RemoteAccess};
use crate::transfer::{CancellationToken, Direction};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of a successful file transfer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileReport {
    /// Bytes written to the destination
    pub bytes: u64,
    /// Size of the source when the transfer started
    pub total_bytes: u64,
    /// Wall-clock duration
    pub duration: Duration,
    /// Whether the progress-less fallback was used
    pub used_fallback: bool,
}

/// Streams one file between the local filesystem and the remote store
///
/// Progress is computed per chunk and forwarded to the observer; the
/// cancellation token is consulted after every chunk. If the remote rejects
/// the progress hook the file is retried once without it and a single 100%
/// update is reported on success.
pub struct SingleFileTransfer<'a> {
    remote: &'a dyn RemoteAccess,
    local: &'a dyn LocalFileSystem,
    observer: &'a dyn TransferObserver,
    cancel: &'a CancellationToken,
    partial_policy: PartialFilePolicy,
}

impl<'a> SingleFileTransfer<'a> {
    /// Create a transfer using the default partial-file policy
    pub fn new(
        remote: &'a dyn RemoteAccess,
        local: &'a dyn LocalFileSystem,
        observer: &'a dyn TransferObserver,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            remote,
            local,
            observer,
            cancel,
            partial_policy: PartialFilePolicy::default(),
        }
    }

    /// Set what happens to a partially written destination
    pub fn with_partial_policy(mut self, policy: PartialFilePolicy) -> Self {
        self.partial_policy = policy;
        self
    }

    /// Copy `local_path` to `remote_path` (upload) or the reverse (download)
    pub fn run(&self, local_path: &Path, remote_path: &Path, direction: Direction) -> Result<FileReport> {
        if !self.remote.is_connected() {
            return Err(TransferError::ConnectionUnavailable);
        }
        if self.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let started = Instant::now();
        let total_bytes = match direction {
            Direction::Upload => self.local.stat(local_path)?.size,
            Direction::Download => self.remote.stat(remote_path)?.size,
        };
        let tracker = ProgressTracker::new(total_bytes);

        debug!(
            local = %local_path.display(),
            remote = %remote_path.display(),
            %direction,
            bytes = total_bytes,
            "Starting file transfer"
        );

        if total_bytes == 0 {
            let bytes = self
                .stream(local_path, remote_path, direction, None)
                .map_err(|e| self.discard_partial(local_path, remote_path, direction, e, false))?;
            deliver_update(self.observer, &tracker.update(bytes));
            return Ok(FileReport {
                bytes,
                total_bytes,
                duration: started.elapsed(),
                used_fallback: false,
            });
        }

        let mut last_percent: Option<f64> = None;
        let mut wrote_bytes = false;
        let result = {
            let mut hook = |bytes: u64| {
                wrote_bytes = true;
                let update = tracker.update(bytes);
                if last_percent.map_or(true, |last| update.percent >= last) {
                    last_percent = Some(update.percent);
                    deliver_update(self.observer, &update);
                }
                if self.cancel.is_cancelled() {
                    ChunkControl::Abort
                } else {
                    ChunkControl::Continue
                }
            };
            self.stream(local_path, remote_path, direction, Some(&mut hook))
        };

        let (bytes, used_fallback) = match result {
            Ok(bytes) => (bytes, false),
            Err(TransferError::ProgressUnsupported(_)) => {
                warn!(
                    path = %remote_path.display(),
                    "Chunked progress rejected, retrying without progress"
                );
                if self.cancel.is_cancelled() {
                    return Err(TransferError::Cancelled);
                }
                let bytes = self
                    .stream(local_path, remote_path, direction, None)
                    .map_err(|e| self.discard_partial(local_path, remote_path, direction, e, true))?;
                last_percent = None;
                (bytes, true)
            }
            Err(e) => {
                return Err(self.discard_partial(local_path, remote_path, direction, e, wrote_bytes))
            }
        };

        if last_percent != Some(100.0) {
            deliver_update(self.observer, &tracker.update(total_bytes.max(bytes)));
        }

        debug!(bytes, used_fallback, "File transfer finished");

        Ok(FileReport {
            bytes,
            total_bytes,
            duration: started.elapsed(),
            used_fallback,
        })
    }

    fn stream(
        &self,
        local_path: &Path,
        remote_path: &Path,
        direction: Direction,
        on_chunk: Option<&mut ChunkHook<'_>>,
    ) -> Result<u64> {
        match direction {
            Direction::Upload => self.remote.put(local_path, remote_path, on_chunk),
            Direction::Download => self.remote.get(remote_path, local_path, on_chunk),
        }
    }

    /// Apply the partial-file policy after a failed stream and hand the
    /// error back
    fn discard_partial(
        &self,
        local_path: &Path,
        remote_path: &Path,
        direction: Direction,
        error: TransferError,
        wrote_bytes: bool,
    ) -> TransferError {
        if self.partial_policy == PartialFilePolicy::Keep || !(wrote_bytes || error.is_cancelled()) {
            return error;
        }

        let (destination, removed) = match direction {
            Direction::Upload => (remote_path, self.remote.remove(remote_path)),
            Direction::Download => (local_path, self.local.remove(local_path)),
        };
        match removed {
            Ok(()) => debug!(path = %destination.display(), "Removed partial file"),
            Err(TransferError::NotFound(_)) => {}
            Err(e) => warn!(path = %destination.display(), error = %e, "Failed to remove partial file"),
        }

        error
    }
}
