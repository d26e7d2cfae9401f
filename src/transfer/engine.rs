//! Batch transfer engine
//!
//! A batch is a list of jobs processed sequentially on one background
//! thread. Only one batch runs at a time: submitting while busy is rejected,
//! never queued. Cancellation is cooperative and observed after the chunk
//! in flight or before the next job.

use crate::config::TransferSettings;
use crate::error::{Result, TransferError};
use crate::history::{LogEntry, TransferLog};
use crate::progress::{NoopObserver, TransferObserver};
use crate::remote::{LocalFileSystem, RemoteAccess, StdFileSystem};
use crate::transfer::{
    BatchReport, CancellationToken, Direction, DirectoryWalker, JobOutcome, JobStatus,
    SingleFileTransfer, TransferJob,
};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Name of the batch worker thread
const WORKER_THREAD_NAME: &str = "picopy-batch";

/// Flags shared between the engine and its worker
#[derive(Debug, Default)]
struct BatchState {
    in_progress: AtomicBool,
    cancel: CancellationToken,
}

/// Resets the batch state when the worker exits, even by panic
struct BatchGuard {
    state: Arc<BatchState>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.state.cancel.reset();
        self.state.in_progress.store(false, Ordering::SeqCst);
    }
}

/// Handle to a running batch
#[derive(Debug)]
pub struct BatchHandle {
    handle: JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// Block until the batch finishes and return its report
    pub fn wait(self) -> Result<BatchReport> {
        self.handle
            .join()
            .map_err(|_| TransferError::Internal("batch worker panicked".to_string()))
    }

    /// Whether the worker thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Single-flight batch transfer engine
///
/// The engine holds the remote store it was built with; the observer
/// receives every event from the worker thread.
pub struct TransferEngine {
    remote: Arc<dyn RemoteAccess>,
    local: Arc<dyn LocalFileSystem>,
    observer: Arc<dyn TransferObserver>,
    settings: TransferSettings,
    state: Arc<BatchState>,
    log: Arc<Mutex<TransferLog>>,
}

impl TransferEngine {
    /// Create an engine over `remote` using the local disk and no observer
    pub fn new(remote: Arc<dyn RemoteAccess>, settings: TransferSettings) -> Self {
        let log = TransferLog::with_capacity(settings.log_capacity);
        Self {
            remote,
            local: Arc::new(StdFileSystem),
            observer: Arc::new(NoopObserver),
            settings,
            state: Arc::new(BatchState::default()),
            log: Arc::new(Mutex::new(log)),
        }
    }

    /// Replace the local filesystem
    pub fn with_local_fs(mut self, local: Arc<dyn LocalFileSystem>) -> Self {
        self.local = local;
        self
    }

    /// Set the observer
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Start from an existing log, e.g. one loaded from disk
    pub fn with_log(self, log: TransferLog) -> Self {
        *self.lock_log() = log;
        self
    }

    /// Engine settings
    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    /// Start a batch; returns `false` without side effects if one is running
    pub fn submit(&self, jobs: Vec<TransferJob>, direction: Direction) -> bool {
        self.try_submit(jobs, direction).is_ok()
    }

    /// Start a batch and return a handle to its report
    ///
    /// Fails with [`TransferError::Busy`] if a batch is already running.
    pub fn try_submit(&self, jobs: Vec<TransferJob>, direction: Direction) -> Result<BatchHandle> {
        if self
            .state
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Rejected batch submit while busy");
            return Err(TransferError::Busy);
        }
        self.state.cancel.reset();

        let guard = BatchGuard {
            state: Arc::clone(&self.state),
        };
        let worker = BatchWorker {
            remote: Arc::clone(&self.remote),
            local: Arc::clone(&self.local),
            observer: Arc::clone(&self.observer),
            settings: self.settings.clone(),
            cancel: self.state.cancel.clone(),
            log: Arc::clone(&self.log),
        };

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let _guard = guard;
                worker.run(jobs, direction)
            })
            .map_err(|e| TransferError::Internal(format!("failed to spawn worker: {}", e)))?;

        Ok(BatchHandle { handle })
    }

    /// Request cancellation of the running batch
    pub fn cancel(&self) {
        if self.is_in_progress() {
            info!("Cancellation requested");
        }
        self.state.cancel.cancel();
    }

    /// Whether a batch is running
    pub fn is_in_progress(&self) -> bool {
        self.state.in_progress.load(Ordering::SeqCst)
    }

    /// Token shared with the running batch
    pub fn cancellation_token(&self) -> CancellationToken {
        self.state.cancel.clone()
    }

    /// Snapshot of the transfer log, oldest first
    pub fn log(&self) -> Vec<LogEntry> {
        self.lock_log().entries()
    }

    /// Empty the transfer log
    pub fn clear_log(&self) {
        self.lock_log().clear();
    }

    /// Persist the transfer log as JSON
    pub fn save_log(&self, path: &Path) -> Result<()> {
        self.lock_log().save(path)
    }

    fn lock_log(&self) -> MutexGuard<'_, TransferLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Everything the background thread needs for one batch
struct BatchWorker {
    remote: Arc<dyn RemoteAccess>,
    local: Arc<dyn LocalFileSystem>,
    observer: Arc<dyn TransferObserver>,
    settings: TransferSettings,
    cancel: CancellationToken,
    log: Arc<Mutex<TransferLog>>,
}

impl BatchWorker {
    fn run(&self, jobs: Vec<TransferJob>, direction: Direction) -> BatchReport {
        let started = Instant::now();
        let total = jobs.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut cancelled = false;

        info!(jobs = total, %direction, "Starting transfer batch");

        for (index, job) in jobs.into_iter().enumerate() {
            if cancelled || self.cancel.is_cancelled() {
                cancelled = true;
                outcomes.push(JobOutcome {
                    job,
                    status: JobStatus::Skipped,
                    duration: Duration::ZERO,
                });
                continue;
            }

            let name = job.name();
            self.observer
                .on_status(&format!("Transferring ({}/{}): {}", index + 1, total, name));

            let job_started = Instant::now();
            let status = match self.run_job(&job, direction) {
                Ok(status @ JobStatus::Cancelled { .. }) => {
                    cancelled = true;
                    status
                }
                Ok(status) => status,
                Err(e) if e.is_cancelled() => {
                    cancelled = true;
                    JobStatus::Cancelled { files: 0, bytes: 0 }
                }
                Err(e) => {
                    warn!(job = %name, error = %e, "Transfer failed");
                    self.observer
                        .on_status(&format!("Transfer failed: {}: {}", name, e));
                    JobStatus::Failed(e.to_string())
                }
            };

            outcomes.push(JobOutcome {
                job,
                status,
                duration: job_started.elapsed(),
            });
            if !cancelled {
                self.observer
                    .on_batch_progress((index + 1) as f64 / total as f64 * 100.0);
            }
        }

        if cancelled {
            info!("Transfer batch cancelled");
            self.observer.on_status("Transfer cancelled");
        } else {
            info!(elapsed = ?started.elapsed(), "Transfer batch completed");
            self.observer.on_status("Transfer completed");
        }

        BatchReport {
            direction,
            outcomes,
            cancelled,
            duration: started.elapsed(),
        }
    }

    fn run_job(&self, job: &TransferJob, direction: Direction) -> Result<JobStatus> {
        if !self.remote.is_connected() {
            return Err(TransferError::ConnectionUnavailable);
        }

        let (local_path, remote_path) = job.endpoints(direction);
        let is_dir = match direction {
            Direction::Upload => self.local.stat(local_path)?.is_dir,
            Direction::Download => self.remote.stat(remote_path)?.is_dir,
        };

        if !is_dir {
            let bytes = self.transfer_file(local_path, remote_path, direction)?;
            return Ok(JobStatus::Completed { files: 1, bytes });
        }

        let walker = DirectoryWalker::new(
            self.remote.as_ref(),
            self.local.as_ref(),
            self.observer.as_ref(),
            &self.cancel,
        )
        .sort_entries(self.settings.sort_entries);

        let report = walker.walk(local_path, remote_path, direction, &mut |local: &Path, remote: &Path| {
            self.transfer_file(local, remote, direction)
        })?;

        if report.cancelled {
            Ok(JobStatus::Cancelled {
                files: report.files,
                bytes: report.bytes,
            })
        } else if report.is_complete() {
            Ok(JobStatus::Completed {
                files: report.files,
                bytes: report.bytes,
            })
        } else {
            Ok(JobStatus::Partial {
                files: report.files,
                bytes: report.bytes,
                failures: report.failures,
            })
        }
    }

    /// Transfer one file and record it in the log unless the batch was
    /// cancelled meanwhile
    fn transfer_file(&self, local_path: &Path, remote_path: &Path, direction: Direction) -> Result<u64> {
        let report = SingleFileTransfer::new(
            self.remote.as_ref(),
            self.local.as_ref(),
            self.observer.as_ref(),
            &self.cancel,
        )
        .with_partial_policy(self.settings.partial_file_policy)
        .run(local_path, remote_path, direction)?;

        if !self.cancel.is_cancelled() {
            let source = match direction {
                Direction::Upload => local_path,
                Direction::Download => remote_path,
            };
            let entry = LogEntry::new(
                direction,
                source,
                Some(report.bytes),
                Some(report.duration.as_secs_f64()),
            );
            self.log.lock().unwrap_or_else(|e| e.into_inner()).append(entry);
        }

        Ok(report.bytes)
    }
}
