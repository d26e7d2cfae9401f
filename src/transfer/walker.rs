//! Recursive directory replication

use crate::error::{Result, TransferError};
use crate::progress::TransferObserver;
use crate::remote::{remote_join, DirEntry, LocalFileSystem, RemoteAccess};
use crate::transfer::{CancellationToken, Direction};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Per-file callback used by the walker, given `(local, remote)` paths and
/// returning the bytes transferred
pub type FileSink<'s> = dyn FnMut(&Path, &Path) -> Result<u64> + 's;

/// Totals for one directory walk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WalkReport {
    /// Files transferred successfully
    pub files: u64,
    /// Bytes transferred
    pub bytes: u64,
    /// Directories created or reused on the destination side
    pub directories: u64,
    /// Entries that failed, keyed by source path
    pub failures: Vec<(PathBuf, String)>,
    /// The walk stopped early on cancellation; counts cover what finished
    pub cancelled: bool,
}

impl WalkReport {
    /// True when the walk ran to the end and no entry failed
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failures.is_empty()
    }
}

/// Replicates a directory tree in either direction
///
/// The destination directory is created first (an existing directory is
/// fine), then entries are visited depth-first. Files go through the sink;
/// a failing entry is reported on the status line and recorded, and the
/// walk continues with its siblings. Cancellation stops the whole walk and
/// the report keeps the totals of the files finished before it.
pub struct DirectoryWalker<'a> {
    remote: &'a dyn RemoteAccess,
    local: &'a dyn LocalFileSystem,
    observer: &'a dyn TransferObserver,
    cancel: &'a CancellationToken,
    sort_entries: bool,
}

impl<'a> DirectoryWalker<'a> {
    /// Create a walker; entries are sorted by name by default
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
            sort_entries: true,
        }
    }

    /// Visit entries in name order (`true`) or store enumeration order
    pub fn sort_entries(mut self, sort: bool) -> Self {
        self.sort_entries = sort;
        self
    }

    /// Replicate `local_root` to `remote_root` (upload) or the reverse
    pub fn walk(
        &self,
        local_root: &Path,
        remote_root: &Path,
        direction: Direction,
        sink: &mut FileSink<'_>,
    ) -> Result<WalkReport> {
        let mut report = WalkReport::default();
        match self.walk_dir(local_root, remote_root, direction, sink, &mut report) {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => report.cancelled = true,
            Err(e) => return Err(e),
        }
        debug!(
            files = report.files,
            bytes = report.bytes,
            failures = report.failures.len(),
            cancelled = report.cancelled,
            "Directory walk finished"
        );
        Ok(report)
    }

    fn walk_dir(
        &self,
        local_dir: &Path,
        remote_dir: &Path,
        direction: Direction,
        sink: &mut FileSink<'_>,
        report: &mut WalkReport,
    ) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }

        let mut entries = match direction {
            Direction::Upload => {
                self.create_remote_dir(remote_dir)?;
                self.local.list(local_dir)?
            }
            Direction::Download => {
                self.create_local_dir(local_dir)?;
                self.remote.list(remote_dir)?
            }
        };
        report.directories += 1;

        if self.sort_entries {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }

        for entry in entries {
            if self.cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let local_child = local_dir.join(&entry.name);
            let remote_child = remote_join(remote_dir, &entry.name);

            let result = if entry.is_dir {
                self.walk_dir(&local_child, &remote_child, direction, sink, report)
            } else {
                sink(&local_child, &remote_child).map(|bytes| {
                    report.files += 1;
                    report.bytes += bytes;
                })
            };

            match result {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    let source = match direction {
                        Direction::Upload => local_child,
                        Direction::Download => remote_child,
                    };
                    self.report_failure(&entry, source, e, report);
                }
            }
        }

        Ok(())
    }

    fn report_failure(
        &self,
        entry: &DirEntry,
        source: PathBuf,
        error: TransferError,
        report: &mut WalkReport,
    ) {
        warn!(path = %source.display(), error = %error, "Directory entry failed");
        self.observer
            .on_status(&format!("Error: {}: {}", entry.name, error));
        report.failures.push((source, error.to_string()));
    }

    fn create_remote_dir(&self, path: &Path) -> Result<()> {
        match self.remote.mkdir(path) {
            Err(TransferError::AlreadyExists(existing)) => {
                if self.remote.stat(path)?.is_dir {
                    Ok(())
                } else {
                    Err(TransferError::AlreadyExists(existing))
                }
            }
            other => other,
        }
    }

    fn create_local_dir(&self, path: &Path) -> Result<()> {
        match self.local.mkdir(path) {
            Err(TransferError::AlreadyExists(existing)) => {
                if self.local.stat(path)?.is_dir {
                    Ok(())
                } else {
                    Err(TransferError::AlreadyExists(existing))
                }
            }
            other => other,
        }
    }
}
