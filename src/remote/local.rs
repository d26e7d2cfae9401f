//! Local filesystem collaborator

use crate::error::{IoResultExt, Result, TransferError};
use crate::remote::{DirEntry, FileStat};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

/// Operations on the local store, mirroring [`RemoteAccess`](super::RemoteAccess)
pub trait LocalFileSystem: Send + Sync {
    /// Stat a path; fails with `NotFound` when absent
    fn stat(&self, path: &Path) -> Result<FileStat>;

    /// List the direct children of a directory
    fn list(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Create a directory (and missing parents)
    fn mkdir(&self, path: &Path) -> Result<()>;

    /// Remove a file
    fn remove(&self, path: &Path) -> Result<()>;

    /// Remove an empty directory
    fn rmdir(&self, path: &Path) -> Result<()>;

    /// Rename a file or directory
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

/// [`LocalFileSystem`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFileSystem;

impl LocalFileSystem for StdFileSystem {
    fn stat(&self, path: &Path) -> Result<FileStat> {
        let metadata = std::fs::metadata(path).with_path(path)?;
        Ok(FileStat {
            size: metadata.len(),
            is_dir: metadata.is_dir(),
            mtime: unix_mtime(metadata.modified().ok()),
        })
    }

    fn list(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(path).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let at = e.path().unwrap_or(path).to_path_buf();
                match e.into_io_error() {
                    Some(io) => TransferError::from_io(at, io),
                    None => TransferError::remote(at, "filesystem loop detected"),
                }
            })?;
            // Links are described by their target; a dangling link by itself
            let metadata = match std::fs::metadata(entry.path()) {
                Ok(metadata) => metadata,
                Err(_) => entry
                    .metadata()
                    .map_err(|e| TransferError::remote(entry.path(), e.to_string()))?,
            };

            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                is_dir: metadata.is_dir(),
                mtime: unix_mtime(metadata.modified().ok()),
            });
        }

        Ok(entries)
    }

    fn mkdir(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).with_path(path)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path).with_path(path)
    }

    fn rmdir(&self, path: &Path) -> Result<()> {
        std::fs::remove_dir(path).with_path(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::rename(from, to).with_path(from)
    }
}

fn unix_mtime(modified: Option<SystemTime>) -> u64 {
    modified
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
