//! Remote access capability
//!
//! Defines the operations the transfer engine needs from a remote store and
//! the chunked streaming primitive shared by implementations.

use crate::error::{Result, TransferError};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Signal returned by a chunk hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkControl {
    /// Keep streaming
    Continue,
    /// Stop after the chunk just written
    Abort,
}

/// Progress hook invoked after every chunk with the cumulative byte count
pub type ChunkHook<'a> = dyn FnMut(u64) -> ChunkControl + 'a;

/// Attributes of a single path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes (0 for directories on most stores)
    pub size: u64,
    /// Is directory
    pub is_dir: bool,
    /// Modification time (Unix timestamp)
    pub mtime: u64,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (no directory component)
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Is directory
    pub is_dir: bool,
    /// Modification time (Unix timestamp)
    pub mtime: u64,
}

/// Operations on the remote store
///
/// Implementations must be usable from the batch worker thread. `put` and
/// `get` stream whole files (no resume) and, when a hook is given, call it
/// after each chunk; a hook returning [`ChunkControl::Abort`] makes the call
/// fail with [`TransferError::Cancelled`]. Implementations that cannot drive
/// a hook return [`TransferError::ProgressUnsupported`].
pub trait RemoteAccess: Send + Sync {
    /// Whether a session is currently open
    fn is_connected(&self) -> bool;

    /// Stat a path; fails with `NotFound` when absent
    fn stat(&self, path: &Path) -> Result<FileStat>;

    /// List a directory; fails with `NotFound` or `PermissionDenied`
    fn list(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Upload `local` to `remote`, returning bytes written
    fn put(&self, local: &Path, remote: &Path, on_chunk: Option<&mut ChunkHook<'_>>)
        -> Result<u64>;

    /// Download `remote` to `local`, returning bytes written
    fn get(&self, remote: &Path, local: &Path, on_chunk: Option<&mut ChunkHook<'_>>)
        -> Result<u64>;

    /// Create a directory; an existing one yields `AlreadyExists`
    fn mkdir(&self, path: &Path) -> Result<()>;

    /// Remove a file
    fn remove(&self, path: &Path) -> Result<()>;

    /// Remove an empty directory
    fn rmdir(&self, path: &Path) -> Result<()>;

    /// Rename a file or directory
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}

/// Join a child name onto a remote directory using `/` separators
pub fn remote_join(dir: &Path, name: &str) -> PathBuf {
    let base = dir.to_string_lossy();
    let base = base.trim_end_matches('/');
    PathBuf::from(format!("{}/{}", base, name))
}

/// Copy `reader` into `writer` in chunks of `chunk_size`, calling the hook
/// after each chunk has been written
///
/// Read failures are attributed to `source`, write failures to
/// `destination`. Returns the total number of bytes copied.
pub fn stream_chunks<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    source: &Path,
    destination: &Path,
    mut on_chunk: Option<&mut ChunkHook<'_>>,
) -> Result<u64> {
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut bytes_copied = 0u64;

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransferError::from_io(source, e)),
        };

        writer
            .write_all(&buffer[..bytes_read])
            .map_err(|e| TransferError::from_io(destination, e))?;
        bytes_copied += bytes_read as u64;

        if let Some(hook) = on_chunk.as_deref_mut() {
            if hook(bytes_copied) == ChunkControl::Abort {
                let _ = writer.flush();
                return Err(TransferError::Cancelled);
            }
        }
    }

    writer
        .flush()
        .map_err(|e| TransferError::from_io(destination, e))?;
    Ok(bytes_copied)
}
