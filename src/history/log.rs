//! Bounded transfer log
//!
//! Keeps the most recent completed file transfers in a FIFO ring. Only
//! individual files are recorded; a directory job of N files yields up to
//! N entries.

use crate::error::{IoResultExt, Result};
use crate::transfer::Direction;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use tracing::debug;

/// Default number of entries retained
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// A completed single-file transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the transfer finished
    pub timestamp: DateTime<Local>,
    /// Upload or download
    pub action: Direction,
    /// Base name of the source file
    pub filename: String,
    /// Size in bytes, when known
    pub size: Option<u64>,
    /// Wall-clock duration in seconds, when known
    pub duration: Option<f64>,
}

impl LogEntry {
    /// Build an entry stamped with the current local time
    ///
    /// Only the final path component of `source` is kept.
    pub fn new(
        action: Direction,
        source: &Path,
        size: Option<u64>,
        duration: Option<f64>,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            action,
            filename: base_name(source),
            size,
            duration,
        }
    }
}

/// Final component of a path, or the whole path when it has none
pub fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// FIFO ring of [`LogEntry`] values
#[derive(Debug, Clone)]
pub struct TransferLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl TransferLog {
    /// Create a log holding [`DEFAULT_LOG_CAPACITY`] entries
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Create a log with a custom capacity (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one when full
    pub fn append(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Copy of all entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the log holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write the log to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_path(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json).with_path(path)?;
        debug!(path = %path.display(), entries = self.entries.len(), "Saved transfer log");
        Ok(())
    }

    /// Load a log from a JSON file, keeping only the newest `capacity` entries
    ///
    /// A missing file yields an empty log.
    pub fn load(path: &Path, capacity: usize) -> Result<Self> {
        let mut log = Self::with_capacity(capacity);
        if !path.exists() {
            return Ok(log);
        }

        let data = std::fs::read_to_string(path).with_path(path)?;
        let entries: Vec<LogEntry> = serde_json::from_str(&data)?;
        for entry in entries {
            log.append(entry);
        }
        Ok(log)
    }
}

impl Default for TransferLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(name: &str) -> LogEntry {
        LogEntry::new(Direction::Upload, Path::new(name), Some(1), Some(0.5))
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut log = TransferLog::new();
        for i in 0..101 {
            log.append(entry(&format!("file_{}", i)));
        }

        let entries = log.entries();
        assert_eq!(entries.len(), 100);
        assert_eq!(entries[0].filename, "file_1");
        assert_eq!(entries[99].filename, "file_100");
        assert!(!entries.iter().any(|e| e.filename == "file_0"));
    }

    #[test]
    fn test_entries_is_a_copy() {
        let mut log = TransferLog::new();
        log.append(entry("a.txt"));

        let mut copy = log.entries();
        copy.clear();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut log = TransferLog::with_capacity(3);
        log.append(entry("a"));
        log.append(entry("b"));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.capacity(), 3);
    }

    #[test]
    fn test_base_name_only() {
        let e = LogEntry::new(Direction::Download, Path::new("/remote/d/f.bin"), None, None);
        assert_eq!(e.filename, "f.bin");
        assert_eq!(e.action, Direction::Download);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("history/log.json");

        let mut log = TransferLog::new();
        log.append(entry("a.txt"));
        log.append(entry("b.txt"));
        log.save(&path).unwrap();

        let loaded = TransferLog::load(&path, 1).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.entries()[0].filename, "b.txt");
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = TransferLog::load(&dir.path().join("nope.json"), 100).unwrap();
        assert!(log.is_empty());
    }
}
