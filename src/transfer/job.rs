//! Batch jobs and their outcomes

use crate::history::base_name;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which way a batch moves data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Local to remote
    Upload,
    /// Remote to local
    Download,
}

impl Direction {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source/destination pair of a batch
///
/// For uploads the source is local and the destination remote; for
/// downloads the reverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// Source path
    pub source: PathBuf,
    /// Destination path
    pub destination: PathBuf,
}

impl TransferJob {
    /// Create a job
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Base name of the source, used in status messages
    pub fn name(&self) -> String {
        base_name(&self.source)
    }

    /// Resolve `(local, remote)` paths for a direction
    pub fn endpoints(&self, direction: Direction) -> (&Path, &Path) {
        match direction {
            Direction::Upload => (&self.source, &self.destination),
            Direction::Download => (&self.destination, &self.source),
        }
    }
}

impl<S: Into<PathBuf>, D: Into<PathBuf>> From<(S, D)> for TransferJob {
    fn from((source, destination): (S, D)) -> Self {
        Self::new(source, destination)
    }
}

/// How a single job ended
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// Every file was transferred
    Completed {
        /// Files transferred
        files: u64,
        /// Bytes transferred
        bytes: u64,
    },
    /// A directory job where some entries failed
    Partial {
        /// Files transferred
        files: u64,
        /// Bytes transferred
        bytes: u64,
        /// Failed entries with their error messages
        failures: Vec<(PathBuf, String)>,
    },
    /// The job failed as a whole
    Failed(String),
    /// Cancelled while running; counts cover files finished before that
    Cancelled {
        /// Files transferred
        files: u64,
        /// Bytes transferred
        bytes: u64,
    },
    /// Never started because the batch was cancelled
    Skipped,
}

impl JobStatus {
    /// True for [`JobStatus::Completed`]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Result of one job
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// The job
    pub job: TransferJob,
    /// How it ended
    pub status: JobStatus,
    /// Wall-clock time spent on it
    pub duration: Duration,
}

/// Per-job results of a finished batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Batch direction
    pub direction: Direction,
    /// One outcome per submitted job, in order
    pub outcomes: Vec<JobOutcome>,
    /// Whether the batch was cancelled
    pub cancelled: bool,
    /// Total batch duration
    pub duration: Duration,
}

impl BatchReport {
    /// True when every job completed and the batch was not cancelled
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.outcomes.iter().all(|o| o.status.is_success())
    }

    /// Total files transferred across all jobs
    pub fn files_transferred(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match &o.status {
                JobStatus::Completed { files, .. }
                | JobStatus::Partial { files, .. }
                | JobStatus::Cancelled { files, .. } => *files,
                _ => 0,
            })
            .sum()
    }

    /// Total bytes transferred across all jobs
    pub fn bytes_transferred(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| match &o.status {
                JobStatus::Completed { bytes, .. }
                | JobStatus::Partial { bytes, .. }
                | JobStatus::Cancelled { bytes, .. } => *bytes,
                _ => 0,
            })
            .sum()
    }

    /// Outcomes that did not complete (failed, partial, cancelled or skipped)
    pub fn unsuccessful(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }
}
