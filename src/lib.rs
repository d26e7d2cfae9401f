//! # PiCopy - File and Directory Transfer over SFTP
//!
//! PiCopy copies files and directory trees between the local filesystem and
//! a remote host reachable over an SSH session, with live per-file progress,
//! cooperative cancellation and a bounded history of completed transfers.
//!
//! ## Features
//!
//! - **Single-flight batches**: one background worker processes jobs in order
//! - **Chunk-level progress**: percent, speed and ETA after every chunk
//! - **Cooperative cancellation**: observed between chunks and between jobs
//! - **Recursive directories**: uploads and downloads, failures isolated per entry
//! - **Transfer log**: the most recent 100 files, persistable as JSON
//! - **SFTP adapter**: key file, password or agent authentication
//!
//! ## Quick Start
//!
//! ```no_run
//! use picopy::config::{RemoteConfig, TransferSettings};
//! use picopy::remote::SftpRemote;
//! use picopy::transfer::{Direction, TransferEngine, TransferJob};
//! use std::sync::Arc;
//!
//! let config = RemoteConfig {
//!     host: "raspberrypi.local".into(),
//!     user: "pi".into(),
//!     ..Default::default()
//! };
//! let settings = TransferSettings::default();
//! let remote = Arc::new(SftpRemote::new(config, settings.chunk_size));
//! remote.connect().unwrap();
//!
//! let engine = TransferEngine::new(remote, settings);
//! let report = engine
//!     .try_submit(
//!         vec![TransferJob::new("notes.txt", "/home/pi/notes.txt")],
//!         Direction::Upload,
//!     )
//!     .unwrap()
//!     .wait()
//!     .unwrap();
//!
//! println!("Transferred {} files", report.files_transferred());
//! ```
//!
//! ## Observing Progress
//!
//! ```no_run
//! use picopy::progress::{ChannelObserver, ProgressReporter};
//! use crossbeam::channel::unbounded;
//! use std::sync::Arc;
//!
//! let (tx, rx) = unbounded();
//! let observer = Arc::new(ChannelObserver::new(tx));
//! // engine.with_observer(observer) ... then on the UI thread:
//! # drop(observer);
//! let last_status = ProgressReporter::new().run(rx);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod history;
pub mod progress;
pub mod remote;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{RemoteConfig, TransferSettings};
pub use error::{Result, TransferError};
pub use transfer::{Direction, TransferEngine, TransferJob};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use picopy::prelude::*;
    //! ```

    pub use crate::config::{PartialFilePolicy, RemoteConfig, TransferSettings};
    pub use crate::error::{Result, TransferError};
    pub use crate::history::{LogEntry, TransferLog};
    pub use crate::progress::{
        format_size, format_time, ChannelObserver, ProgressReporter, TransferEvent,
        TransferObserver,
    };
    pub use crate::remote::{LocalFileSystem, RemoteAccess, SftpRemote, StdFileSystem};
    pub use crate::transfer::{
        BatchHandle, BatchReport, CancellationToken, Direction, JobStatus, TransferEngine,
        TransferJob,
    };
}
