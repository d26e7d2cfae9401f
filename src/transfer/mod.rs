//! Transfer engine module
//!
//! Runs batches of copy jobs between the local filesystem and a remote
//! store on a single background thread:
//! - [`TransferEngine`] enforces single-flight and owns the transfer log
//! - [`DirectoryWalker`] replicates directory trees
//! - [`SingleFileTransfer`] streams one file with progress and cancellation

mod cancel;
mod engine;
mod job;
mod single;
mod walker;

pub use cancel::*;
pub use engine::*;
pub use job::*;
pub use single::*;
pub use walker::*;
