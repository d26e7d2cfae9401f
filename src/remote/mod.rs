//! File store collaborators
//!
//! The transfer engine talks to both sides of a copy through traits:
//! - [`RemoteAccess`] for the session-oriented remote store
//! - [`LocalFileSystem`] for the local disk
//!
//! [`SftpRemote`] implements `RemoteAccess` over SSH/SFTP.

mod access;
mod local;
mod sftp;

pub use access::*;
pub use local::*;
pub use sftp::*;
