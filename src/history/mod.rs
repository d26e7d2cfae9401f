//! Transfer history
//!
//! A bounded, in-memory log of completed single-file transfers with
//! optional JSON persistence.

mod log;

pub use log::*;
