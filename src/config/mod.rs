//! Configuration module for PiCopy
//!
//! Provides CLI arguments, the JSON settings file and the remote host
//! configuration.

mod settings;

pub use settings::*;
