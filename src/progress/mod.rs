//! Progress reporting module
//!
//! Turns cumulative byte counts into percent, speed and ETA, and delivers
//! them to a [`TransferObserver`]. The CLI reporter drives indicatif bars
//! from observer events marshalled over a channel.

mod observer;
mod reporter;
mod tracker;

pub use observer::*;
pub use reporter::*;
pub use tracker::*;
