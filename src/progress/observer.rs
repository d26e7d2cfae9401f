//! Observer interface for transfer events
//!
//! All callbacks run on the batch worker thread. Observers owned by a
//! single-threaded consumer should forward events through
//! [`ChannelObserver`] instead of touching their state directly.

use crate::progress::ProgressUpdate;
use crossbeam::channel::Sender;

/// Receiver of transfer progress and status events
///
/// Every method has a no-op default so implementors only override what
/// they display. Delivery is last-value-wins; within one file the percent
/// values never decrease.
pub trait TransferObserver: Send + Sync {
    /// Per-file completion percentage (0-100)
    fn on_progress(&self, _percent: f64) {}

    /// Human-readable status line
    fn on_status(&self, _message: &str) {}

    /// Formatted throughput, e.g. "1.5 MB/s"
    fn on_speed(&self, _speed: &str) {}

    /// Formatted remaining time, e.g. "2m 5s"
    fn on_eta(&self, _eta: &str) {}

    /// Batch completion percentage, fired once per finished job
    fn on_batch_progress(&self, _percent: f64) {}
}

/// Forward a computed update to an observer
pub fn deliver_update(observer: &dyn TransferObserver, update: &ProgressUpdate) {
    observer.on_progress(update.percent);
    if let Some(speed) = &update.speed {
        observer.on_speed(speed);
    }
    if let Some(eta) = &update.eta {
        observer.on_eta(eta);
    }
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// A transfer event as carried over a channel
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// See [`TransferObserver::on_progress`]
    Progress(f64),
    /// See [`TransferObserver::on_status`]
    Status(String),
    /// See [`TransferObserver::on_speed`]
    Speed(String),
    /// See [`TransferObserver::on_eta`]
    Eta(String),
    /// See [`TransferObserver::on_batch_progress`]
    BatchProgress(f64),
}

/// Observer that sends every callback as a [`TransferEvent`]
///
/// Send failures (receiver dropped) are ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: Sender<TransferEvent>,
}

impl ChannelObserver {
    /// Wrap the sending half of a channel
    pub fn new(tx: Sender<TransferEvent>) -> Self {
        Self { tx }
    }
}

impl TransferObserver for ChannelObserver {
    fn on_progress(&self, percent: f64) {
        let _ = self.tx.send(TransferEvent::Progress(percent));
    }

    fn on_status(&self, message: &str) {
        let _ = self.tx.send(TransferEvent::Status(message.to_string()));
    }

    fn on_speed(&self, speed: &str) {
        let _ = self.tx.send(TransferEvent::Speed(speed.to_string()));
    }

    fn on_eta(&self, eta: &str) {
        let _ = self.tx.send(TransferEvent::Eta(eta.to_string()));
    }

    fn on_batch_progress(&self, percent: f64) {
        let _ = self.tx.send(TransferEvent::BatchProgress(percent));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;

    #[test]
    fn test_channel_observer_forwards_update() {
        let (tx, rx) = unbounded();
        let observer = ChannelObserver::new(tx);

        deliver_update(
            &observer,
            &ProgressUpdate {
                percent: 50.0,
                speed: Some("1.0 KB/s".into()),
                eta: Some("1s".into()),
            },
        );

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                TransferEvent::Progress(50.0),
                TransferEvent::Speed("1.0 KB/s".into()),
                TransferEvent::Eta("1s".into()),
            ]
        );
    }

    #[test]
    fn test_empty_update_only_reports_percent() {
        let (tx, rx) = unbounded();
        let observer = ChannelObserver::new(tx);
        deliver_update(
            &observer,
            &ProgressUpdate {
                percent: 100.0,
                speed: None,
                eta: None,
            },
        );
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (tx, rx) = unbounded();
        drop(rx);
        ChannelObserver::new(tx).on_status("still fine");
        NoopObserver.on_progress(10.0);
    }
}
