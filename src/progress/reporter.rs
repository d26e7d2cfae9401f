//! Terminal progress reporter
//!
//! Uses indicatif to render:
//! - A status line for the current job
//! - A per-file percent bar with speed and ETA
//! - A batch bar counting finished jobs
//!
//! The reporter lives on the consuming thread and is fed
//! [`TransferEvent`]s received from a [`ChannelObserver`](super::ChannelObserver).

use crate::progress::TransferEvent;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Scale used for percent bars (tenths of a percent)
const BAR_SCALE: u64 = 1000;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Progress reporter for transfer batches
pub struct ProgressReporter {
    /// Multi-progress container
    multi: MultiProgress,
    /// Current status message
    status: ProgressBar,
    /// Current file progress
    file_bar: ProgressBar,
    /// Batch progress
    batch_bar: ProgressBar,
    /// Last status message seen
    last_status: Option<String>,
    speed: String,
    eta: String,
}

impl ProgressReporter {
    /// Create a new progress reporter drawing to stderr
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let file_bar = multi.add(ProgressBar::new(BAR_SCALE));
        file_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.green/white}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        file_bar.set_prefix("File ");

        let batch_bar = multi.add(ProgressBar::new(BAR_SCALE));
        batch_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        batch_bar.set_prefix("Batch");

        Self {
            multi,
            status,
            file_bar,
            batch_bar,
            last_status: None,
            speed: String::new(),
            eta: String::new(),
        }
    }

    /// Create a reporter that draws nothing (quiet mode)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.multi.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Apply a single event to the bars
    pub fn apply(&mut self, event: &TransferEvent) {
        match event {
            TransferEvent::Progress(percent) => {
                self.file_bar.set_position(to_position(*percent));
                self.refresh_file_message(*percent);
            }
            TransferEvent::Status(message) => {
                self.status.set_message(message.clone());
                self.last_status = Some(message.clone());
            }
            TransferEvent::Speed(speed) => self.speed = speed.clone(),
            TransferEvent::Eta(eta) => self.eta = eta.clone(),
            TransferEvent::BatchProgress(percent) => {
                self.batch_bar.set_position(to_position(*percent));
                self.batch_bar.set_message(format!("{:.0}%", percent));
            }
        }
    }

    /// Drain events until every sender is dropped, then finish the bars
    pub fn run(self, events: Receiver<TransferEvent>) -> Option<String> {
        self.run_while(events, || true)
    }

    /// Drain events until the senders are dropped or `active` turns false,
    /// then apply whatever is still queued and finish the bars
    pub fn run_while(
        mut self,
        events: Receiver<TransferEvent>,
        mut active: impl FnMut() -> bool,
    ) -> Option<String> {
        loop {
            match events.recv_timeout(POLL_INTERVAL) {
                Ok(event) => self.apply(&event),
                Err(RecvTimeoutError::Timeout) => {
                    if !active() {
                        break;
                    }
                    self.status.tick();
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        for event in events.try_iter() {
            self.apply(&event);
        }
        self.finish()
    }

    /// Finish all bars, returning the final status line
    pub fn finish(self) -> Option<String> {
        let message = self.last_status.clone().unwrap_or_default();
        self.file_bar.finish();
        self.batch_bar.finish();
        self.status.finish_with_message(message);
        self.last_status
    }

    /// Last status message applied
    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }

    fn refresh_file_message(&self, percent: f64) {
        let mut message = format!("{:.1}%", percent);
        if !self.speed.is_empty() {
            message.push_str(&format!("  {}", self.speed));
        }
        if !self.eta.is_empty() {
            message.push_str(&format!("  ETA: {}", self.eta));
        }
        self.file_bar.set_message(message);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn to_position(percent: f64) -> u64 {
    ((percent.clamp(0.0, 100.0) / 100.0) * BAR_SCALE as f64).round() as u64
}
