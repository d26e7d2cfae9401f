//! Per-file progress math
//!
//! Converts cumulative byte counts and elapsed time into the percent, speed
//! and ETA values handed to observers. Everything here is pure computation
//! apart from [`ProgressTracker`] reading the clock.

use std::time::Instant;

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;

/// A single progress measurement, recomputed on every chunk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Cumulative bytes transferred so far
    pub bytes_transferred: u64,
    /// Total size of the file
    pub total_bytes: u64,
    /// Seconds since the file transfer started
    pub elapsed_secs: f64,
}

/// Values derived from a [`ProgressSample`]
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Completion percentage, clamped to 0..=100
    pub percent: f64,
    /// Formatted throughput (e.g. "1.5 MB/s"); `None` for empty files
    pub speed: Option<String>,
    /// Formatted remaining time; `None` for empty files
    pub eta: Option<String>,
}

impl ProgressSample {
    /// Derive percent, speed and ETA
    pub fn evaluate(&self) -> ProgressUpdate {
        if self.total_bytes == 0 {
            return ProgressUpdate {
                percent: 100.0,
                speed: None,
                eta: None,
            };
        }

        let percent = self.percent();
        let speed = self.bytes_per_second();
        let eta_secs = if speed > 0.0 {
            self.total_bytes.saturating_sub(self.bytes_transferred) as f64 / speed
        } else {
            0.0
        };

        ProgressUpdate {
            percent,
            speed: Some(format_speed(speed)),
            eta: Some(format_time(eta_secs)),
        }
    }

    /// Completion percentage, clamped to 0..=100
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Throughput in bytes/second, 0 when no time has elapsed
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.bytes_transferred as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}

/// Clock-backed producer of [`ProgressSample`]s for one file
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_bytes: u64,
    started: Instant,
}

impl ProgressTracker {
    /// Start tracking a file of `total_bytes`
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            started: Instant::now(),
        }
    }

    /// Total size being tracked
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Take a sample for the given cumulative byte count
    pub fn sample(&self, bytes_transferred: u64) -> ProgressSample {
        ProgressSample {
            bytes_transferred,
            total_bytes: self.total_bytes,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }

    /// Sample and evaluate in one step
    pub fn update(&self, bytes_transferred: u64) -> ProgressUpdate {
        self.sample(bytes_transferred).evaluate()
    }
}

/// Format a byte count: "512 B", "1.5 KB", "3.2 MB", "1.0 GB"
pub fn format_size(bytes: f64) -> String {
    let bytes = if bytes.is_finite() && bytes > 0.0 { bytes } else { 0.0 };

    if bytes < KB {
        format!("{} B", bytes as u64)
    } else if bytes < MB {
        format!("{:.1} KB", bytes / KB)
    } else if bytes < GB {
        format!("{:.1} MB", bytes / MB)
    } else {
        format!("{:.1} GB", bytes / GB)
    }
}

/// Format a throughput value as "<size>/s"
pub fn format_speed(bytes_per_second: f64) -> String {
    format!("{}/s", format_size(bytes_per_second))
}

/// Format a duration: "45s", "2m 5s", "1h 1m"
pub fn format_time(seconds: f64) -> String {
    let secs = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(bytes: u64, total: u64, elapsed: f64) -> ProgressSample {
        ProgressSample {
            bytes_transferred: bytes,
            total_bytes: total,
            elapsed_secs: elapsed,
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0.0), "0 B");
        assert_eq!(format_size(1023.0), "1023 B");
        assert_eq!(format_size(1536.0), "1.5 KB");
        assert_eq!(format_size(1048576.0), "1.0 MB");
        assert_eq!(format_size(3.0 * GB), "3.0 GB");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(45.0), "45s");
        assert_eq!(format_time(125.0), "2m 5s");
        assert_eq!(format_time(3700.0), "1h 1m");
        assert_eq!(format_time(-3.0), "0s");
    }

    #[test]
    fn test_empty_file_is_complete() {
        let update = sample(0, 0, 0.0).evaluate();
        assert_eq!(update.percent, 100.0);
        assert!(update.speed.is_none());
        assert!(update.eta.is_none());
    }

    #[test]
    fn test_zero_elapsed_reports_zero_speed() {
        let update = sample(512, 1024, 0.0).evaluate();
        assert_eq!(update.percent, 50.0);
        assert_eq!(update.speed.as_deref(), Some("0 B/s"));
        assert_eq!(update.eta.as_deref(), Some("0s"));
    }

    #[test]
    fn test_speed_and_eta() {
        // 1 KB/s with 2 KB left
        let update = sample(1024, 3072, 1.0).evaluate();
        assert_eq!(update.speed.as_deref(), Some("1.0 KB/s"));
        assert_eq!(update.eta.as_deref(), Some("2s"));
    }

    #[test]
    fn test_overshoot_is_clamped() {
        assert_eq!(sample(4096, 1024, 1.0).percent(), 100.0);
    }

    #[test]
    fn test_tracker_samples_total() {
        let tracker = ProgressTracker::new(2048);
        let s = tracker.sample(1024);
        assert_eq!(s.total_bytes, 2048);
        assert_eq!(tracker.update(1024).percent, 50.0);
    }

    proptest! {
        #[test]
        fn percent_is_bounded(bytes in 0u64..u64::MAX / 2, total in 1u64..u64::MAX / 2) {
            let p = sample(bytes, total, 1.0).percent();
            prop_assert!((0.0..=100.0).contains(&p));
        }

        #[test]
        fn percent_is_monotonic(total in 1u64..10_000_000, a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let lo = lo.min(total);
            let hi = hi.min(total);
            prop_assert!(sample(lo, total, 1.0).percent() <= sample(hi, total, 1.0).percent());
            prop_assert_eq!(sample(total, total, 1.0).percent(), 100.0);
        }
    }
}
