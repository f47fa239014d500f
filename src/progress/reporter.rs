//! Progress reporter implementation
//!
//! Item totals are unknown while the enumerator is still listing, so the
//! reporter draws a spinner rather than a bounded bar. Counters are atomics:
//! workers add bytes, the monitor adds items.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Progress reporter for transfer runs
pub struct ProgressReporter {
    /// Spinner line
    bar: ProgressBar,
    /// Start time
    start_time: Instant,
    /// Items finished (either outcome)
    items_done: AtomicU64,
    /// Bytes written to the destination
    bytes_done: AtomicU64,
    /// Is progress enabled
    enabled: AtomicBool,
}

impl ProgressReporter {
    /// Create a new progress reporter drawing to stderr
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        // Template is a literal; fall back to the default style rather than panic
        if let Ok(style) = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {prefix:.bold} {msg} [{elapsed_precise}]")
        {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(120));

        Self {
            bar,
            start_time: Instant::now(),
            items_done: AtomicU64::new(0),
            bytes_done: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    /// Create a disabled progress reporter (for quiet mode)
    pub fn disabled() -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        Self {
            bar,
            start_time: Instant::now(),
            items_done: AtomicU64::new(0),
            bytes_done: AtomicU64::new(0),
            enabled: AtomicBool::new(false),
        }
    }

    /// Count finished items
    pub fn increment_items(&self, count: u64) {
        let done = self.items_done.fetch_add(count, Ordering::Relaxed) + count;
        self.bar.set_prefix(format!("{} items", done));
    }

    /// Count transferred bytes
    pub fn increment_bytes(&self, bytes: u64) {
        let done = self.bytes_done.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.bar
            .set_message(humansize::format_size(done, humansize::BINARY));
    }

    /// Set current status message
    pub fn set_status(&self, msg: &str) {
        self.bar.set_message(msg.to_string());
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get current throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let bytes = self.bytes_done.load(Ordering::Relaxed);
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            bytes as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Finish progress with success message
    pub fn finish_success(&self, message: &str) {
        self.bar.finish_with_message(format!("✓ {}", message));
    }

    /// Finish progress with error message
    pub fn finish_error(&self, message: &str) {
        self.bar.abandon_with_message(format!("✗ {}", message));
    }

    /// Check if progress is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Get progress summary
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            items_done: self.items_done.load(Ordering::Relaxed),
            bytes_done: self.bytes_done.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
            throughput: self.throughput(),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress summary
#[derive(Debug, Clone)]
pub struct ProgressSummary {
    /// Items finished
    pub items_done: u64,
    /// Bytes transferred
    pub bytes_done: u64,
    /// Elapsed time
    pub elapsed: Duration,
    /// Throughput in bytes/second
    pub throughput: f64,
}

impl ProgressSummary {
    /// Print byte totals below the run summary
    pub fn print(&self) {
        println!(
            "Bytes transferred: {}",
            humansize::format_size(self.bytes_done, humansize::BINARY)
        );
        println!(
            "Throughput:        {}/s",
            humansize::format_size(self.throughput as u64, humansize::BINARY)
        );
    }
}
