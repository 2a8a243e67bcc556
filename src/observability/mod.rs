//! Observability for message building and hand-off.
//!
//! Provides counters and a duration timer. Events are emitted through
//! `tracing` when the `tracing` feature is enabled.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Email metrics collector.
#[derive(Debug, Default)]
pub struct EmailMetrics {
    /// Messages built successfully.
    pub messages_built: AtomicU64,
    /// Build attempts rejected by validation.
    pub build_failures: AtomicU64,
    /// Messages handed to a transport successfully.
    pub messages_sent: AtomicU64,
    /// Transport hand-offs that failed.
    pub send_failures: AtomicU64,
}

impl EmailMetrics {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of a build.
    pub fn record_build(&self, success: bool) {
        if success {
            self.messages_built.fetch_add(1, Ordering::Relaxed);
        } else {
            self.build_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records the outcome of a send.
    pub fn record_send(&self, success: bool) {
        if success {
            self.messages_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.send_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_built: self.messages_built.load(Ordering::Relaxed),
            build_failures: self.build_failures.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }

    /// Resets all metrics.
    pub fn reset(&self) {
        self.messages_built.store(0, Ordering::Relaxed);
        self.build_failures.store(0, Ordering::Relaxed);
        self.messages_sent.store(0, Ordering::Relaxed);
        self.send_failures.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Messages built successfully.
    pub messages_built: u64,
    /// Build attempts rejected by validation.
    pub build_failures: u64,
    /// Messages handed to a transport successfully.
    pub messages_sent: u64,
    /// Transport hand-offs that failed.
    pub send_failures: u64,
}

impl MetricsSnapshot {
    /// Returns the send success rate.
    pub fn send_success_rate(&self) -> f64 {
        let total = self.messages_sent + self.send_failures;
        if total == 0 {
            1.0
        } else {
            self.messages_sent as f64 / total as f64
        }
    }
}

/// Timer for measuring operation duration.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    name: String,
}

impl Timer {
    /// Creates and starts a new timer.
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stops the timer and returns the duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            timer = %self.name,
            duration_us = elapsed.as_micros() as u64,
            "Timer stopped"
        );

        elapsed
    }
}
