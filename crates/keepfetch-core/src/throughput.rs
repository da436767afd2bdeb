//! Process-wide byte counter for download speed display.
//!
//! Every received chunk is added here regardless of which task or phase it
//! belongs to. Nothing reads it for correctness.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Monotonic received-bytes counter with a start time.
#[derive(Debug)]
pub struct Throughput {
    bytes: AtomicU64,
    started: Instant,
}

impl Default for Throughput {
    fn default() -> Self {
        Self::new()
    }
}

impl Throughput {
    pub fn new() -> Self {
        Self {
            bytes: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Shared instance used when the caller does not supply one.
    pub fn global() -> Arc<Throughput> {
        static GLOBAL: OnceLock<Arc<Throughput>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Throughput::new())))
    }

    pub fn add(&self, n: usize) {
        self.bytes.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> ThroughputSnapshot {
        ThroughputSnapshot {
            bytes: self.total(),
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        }
    }
}

/// Point-in-time reading of a `Throughput`.
#[derive(Debug, Clone, Copy)]
pub struct ThroughputSnapshot {
    pub bytes: u64,
    pub elapsed_secs: f64,
}

impl ThroughputSnapshot {
    /// Average rate since start (0 if no time has elapsed).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes as f64 / self.elapsed_secs
    }

    /// Rate between an earlier snapshot and this one.
    pub fn rate_since(&self, earlier: &ThroughputSnapshot) -> f64 {
        let dt = self.elapsed_secs - earlier.elapsed_secs;
        if dt <= 0.0 {
            return 0.0;
        }
        self.bytes.saturating_sub(earlier.bytes) as f64 / dt
    }
}
