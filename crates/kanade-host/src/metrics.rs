//! Lock-free callback metrics
//!
//! The audio callback is the sole writer of everything in this module; the
//! control thread reads through relaxed atomics. A stale reading is fine,
//! these are monitoring values.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Number of jitter samples kept in the ring
pub const JITTER_WINDOW: usize = 512;

/// Percentile recomputation cadence, in writes
pub const JITTER_PUBLISH_INTERVAL: u64 = 64;

/// Published jitter summary, readable from any thread without locking
#[derive(Debug, Default)]
pub struct JitterStats {
    p95_ms_bits: AtomicU64,
}

impl JitterStats {
    /// Most recently published 95th-percentile callback jitter in ms
    pub fn p95_ms(&self) -> f64 {
        f64::from_bits(self.p95_ms_bits.load(Ordering::Relaxed))
    }

    fn publish(&self, value_ms: f64) {
        self.p95_ms_bits.store(value_ms.to_bits(), Ordering::Relaxed);
    }
}

/// Single-producer ring of recent callback-timing deviations.
///
/// Owned by the callback thread. Every [`JITTER_PUBLISH_INTERVAL`]th write
/// copies the current window into a pre-allocated scratch list and selects
/// the 95th percentile with a partial order-statistic selection (no full
/// sort), then publishes it through the shared [`JitterStats`]. This
/// amortizes the percentile cost to roughly once per 64 callbacks.
pub struct JitterMonitor {
    ring: [f64; JITTER_WINDOW],
    write_pos: usize,
    filled: usize,
    writes: u64,
    scratch: Vec<f64>,
    stats: Arc<JitterStats>,
}

impl JitterMonitor {
    pub fn new() -> Self {
        Self::with_stats(Arc::new(JitterStats::default()))
    }

    /// Create a monitor publishing into an existing stats handle
    pub fn with_stats(stats: Arc<JitterStats>) -> Self {
        Self {
            ring: [0.0; JITTER_WINDOW],
            write_pos: 0,
            filled: 0,
            writes: 0,
            scratch: Vec::with_capacity(JITTER_WINDOW),
            stats,
        }
    }

    /// Shared handle for readers
    pub fn stats(&self) -> Arc<JitterStats> {
        Arc::clone(&self.stats)
    }

    /// Record one deviation-from-ideal-period measurement in ms
    pub fn record(&mut self, deviation_ms: f64) {
        self.ring[self.write_pos] = deviation_ms;
        self.write_pos = (self.write_pos + 1) % JITTER_WINDOW;
        self.filled = (self.filled + 1).min(JITTER_WINDOW);
        self.writes += 1;
        if self.writes % JITTER_PUBLISH_INTERVAL == 0 {
            self.publish_percentile();
        }
    }

    fn publish_percentile(&mut self) {
        if self.filled == 0 {
            return;
        }
        // scratch was pre-allocated to the window size, this never allocates
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.ring[..self.filled]);

        let k = (self.filled - 1) * 95 / 100;
        let (_, p95, _) = self
            .scratch
            .select_nth_unstable_by(k, |a, b| a.total_cmp(b));
        self.stats.publish(*p95);
    }
}

impl Default for JitterMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Underrun counters for the live callback path.
///
/// Counts callbacks where the render source produced fewer frames than
/// demanded, and the total number of samples zero-filled to mask it.
#[derive(Debug, Default)]
pub struct UnderrunCounters {
    callbacks: AtomicU64,
    zero_samples: AtomicU64,
}

impl UnderrunCounters {
    /// Record one underrun callback that zero-filled `zeroed_samples` samples
    pub fn record(&self, zeroed_samples: u64) {
        self.callbacks.fetch_add(1, Ordering::Relaxed);
        self.zero_samples.fetch_add(zeroed_samples, Ordering::Relaxed);
    }

    /// Callbacks that underran since the last reset
    pub fn callbacks(&self) -> u64 {
        self.callbacks.load(Ordering::Relaxed)
    }

    /// Samples zero-filled since the last reset
    pub fn zero_samples(&self) -> u64 {
        self.zero_samples.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.callbacks.store(0, Ordering::Relaxed);
        self.zero_samples.store(0, Ordering::Relaxed);
    }
}
