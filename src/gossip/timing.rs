//! Adaptive protocol-period timing.
//!
//! Round-trip samples from direct pings feed a bounded window; the protocol
//! rate is twice the median RTT, floored at the configured minimum. A 1 Hz
//! refresh keeps the rate current without recomputing the percentile on the
//! hot path.

use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Bounded sliding window of round-trip samples, in milliseconds.
pub struct TimingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl TimingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, millis: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(millis);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Median of the recorded samples.
    pub fn p50(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        Some(sorted[sorted.len() / 2])
    }
}

pub struct ProtocolTiming {
    window: Mutex<TimingWindow>,
    /// Cached protocol rate in milliseconds, refreshed at 1 Hz.
    last_rate_ms: AtomicU64,
    min_period: Duration,
    last_period_start: Mutex<Option<Instant>>,
}

impl ProtocolTiming {
    pub fn new(min_period: Duration) -> Self {
        Self {
            window: Mutex::new(TimingWindow::new(1000)),
            last_rate_ms: AtomicU64::new(min_period.as_millis() as u64),
            min_period,
            last_period_start: Mutex::new(None),
        }
    }

    pub fn record_rtt(&self, rtt: Duration) {
        self.window.lock().record(rtt.as_secs_f64() * 1000.0);
    }

    /// Recompute the cached rate: `max(2 * p50, min_protocol_period)`.
    pub fn refresh_rate(&self) {
        if let Some(p50) = self.window.lock().p50() {
            let rate = (2.0 * p50).max(self.min_period.as_millis() as f64);
            self.last_rate_ms.store(rate.round() as u64, Ordering::Relaxed);
        }
    }

    pub fn protocol_rate(&self) -> Duration {
        Duration::from_millis(self.last_rate_ms.load(Ordering::Relaxed))
    }

    /// Stamp the start of the current protocol period.
    pub fn mark_period_start(&self) {
        *self.last_period_start.lock() = Some(Instant::now());
    }

    /// How long to sleep before the next protocol period.
    ///
    /// The first tick gets a uniform random delay in `[0, min_period]` so a
    /// fleet started simultaneously does not gossip in lockstep. Afterwards
    /// the next period lands one protocol rate after the previous one
    /// started, never sooner than the minimum period.
    pub fn compute_protocol_delay(&self) -> Duration {
        let last_start = *self.last_period_start.lock();
        match last_start {
            None => {
                let jitter = rand::thread_rng().gen_range(0..=self.min_period.as_millis() as u64);
                Duration::from_millis(jitter)
            }
            Some(start) => {
                let next = start + self.protocol_rate();
                let remaining = next.saturating_duration_since(Instant::now());
                remaining.max(self.min_period)
            }
        }
    }
}
