//! Rolling window of processing durations

use crate::clock::Clock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Number of samples kept for averaging
pub const PERFORMANCE_WINDOW: usize = 30;

/// Start marker returned by [`PerformanceMonitor::start_measurement`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    started_at: Duration,
}

pub struct PerformanceMonitor {
    clock: Arc<dyn Clock>,
    samples: VecDeque<Duration>,
}

impl PerformanceMonitor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            samples: VecDeque::with_capacity(PERFORMANCE_WINDOW),
        }
    }

    pub fn start_measurement(&self) -> Measurement {
        Measurement {
            started_at: self.clock.now(),
        }
    }

    /// Record the time elapsed since `marker` and return it
    pub fn end_measurement(&mut self, marker: Measurement) -> Duration {
        let elapsed = self.clock.now().saturating_sub(marker.started_at);
        self.record(elapsed);
        elapsed
    }

    /// Push a sample, evicting the oldest once the window is full
    pub fn record(&mut self, elapsed: Duration) {
        if self.samples.len() == PERFORMANCE_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(elapsed);
    }

    /// Mean of the window in milliseconds, 0 when empty
    pub fn average_processing_time(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let total: Duration = self.samples.iter().sum();
        total.as_secs_f64() * 1000.0 / self.samples.len() as f64
    }

    /// Rounded `1000 / average`. Not clamped to any target rate.
    pub fn current_fps(&self) -> f64 {
        let average = self.average_processing_time();
        if average > 0.0 {
            (1000.0 / average).round()
        } else {
            0.0
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
