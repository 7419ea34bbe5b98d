//! Time gate for frame admission

use crate::clock::Clock;
use std::sync::Arc;
use std::time::Duration;

/// Admits at most one frame per `1 / target_fps` seconds
pub struct RateLimiter {
    clock: Arc<dyn Clock>,
    interval: Duration,
    /// `None` means the next call always admits
    last_admitted: Option<Duration>,
}

impl RateLimiter {
    /// Create a limiter. `target_fps` must be positive and finite.
    pub fn new(target_fps: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            interval: interval_for(target_fps),
            last_admitted: None,
        }
    }

    /// True when enough time has passed since the last admission; records `now` if so.
    pub fn should_admit(&mut self) -> bool {
        let now = self.clock.now();
        let eligible = match self.last_admitted {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval,
        };
        if eligible {
            self.last_admitted = Some(now);
        }
        eligible
    }

    /// Change the rate. The last admission timestamp is kept.
    pub fn update_target_fps(&mut self, target_fps: f64) {
        self.interval = interval_for(target_fps);
    }

    pub fn reset(&mut self) {
        self.last_admitted = None;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

fn interval_for(target_fps: f64) -> Duration {
    if target_fps.is_finite() && target_fps > 0.0 {
        Duration::try_from_secs_f64(1.0 / target_fps).unwrap_or(Duration::MAX)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_first_call_admits() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(10.0, Arc::new(clock));
        assert!(limiter.should_admit());
        assert_eq!(limiter.interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_admits_once_per_interval() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(10.0, Arc::new(clock.clone()));
        assert!(limiter.should_admit());

        clock.advance(Duration::from_millis(99));
        assert!(!limiter.should_admit());

        clock.advance(Duration::from_millis(1));
        assert!(limiter.should_admit());
        assert!(!limiter.should_admit());
    }

    #[test]
    fn test_rejection_does_not_move_timestamp() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(10.0, Arc::new(clock.clone()));
        assert!(limiter.should_admit());
        clock.advance(Duration::from_millis(60));
        assert!(!limiter.should_admit());
        clock.advance(Duration::from_millis(40));
        assert!(limiter.should_admit());
    }

    #[test]
    fn test_update_target_fps_keeps_timestamp() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(10.0, Arc::new(clock.clone()));
        assert!(limiter.should_admit());

        limiter.update_target_fps(20.0);
        clock.advance(Duration::from_millis(49));
        assert!(!limiter.should_admit());
        clock.advance(Duration::from_millis(1));
        assert!(limiter.should_admit());
    }

    #[test]
    fn test_unrepresentable_interval_saturates() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(1e-20, Arc::new(clock.clone()));
        assert_eq!(limiter.interval(), Duration::MAX);
        assert!(limiter.should_admit());
        clock.advance(Duration::from_secs(3600));
        assert!(!limiter.should_admit());

        limiter.update_target_fps(1e-300);
        assert_eq!(limiter.interval(), Duration::MAX);
    }

    #[test]
    fn test_reset_admits_immediately() {
        let clock = ManualClock::new();
        let mut limiter = RateLimiter::new(1.0, Arc::new(clock.clone()));
        assert!(limiter.should_admit());
        assert!(!limiter.should_admit());
        limiter.reset();
        assert!(limiter.should_admit());
    }
}
