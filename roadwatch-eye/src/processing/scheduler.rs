//! Frame admission, backpressure and throughput statistics

use crate::clock::{Clock, SystemClock};
use crate::config::{FrameProcessingConfig, FrameProcessingConfigUpdate};
use crate::error::VisionError;
use crate::processing::detection::DetectionService;
use crate::processing::performance::{Measurement, PerformanceMonitor};
use crate::processing::rate_limiter::RateLimiter;
use crate::types::{Detection, Frame, ProcessingStats};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Why a frame was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Discarded by the frame-skip policy
    Skipped,
    /// `max_concurrent` detections already in flight
    QueueFull,
    /// Too soon after the previous admission
    RateLimited,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Skipped => write!(f, "skipped"),
            RejectReason::QueueFull => write!(f, "queue full"),
            RejectReason::RateLimited => write!(f, "rate limited"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    Processed(Vec<Detection>),
    Rejected(RejectReason),
}

impl FrameOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, FrameOutcome::Processed(_))
    }

    /// Detections of a processed frame, `None` when rejected
    pub fn detections(&self) -> Option<&[Detection]> {
        match self {
            FrameOutcome::Processed(detections) => Some(detections),
            FrameOutcome::Rejected(_) => None,
        }
    }
}

struct InFlight {
    marker: Measurement,
}

/// How an admitted detection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Processed,
    /// `detect` returned an error
    Failed,
    /// The detect future was dropped before finishing
    Cancelled,
}

struct SchedulerState {
    config: FrameProcessingConfig,
    rate_limiter: RateLimiter,
    monitor: PerformanceMonitor,
    in_flight: HashMap<u64, InFlight>,
    next_ticket: u64,
    /// Bumped by `reset`; completions from an older epoch are ignored
    epoch: u64,
    /// Wider than `skip_frames` so the increment cannot overflow
    skip_count: u64,
    frames_processed: u64,
    dropped_frames: u64,
    skipped_frames: u64,
    rate_limited_frames: u64,
}

impl SchedulerState {
    fn admit(&mut self) -> Result<(u64, u64), RejectReason> {
        self.skip_count += 1;
        if self.skip_count <= u64::from(self.config.skip_frames) {
            self.skipped_frames += 1;
            return Err(RejectReason::Skipped);
        }
        self.skip_count = 0;

        if self.in_flight.len() >= self.config.max_concurrent {
            self.dropped_frames += 1;
            return Err(RejectReason::QueueFull);
        }

        if !self.rate_limiter.should_admit() {
            self.rate_limited_frames += 1;
            return Err(RejectReason::RateLimited);
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let marker = self.monitor.start_measurement();
        self.in_flight.insert(ticket, InFlight { marker });
        Ok((ticket, self.epoch))
    }

    /// Deregister `ticket`. Every finished detect feeds the duration window;
    /// only successful ones count as processed.
    fn finish(&mut self, ticket: u64, epoch: u64, completion: Completion) {
        if epoch != self.epoch {
            return;
        }
        if let Some(entry) = self.in_flight.remove(&ticket) {
            if completion != Completion::Cancelled {
                self.monitor.end_measurement(entry.marker);
            }
            if completion == Completion::Processed {
                self.frames_processed += 1;
            }
        }
    }

    fn stats(&self) -> ProcessingStats {
        let average = self.monitor.average_processing_time();
        let current_fps = if average > 0.0 {
            (1000.0 / average).min(self.config.target_fps)
        } else {
            0.0
        };

        ProcessingStats {
            frames_processed: self.frames_processed,
            average_processing_time: average,
            current_fps,
            measured_fps: self.monitor.current_fps(),
            dropped_frames: self.dropped_frames,
            skipped_frames: self.skipped_frames,
            rate_limited_frames: self.rate_limited_frames,
            in_flight: self.in_flight.len(),
        }
    }

    fn reset(&mut self) {
        self.in_flight.clear();
        self.epoch += 1;
        self.skip_count = 0;
        self.frames_processed = 0;
        self.dropped_frames = 0;
        self.skipped_frames = 0;
        self.rate_limited_frames = 0;
        self.monitor.reset();
        self.rate_limiter.reset();
    }
}

/// Removes the in-flight entry if the detect future is dropped before completing
struct InFlightGuard<'a> {
    state: &'a Mutex<SchedulerState>,
    ticket: u64,
    epoch: u64,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn complete(mut self, completion: Completion) {
        self.armed = false;
        self.state.lock().finish(self.ticket, self.epoch, completion);
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state
                .lock()
                .finish(self.ticket, self.epoch, Completion::Cancelled);
        }
    }
}

/// Decides which frames reach the [`DetectionService`].
///
/// Admission runs in order: frame-skip policy, concurrency bound, rate gate.
/// Rejections never block. All bookkeeping happens under one lock that is
/// never held across an `.await`.
pub struct FrameScheduler {
    service: Arc<DetectionService>,
    state: Mutex<SchedulerState>,
}

impl FrameScheduler {
    pub fn new(
        service: Arc<DetectionService>,
        config: FrameProcessingConfig,
    ) -> Result<Self, VisionError> {
        Self::with_clock(service, config, Arc::new(SystemClock::new()))
    }

    pub fn with_clock(
        service: Arc<DetectionService>,
        config: FrameProcessingConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, VisionError> {
        config.validate().map_err(VisionError::Config)?;

        let state = SchedulerState {
            rate_limiter: RateLimiter::new(config.target_fps, clock.clone()),
            monitor: PerformanceMonitor::new(clock),
            config,
            in_flight: HashMap::new(),
            next_ticket: 0,
            epoch: 0,
            skip_count: 0,
            frames_processed: 0,
            dropped_frames: 0,
            skipped_frames: 0,
            rate_limited_frames: 0,
        };

        Ok(Self {
            service,
            state: Mutex::new(state),
        })
    }

    pub fn service(&self) -> &Arc<DetectionService> {
        &self.service
    }

    /// Admit `frame` and run detection on it, or reject it.
    ///
    /// Fails with [`VisionError::NotInitialized`] when the service is not ready;
    /// stats are left untouched in that case.
    pub async fn process_frame(&self, frame: &Frame) -> Result<FrameOutcome, VisionError> {
        if !self.service.is_ready() {
            return Err(VisionError::NotInitialized);
        }

        let admitted = self.state.lock().admit();
        let (ticket, epoch) = match admitted {
            Ok(admission) => admission,
            Err(reason) => {
                debug!("Frame {} rejected: {}", frame.uri, reason);
                return Ok(FrameOutcome::Rejected(reason));
            }
        };

        self.run_admitted(frame, ticket, epoch).await
    }

    async fn run_admitted(
        &self,
        frame: &Frame,
        ticket: u64,
        epoch: u64,
    ) -> Result<FrameOutcome, VisionError> {
        let guard = InFlightGuard {
            state: &self.state,
            ticket,
            epoch,
            armed: true,
        };

        match self.service.detect(frame).await {
            Ok(detections) => {
                guard.complete(Completion::Processed);
                Ok(FrameOutcome::Processed(detections))
            }
            Err(e) => {
                guard.complete(Completion::Failed);
                Err(e)
            }
        }
    }

    /// Run `frames` through [`process_frame`](Self::process_frame) one after another
    pub async fn process_batch(&self, frames: &[Frame]) -> Result<Vec<FrameOutcome>, VisionError> {
        let mut outcomes = Vec::with_capacity(frames.len());
        for frame in frames {
            outcomes.push(self.process_frame(frame).await?);
        }
        Ok(outcomes)
    }

    pub fn stats(&self) -> ProcessingStats {
        self.state.lock().stats()
    }

    pub fn config(&self) -> FrameProcessingConfig {
        self.state.lock().config.clone()
    }

    /// Merge `update`; a new target FPS applies to the next admission decision
    pub fn update_config(&self, update: &FrameProcessingConfigUpdate) -> Result<(), VisionError> {
        let mut state = self.state.lock();
        let next = state.config.merged(update)?;
        if next.target_fps != state.config.target_fps {
            state.rate_limiter.update_target_fps(next.target_fps);
        }
        state.config = next;
        debug!("Frame processing config updated: {:?}", update);
        Ok(())
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }

    /// Clear counters, the in-flight set and the duration window.
    ///
    /// Detections still running are not cancelled; their completions are ignored.
    pub fn reset(&self) {
        self.state.lock().reset();
        info!("Frame scheduler reset");
    }

    pub fn dispose(&self) {
        self.reset();
    }
}
