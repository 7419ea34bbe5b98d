//! Detection loop: pulls frames on a fixed tick and publishes results

use crate::camera::FrameSource;
use crate::config::{DetectionConfigUpdate, FrameProcessingConfig, FrameProcessingConfigUpdate};
use crate::error::VisionError;
use crate::processing::{FrameOutcome, FrameScheduler};
use crate::types::{Detection, ProcessingStats};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// What the renderer shows. Each update replaces the previous one entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionUpdate {
    pub detections: Vec<Detection>,
    pub stats: ProcessingStats,
    /// Capture time of the frame the detections belong to; `None` when cleared
    pub frame_timestamp: Option<DateTime<Utc>>,
}

/// Drives a [`FrameScheduler`] from a [`FrameSource`].
///
/// Admitted frames run as separate tasks so a slow detection never holds up the
/// tick. Completions can arrive out of order; the most recent one wins.
pub struct DetectionRunner {
    scheduler: Arc<FrameScheduler>,
    updates: Arc<watch::Sender<DetectionUpdate>>,
    tick: watch::Sender<Duration>,
    /// Bumped on every start and stop; results from an older run are dropped
    generation: Arc<Mutex<u64>>,
    is_running: Arc<RwLock<bool>>,
    processing_handle: RwLock<Option<JoinHandle<()>>>,
}

fn tick_period(config: &FrameProcessingConfig) -> Duration {
    config.frame_interval().max(Duration::from_millis(1))
}

fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

impl DetectionRunner {
    pub fn new(scheduler: Arc<FrameScheduler>) -> Self {
        let (updates, _) = watch::channel(DetectionUpdate::default());
        let (tick, _) = watch::channel(tick_period(&scheduler.config()));

        Self {
            scheduler,
            updates: Arc::new(updates),
            tick,
            generation: Arc::new(Mutex::new(0)),
            is_running: Arc::new(RwLock::new(false)),
            processing_handle: RwLock::new(None),
        }
    }

    pub fn scheduler(&self) -> &Arc<FrameScheduler> {
        &self.scheduler
    }

    /// Receiver for the renderer
    pub fn subscribe(&self) -> watch::Receiver<DetectionUpdate> {
        self.updates.subscribe()
    }

    /// Most recently published update
    pub fn latest(&self) -> DetectionUpdate {
        self.updates.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        *self.is_running.read()
    }

    /// Current spacing between two loop ticks
    pub fn tick_interval(&self) -> Duration {
        *self.tick.borrow()
    }

    /// Start pulling frames from `source`. The detection service must be ready.
    pub fn start(&self, mut source: Box<dyn FrameSource>) -> Result<(), VisionError> {
        if !self.scheduler.service().is_ready() {
            return Err(VisionError::NotInitialized);
        }

        let generation = {
            let mut current = self.generation.lock();
            let mut is_running = self.is_running.write();
            if *is_running {
                return Err(VisionError::AlreadyRunning);
            }
            *is_running = true;
            *current += 1;
            *current
        };

        let scheduler = self.scheduler.clone();
        let updates = self.updates.clone();
        let current = self.generation.clone();
        let is_running = self.is_running.clone();
        let mut tick_rx = self.tick.subscribe();

        let handle = tokio::spawn(async move {
            let mut period = *tick_rx.borrow_and_update();
            let mut interval = ticker(period);
            info!("Detection loop started ({:?} per tick)", period);

            loop {
                if !*is_running.read() {
                    break;
                }

                tokio::select! {
                    _ = interval.tick() => {}
                    changed = tick_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        period = *tick_rx.borrow_and_update();
                        interval = ticker(period);
                        debug!("Detection loop interval now {:?}", period);
                        continue;
                    }
                }

                // Use timeout so a quiet source cannot stall the stop check
                let frame = match tokio::time::timeout(period, source.next_frame()).await {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        info!("Frame source exhausted");
                        break;
                    }
                    Err(_) => continue,
                };

                let scheduler = scheduler.clone();
                let updates = updates.clone();
                let current = current.clone();
                tokio::spawn(async move {
                    match scheduler.process_frame(&frame).await {
                        Ok(FrameOutcome::Processed(detections)) => {
                            let stats = scheduler.stats();
                            let current = current.lock();
                            if *current != generation {
                                debug!("Discarding late result for frame {}", frame.uri);
                                return;
                            }
                            updates.send_replace(DetectionUpdate {
                                detections,
                                stats,
                                frame_timestamp: Some(frame.timestamp),
                            });
                        }
                        Ok(FrameOutcome::Rejected(_)) => {}
                        Err(e) if e.is_fatal() => {
                            error!("Frame processing error: {}", e);
                        }
                        Err(e) => {
                            warn!("Frame processing error: {}", e);
                        }
                    }
                });
            }

            let current = current.lock();
            if *current == generation {
                *is_running.write() = false;
            }
            info!("Detection loop stopped");
        });

        *self.processing_handle.write() = Some(handle);
        Ok(())
    }

    /// Stop admitting frames and clear the displayed detections.
    ///
    /// Detections already running are left to finish; their results are discarded.
    pub fn stop(&self) {
        {
            let mut current = self.generation.lock();
            *current += 1;
            *self.is_running.write() = false;
            self.updates.send_replace(DetectionUpdate {
                detections: Vec::new(),
                stats: self.scheduler.stats(),
                frame_timestamp: None,
            });
        }

        if let Some(handle) = self.processing_handle.write().take() {
            handle.abort();
        }
        info!("Detection runner stopped");
    }

    /// Merge frame-processing settings; a new target FPS restarts the tick
    pub fn update_config(&self, update: &FrameProcessingConfigUpdate) -> Result<(), VisionError> {
        let before = self.scheduler.config();
        self.scheduler.update_config(update)?;
        let after = self.scheduler.config();

        if after.target_fps != before.target_fps {
            let period = tick_period(&after);
            self.tick.send_replace(period);
            info!(
                "Detection rate changed from {} to {} FPS",
                before.target_fps, after.target_fps
            );
        }
        Ok(())
    }

    /// Forward detection settings to the service
    pub fn update_detection_config(&self, update: &DetectionConfigUpdate) -> Result<(), VisionError> {
        self.scheduler.service().update_config(update)
    }

    /// Stop, then release the scheduler and the backend
    pub fn dispose(&self) {
        self.stop();
        self.scheduler.dispose();
        self.scheduler.service().dispose();
    }
}

impl Drop for DetectionRunner {
    fn drop(&mut self) {
        *self.is_running.write() = false;
        if let Some(handle) = self.processing_handle.write().take() {
            handle.abort();
        }
    }
}
