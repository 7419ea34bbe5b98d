//! roadwatch-eye: real-time vehicle detection pipeline
//!
//! Frames from a [`FrameSource`] pass through the [`FrameScheduler`], which
//! decides which of them reach the [`DetectionService`]. The service runs a
//! [`DetectionBackend`] and reduces its raw candidates to a bounded,
//! non-overlapping set of [`Detection`]s. [`DetectionRunner`] ties the pieces
//! into a loop and publishes every result on a watch channel.

pub mod camera;
pub mod clock;
pub mod config;
pub mod coordinates;
pub mod error;
pub mod models;
pub mod processing;
pub mod runner;
pub mod types;

pub use camera::{ChannelFrameSource, FrameSender, FrameSource, SyntheticFrameSource};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DetectionConfig, DetectionConfigUpdate, FrameProcessingConfig, FrameProcessingConfigUpdate,
    ModelConfig, PipelineConfig,
};
pub use error::VisionError;
pub use models::{BackendState, DetectionBackend, ModelAssets, ScriptedBackend, SimulatedBackend};
pub use processing::{
    DetectionService, FrameOutcome, FrameScheduler, PerformanceMonitor, PostProcessor,
    RateLimiter, RejectReason,
};
pub use runner::{DetectionRunner, DetectionUpdate};
pub use types::{
    BoundingBox, Detection, Dimensions, Frame, ProcessingStats, RawCandidate, VehicleClass,
};
