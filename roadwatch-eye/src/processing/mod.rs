//! Detection processing: admission, inference orchestration and post-processing

pub mod detection;
pub mod performance;
pub mod postprocess;
pub mod rate_limiter;
pub mod scheduler;

pub use detection::DetectionService;
pub use performance::{Measurement, PerformanceMonitor, PERFORMANCE_WINDOW};
pub use postprocess::PostProcessor;
pub use rate_limiter::RateLimiter;
pub use scheduler::{FrameOutcome, FrameScheduler, RejectReason};
