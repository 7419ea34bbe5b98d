//! Frame sources feeding the detection runner

use crate::error::VisionError;
use crate::types::Frame;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Default synthetic frame edge, matching the model input
pub const SYNTHETIC_FRAME_SIZE: u32 = 640;

/// Bounded so a stalled consumer cannot grow memory without limit
const FRAME_BUFFER_SIZE: usize = 30;

/// Source of frames consumed by the runner
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is exhausted
    async fn next_frame(&mut self) -> Option<Frame>;
}

/// Stand-in for camera capture: produces `mock://frame_<millis>` frames
#[derive(Debug, Clone)]
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    remaining: Option<u64>,
    produced: u64,
}

impl SyntheticFrameSource {
    pub fn new() -> Self {
        Self::with_size(SYNTHETIC_FRAME_SIZE, SYNTHETIC_FRAME_SIZE)
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            remaining: None,
            produced: 0,
        }
    }

    /// Stop after `count` frames
    pub fn limited(mut self, count: u64) -> Self {
        self.remaining = Some(count);
        self
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }

    /// Capture one frame now
    pub fn capture(&mut self) -> Option<Frame> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        let now = Utc::now();
        let uri = format!("mock://frame_{}", now.timestamp_millis());
        self.produced += 1;
        Some(Frame::with_timestamp(uri, self.width, self.height, now))
    }
}

impl Default for SyntheticFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn next_frame(&mut self) -> Option<Frame> {
        self.capture()
    }
}

/// Frames pushed in from an external capture callback
pub struct ChannelFrameSource {
    receiver: mpsc::Receiver<Frame>,
}

impl ChannelFrameSource {
    /// Create the source and the sender the capture side pushes into
    pub fn channel() -> (FrameSender, Self) {
        let (tx, rx) = mpsc::channel(FRAME_BUFFER_SIZE);
        (FrameSender { sender: tx }, Self { receiver: rx })
    }
}

#[async_trait]
impl FrameSource for ChannelFrameSource {
    async fn next_frame(&mut self) -> Option<Frame> {
        // Keep only the newest queued frame; stale ones are useless to the detector
        let mut latest = match self.receiver.try_recv() {
            Ok(frame) => frame,
            Err(mpsc::error::TryRecvError::Empty) => self.receiver.recv().await?,
            Err(mpsc::error::TryRecvError::Disconnected) => return None,
        };
        while let Ok(frame) = self.receiver.try_recv() {
            debug!("Dropping stale frame {}", latest.uri);
            latest = frame;
        }
        Some(latest)
    }
}

/// Capture-side handle of a [`ChannelFrameSource`]
#[derive(Clone)]
pub struct FrameSender {
    sender: mpsc::Sender<Frame>,
}

impl FrameSender {
    /// Push a frame without waiting; fails when the buffer is full or the source is gone
    pub fn push(&self, frame: Frame) -> Result<(), VisionError> {
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(frame) => {
                VisionError::Camera(format!("Frame buffer full, dropped {}", frame.uri))
            }
            mpsc::error::TrySendError::Closed(frame) => {
                info!("Frame source closed");
                VisionError::Camera(format!("Frame source closed, dropped {}", frame.uri))
            }
        })
    }
}
