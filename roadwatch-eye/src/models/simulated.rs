//! Seeded stand-in detector used when no real model is wired in

use crate::config::{DetectionConfig, DetectionConfigUpdate, ModelConfig};
use crate::coordinates::{resize_for_model, to_screen_space};
use crate::error::VisionError;
use crate::models::backend::{BackendState, DetectionBackend, Lifecycle};
use crate::types::{BoundingBox, Frame, RawCandidate, VehicleClass};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_CONFIDENCE: f32 = 0.95;

/// Generates 1-4 plausible vehicle candidates per frame from a seeded RNG.
///
/// Boxes are sized per class (buses and trucks larger than cars), laid out in
/// model-input space and mapped back to frame pixels.
pub struct SimulatedBackend {
    lifecycle: Lifecycle,
    config: RwLock<DetectionConfig>,
    rng: Mutex<StdRng>,
    load_latency: Duration,
    inference_latency: Duration,
    degraded: RwLock<bool>,
}

impl SimulatedBackend {
    pub fn new(seed: u64) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            config: RwLock::new(DetectionConfig::default()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            load_latency: Duration::ZERO,
            inference_latency: Duration::ZERO,
            degraded: RwLock::new(false),
        }
    }

    pub fn from_config(model: &ModelConfig, detection: &DetectionConfig) -> Self {
        Self::new(model.seed)
            .with_detection_config(detection.clone())
            .with_load_latency(model.load_latency())
            .with_inference_latency(model.inference_latency())
    }

    pub fn with_detection_config(mut self, config: DetectionConfig) -> Self {
        self.config = RwLock::new(config);
        self
    }

    pub fn with_load_latency(mut self, latency: Duration) -> Self {
        self.load_latency = latency;
        self
    }

    pub fn with_inference_latency(mut self, latency: Duration) -> Self {
        self.inference_latency = latency;
        self
    }

    /// True when the requested model artifact was missing at load time
    pub fn is_degraded(&self) -> bool {
        *self.degraded.read()
    }

    fn generate(&self, frame: &Frame, model_input_size: u32) -> Vec<RawCandidate> {
        let frame_dims = frame.dimensions();
        let model_dims = resize_for_model(frame_dims, model_input_size);
        let (mw, mh) = (model_dims.width as f32, model_dims.height as f32);

        let mut rng = self.rng.lock();
        let count = rng.gen_range(1..=4);
        let mut candidates = Vec::with_capacity(count);

        for _ in 0..count {
            let class = VehicleClass::ALL[rng.gen_range(0..VehicleClass::ALL.len())];
            let (conf_lo, conf_hi) = confidence_range(class);
            let confidence = rng.gen_range(conf_lo..conf_hi).min(MAX_CONFIDENCE);

            let ((wl, wh), (hl, hh)) = size_fractions(class);
            let width = rng.gen_range(wl..wh) * mw;
            let height = rng.gen_range(hl..hh) * mh;

            // Keep centres away from the frame edges
            let cx = rng.gen_range(0.13..0.87) * mw;
            let cy = rng.gen_range(0.24..0.76) * mh;

            let x = (cx - width / 2.0).clamp(0.0, (mw - width).max(0.0));
            let y = (cy - height / 2.0).clamp(0.0, (mh - height).max(0.0));

            let model_box = BoundingBox::new(x, y, width, height);
            candidates.push(RawCandidate::new(
                class,
                confidence,
                to_screen_space(model_box, frame_dims, model_dims),
            ));
        }

        candidates
    }
}

fn confidence_range(class: VehicleClass) -> (f32, f32) {
    match class {
        VehicleClass::Car => (0.75, 0.95),
        VehicleClass::Truck => (0.65, 0.90),
        VehicleClass::Bus => (0.70, 0.90),
    }
}

/// (width, height) ranges as fractions of the model input
fn size_fractions(class: VehicleClass) -> ((f32, f32), (f32, f32)) {
    match class {
        VehicleClass::Car => ((0.25, 0.45), (0.10, 0.15)),
        VehicleClass::Truck => ((0.38, 0.56), (0.12, 0.17)),
        VehicleClass::Bus => ((0.46, 0.64), (0.14, 0.19)),
    }
}

#[async_trait]
impl DetectionBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn state(&self) -> BackendState {
        self.lifecycle.state()
    }

    async fn load(&self, model_path: Option<&Path>) -> Result<bool, VisionError> {
        if self.lifecycle.begin_load()? {
            return Ok(true);
        }

        info!("Loading detection model {:?}", model_path);
        if !self.load_latency.is_zero() {
            tokio::time::sleep(self.load_latency).await;
        }

        match model_path {
            Some(path) if !path.exists() => {
                warn!(
                    "Model asset {:?} not found, falling back to simulated detection",
                    path
                );
                *self.degraded.write() = true;
            }
            Some(path) => {
                info!("Model asset {:?} present, running simulated inference", path);
                *self.degraded.write() = false;
            }
            None => {
                info!("No model asset configured, running simulated inference");
                *self.degraded.write() = true;
            }
        }

        let state = self.lifecycle.finish_load(true);
        Ok(state == BackendState::Ready)
    }

    async fn infer(&self, frame: &Frame) -> Result<Vec<RawCandidate>, VisionError> {
        self.lifecycle.ensure_ready()?;

        if frame.width == 0 || frame.height == 0 {
            return Err(VisionError::Inference(format!(
                "Frame {} has zero dimensions",
                frame.uri
            )));
        }

        if !self.inference_latency.is_zero() {
            tokio::time::sleep(self.inference_latency).await;
        }

        // A dispose may have landed while we slept
        self.lifecycle.ensure_ready()?;

        let model_input_size = self.config.read().model_input_size;
        let candidates = self.generate(frame, model_input_size);
        debug!("Simulated {} candidates for {}", candidates.len(), frame.uri);
        Ok(candidates)
    }

    fn update_config(&self, update: &DetectionConfigUpdate) {
        self.config.write().apply(update);
    }

    fn dispose(&self) {
        self.lifecycle.dispose();
        info!("Simulated backend disposed");
    }
}
