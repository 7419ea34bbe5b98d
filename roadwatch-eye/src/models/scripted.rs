//! Deterministic backend that replays a fixed script of results

use crate::config::{DetectionConfig, DetectionConfigUpdate};
use crate::error::VisionError;
use crate::models::backend::{BackendState, DetectionBackend, Lifecycle};
use crate::types::{Frame, RawCandidate};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// One scripted `infer` outcome
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Candidates(Vec<RawCandidate>),
    Fail(String),
}

/// Backend whose `infer` results are queued up front.
///
/// Once the script runs out every call returns no candidates. Optional latencies
/// and a completion gate let tests control when calls finish; the backend tracks
/// how many calls are running at once.
pub struct ScriptedBackend {
    lifecycle: Lifecycle,
    script: Mutex<VecDeque<ScriptStep>>,
    config: RwLock<DetectionConfig>,
    fail_load: bool,
    load_latency: Duration,
    infer_latencies: Vec<Duration>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            script: Mutex::new(VecDeque::new()),
            config: RwLock::new(DetectionConfig::default()),
            fail_load: false,
            load_latency: Duration::ZERO,
            infer_latencies: Vec::new(),
            gate: None,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Queue a successful result
    pub fn with_frame(self, candidates: Vec<RawCandidate>) -> Self {
        self.script.lock().push_back(ScriptStep::Candidates(candidates));
        self
    }

    /// Queue an inference failure
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.script.lock().push_back(ScriptStep::Fail(message.into()));
        self
    }

    /// Make every `load` fail
    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn with_load_latency(mut self, latency: Duration) -> Self {
        self.load_latency = latency;
        self
    }

    /// Per-call inference latencies, used in order and cycled
    pub fn with_infer_latencies(mut self, latencies: Vec<Duration>) -> Self {
        self.infer_latencies = latencies;
        self
    }

    /// Each `infer` consumes one permit from `gate` before returning
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn infer_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls currently inside `infer`
    pub fn active_calls(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous `infer` calls observed
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn current_config(&self) -> DetectionConfig {
        self.config.read().clone()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DetectionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn state(&self) -> BackendState {
        self.lifecycle.state()
    }

    async fn load(&self, _model_path: Option<&Path>) -> Result<bool, VisionError> {
        if self.lifecycle.begin_load()? {
            return Ok(true);
        }

        if !self.load_latency.is_zero() {
            tokio::time::sleep(self.load_latency).await;
        }

        if self.fail_load {
            self.lifecycle.finish_load(false);
            return Err(VisionError::ModelLoad("Scripted load failure".to_string()));
        }

        Ok(self.lifecycle.finish_load(true) == BackendState::Ready)
    }

    async fn infer(&self, _frame: &Frame) -> Result<Vec<RawCandidate>, VisionError> {
        self.lifecycle.ensure_ready()?;

        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        if !self.infer_latencies.is_empty() {
            let latency = self.infer_latencies[call % self.infer_latencies.len()];
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
        }

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| VisionError::Inference(format!("Gate closed: {}", e)))?;
            permit.forget();
        }

        let step = self.script.lock().pop_front();
        match step {
            Some(ScriptStep::Candidates(candidates)) => Ok(candidates),
            Some(ScriptStep::Fail(message)) => Err(VisionError::Inference(message)),
            None => Ok(Vec::new()),
        }
    }

    fn update_config(&self, update: &DetectionConfigUpdate) {
        self.config.write().apply(update);
    }

    fn dispose(&self) {
        self.lifecycle.dispose();
    }
}
