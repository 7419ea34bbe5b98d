//! Confidence filtering and greedy non-maximum suppression

use crate::config::DetectionConfig;
use crate::types::{Detection, RawCandidate};
use std::cmp::Ordering;
use tracing::debug;

/// Reduces raw backend candidates to the final detection set
pub struct PostProcessor;

impl PostProcessor {
    /// Filter, sort, suppress and truncate.
    ///
    /// Candidates below `confidence_threshold` (or with a non-finite confidence) are
    /// dropped. The rest are walked in descending confidence order, input order breaking
    /// ties; a candidate is kept only if its IoU with every kept detection is at most
    /// `nms_threshold`. The walk stops once `max_detections` are kept.
    pub fn process(
        candidates: Vec<RawCandidate>,
        confidence_threshold: f32,
        nms_threshold: f32,
        max_detections: usize,
    ) -> Vec<Detection> {
        let total = candidates.len();
        let mut remaining: Vec<RawCandidate> = candidates
            .into_iter()
            .filter(|c| c.confidence.is_finite() && c.confidence >= confidence_threshold)
            .collect();

        // sort_by is stable
        remaining.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        let mut kept: Vec<Detection> = Vec::with_capacity(max_detections.min(remaining.len()));
        for candidate in remaining {
            if kept.len() >= max_detections {
                break;
            }

            let suppressed = kept
                .iter()
                .any(|d| d.bounding_box.iou(&candidate.bounding_box) > nms_threshold);
            if !suppressed {
                kept.push(Detection::from(candidate));
            }
        }

        debug!("Post-processing kept {} of {} candidates", kept.len(), total);
        kept
    }

    /// [`PostProcessor::process`] with thresholds taken from `config`
    pub fn process_with(candidates: Vec<RawCandidate>, config: &DetectionConfig) -> Vec<Detection> {
        Self::process(
            candidates,
            config.confidence_threshold,
            config.nms_threshold,
            config.max_detections,
        )
    }
}
