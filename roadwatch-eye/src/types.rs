//! Frames, detections and telemetry snapshots shared across the pipeline

use crate::error::VisionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Width/height pair in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A captured camera frame. The pipeline never looks at pixels, only at the
/// reference, the dimensions and the capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    pub timestamp: DateTime<Utc>,
}

impl Frame {
    /// Create a frame captured now
    pub fn new(uri: impl Into<String>, width: u32, height: u32) -> Self {
        Self::with_timestamp(uri, width, height, Utc::now())
    }

    pub fn with_timestamp(
        uri: impl Into<String>,
        width: u32,
        height: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            uri: uri.into(),
            width,
            height,
            timestamp,
        }
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Vehicle classes the detector reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Car,
    Truck,
    Bus,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 3] = [VehicleClass::Car, VehicleClass::Bus, VehicleClass::Truck];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Car => "car",
            VehicleClass::Truck => "truck",
            VehicleClass::Bus => "bus",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned rectangle, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Intersection over union. Zero when the boxes do not overlap.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        if !self.is_finite() || !other.is_finite() {
            return 0.0;
        }

        let inter_w = self.right().min(other.right()) - self.x.max(other.x);
        let inter_h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        if inter_w <= 0.0 || inter_h <= 0.0 {
            return 0.0;
        }

        let inter_area = inter_w * inter_h;
        let union_area = self.area() + other.area() - inter_area;
        if union_area <= 0.0 || !union_area.is_finite() {
            return 0.0;
        }

        (inter_area / union_area).clamp(0.0, 1.0)
    }

    /// Whether any part of the box lies inside `[0, width] x [0, height]`
    pub fn intersects_frame(&self, dims: Dimensions) -> bool {
        self.right() > 0.0
            && self.bottom() > 0.0
            && self.x < dims.width as f32
            && self.y < dims.height as f32
    }
}

/// Unfiltered candidate produced by a backend for one frame, in frame pixels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandidate {
    pub class: VehicleClass,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

impl RawCandidate {
    pub fn new(class: VehicleClass, confidence: f32, bounding_box: BoundingBox) -> Self {
        Self {
            class,
            confidence,
            bounding_box,
        }
    }
}

/// Final detection handed to the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub id: Uuid,
    pub class: VehicleClass,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

impl From<RawCandidate> for Detection {
    fn from(candidate: RawCandidate) -> Self {
        Self {
            id: Uuid::new_v4(),
            class: candidate.class,
            confidence: candidate.confidence,
            bounding_box: candidate.bounding_box,
        }
    }
}

/// Read-only snapshot of scheduler throughput
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub frames_processed: u64,
    /// Mean of the rolling duration window, in milliseconds
    pub average_processing_time: f64,
    /// Throughput estimate clamped to the configured target FPS
    pub current_fps: f64,
    /// Unclamped, rounded estimate straight from the performance monitor
    pub measured_fps: f64,
    /// Frames rejected because `max_concurrent` detections were in flight
    pub dropped_frames: u64,
    pub skipped_frames: u64,
    pub rate_limited_frames: u64,
    pub in_flight: usize,
}

impl ProcessingStats {
    pub fn to_json(&self) -> Result<String, VisionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_boxes() {
        let b = BoundingBox::new(10.0, 20.0, 100.0, 50.0);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_and_touching() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let far = BoundingBox::new(100.0, 100.0, 10.0, 10.0);
        let touching = BoundingBox::new(10.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&far), 0.0);
        assert_eq!(a.iou(&touching), 0.0);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        // 50 / 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_non_finite() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(f32::NAN, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_vehicle_class_serialization() {
        let json = serde_json::to_string(&VehicleClass::Truck).unwrap();
        assert_eq!(json, "\"truck\"");
    }

    #[test]
    fn test_processing_stats_json() {
        let stats = ProcessingStats {
            frames_processed: 12,
            dropped_frames: 3,
            ..Default::default()
        };
        let json = stats.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["frames_processed"], 12);
        assert_eq!(value["dropped_frames"], 3);
        assert_eq!(value["in_flight"], 0);
    }

    #[test]
    fn test_intersects_frame() {
        let dims = Dimensions::new(640, 480);
        assert!(BoundingBox::new(600.0, 400.0, 100.0, 100.0).intersects_frame(dims));
        assert!(!BoundingBox::new(700.0, 10.0, 20.0, 20.0).intersects_frame(dims));
        assert!(!BoundingBox::new(-50.0, 10.0, 20.0, 20.0).intersects_frame(dims));
    }

    #[test]
    fn test_detection_ids_unique() {
        let candidate = RawCandidate::new(VehicleClass::Car, 0.9, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        let a = Detection::from(candidate.clone());
        let b = Detection::from(candidate);
        assert_ne!(a.id, b.id);
    }
}
