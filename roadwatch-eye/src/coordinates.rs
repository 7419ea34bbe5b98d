//! Mapping between display space and model-input space

use crate::types::{BoundingBox, Dimensions};

/// Aspect-preserving size that fits `dimensions` into a `target_size` square.
///
/// The longer edge becomes `target_size`; the shorter edge is scaled and rounded.
pub fn resize_for_model(dimensions: Dimensions, target_size: u32) -> Dimensions {
    if dimensions.is_empty() {
        return Dimensions::new(0, 0);
    }

    let (w, h) = (dimensions.width as f64, dimensions.height as f64);
    let target = target_size as f64;
    if dimensions.width >= dimensions.height {
        Dimensions::new(target_size, (target * h / w).round() as u32)
    } else {
        Dimensions::new((target * w / h).round() as u32, target_size)
    }
}

/// Scale a display-space rectangle into model space
pub fn to_model_space(rect: BoundingBox, screen: Dimensions, model: Dimensions) -> BoundingBox {
    scale_rect(rect, screen, model)
}

/// Scale a model-space rectangle back into display space
pub fn to_screen_space(rect: BoundingBox, screen: Dimensions, model: Dimensions) -> BoundingBox {
    scale_rect(rect, model, screen)
}

// A zero-sized source axis leaves that axis unscaled.
fn scale_rect(rect: BoundingBox, from: Dimensions, to: Dimensions) -> BoundingBox {
    let sx = axis_scale(from.width, to.width);
    let sy = axis_scale(from.height, to.height);
    BoundingBox {
        x: (rect.x as f64 * sx) as f32,
        y: (rect.y as f64 * sy) as f32,
        width: (rect.width as f64 * sx) as f32,
        height: (rect.height as f64 * sy) as f32,
    }
}

fn axis_scale(from: u32, to: u32) -> f64 {
    if from == 0 {
        1.0
    } else {
        to as f64 / from as f64
    }
}
