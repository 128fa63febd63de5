//! Decoding for SSD-style detector outputs.
//!
//! SSD-MobileNet exports four output tensors:
//! - locations: `[N, 4]` boxes as `top, left, bottom, right` (normalized)
//! - classes: `[N]` class ids stored as floats
//! - scores: `[N]` confidences
//! - count: `[1]` number of valid rows

use crate::detect::result::Detection;

/// Flat views over the four SSD output tensors.
#[derive(Clone, Copy, Debug, Default)]
pub struct SsdOutputs<'a> {
    pub locations: &'a [f32],
    pub classes: &'a [f32],
    pub scores: &'a [f32],
    pub count: Option<f32>,
}

/// Turn raw SSD tensors into detections, in the detector's output order.
///
/// The row count is the shortest of the three per-row tensors, further capped
/// by `count` when the model reports one. Rows whose class id is not a
/// non-negative integer are dropped. Box and score validation happens later
/// in the pipeline, so malformed boxes are passed through untouched.
pub fn decode_ssd_outputs(outputs: &SsdOutputs<'_>) -> Vec<Detection> {
    let mut rows = (outputs.locations.len() / 4)
        .min(outputs.classes.len())
        .min(outputs.scores.len());
    if let Some(count) = outputs.count {
        if count.is_finite() && count >= 0.0 {
            rows = rows.min(count as usize);
        }
    }

    let mut detections = Vec::with_capacity(rows);
    for i in 0..rows {
        let class = outputs.classes[i];
        if !class.is_finite() || class < 0.0 || class.fract() != 0.0 {
            log::debug!("ssd row {} dropped: class id {} is not an index", i, class);
            continue;
        }
        let loc = &outputs.locations[i * 4..i * 4 + 4];
        detections.push(Detection {
            top: loc[0],
            left: loc[1],
            bottom: loc[2],
            right: loc[3],
            class_id: class as u32,
            score: outputs.scores[i],
        });
    }
    detections
}
