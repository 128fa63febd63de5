//! Proximity scoring and closest-object selection.
//!
//! Every qualifying detection gets an urgency score: a weighted blend of how
//! much of the frame the box covers and how close its center sits to the
//! frame center. The selector keeps the single most urgent detection per
//! frame. Nothing here carries state between frames.

use crate::detect::{Detection, FrameGeometry};
use crate::AlertThresholds;

/// A detection projected into pixel space with its urgency score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredCandidate {
    pub detection: Detection,
    pub geometry: FrameGeometry,
    pub box_width_px: f32,
    pub box_height_px: f32,
    pub center_x_px: f32,
    pub center_y_px: f32,
    /// Ranking score. Only used to choose between detections.
    pub urgency_score: f32,
    /// Box area over frame area. Drives severity; not clamped.
    pub area_ratio: f32,
}

impl ScoredCandidate {
    /// Horizontal center as a fraction of frame width.
    pub fn center_x_percent(&self) -> f32 {
        self.center_x_px / self.geometry.width_px()
    }
}

/// Score one detection. Returns `None` when its confidence does not exceed
/// `min_confidence`; such detections are never scored.
pub fn score_detection(
    detection: &Detection,
    geometry: FrameGeometry,
    thresholds: &AlertThresholds,
) -> Option<ScoredCandidate> {
    if detection.score <= thresholds.min_confidence {
        return None;
    }

    let frame_w = geometry.width_px();
    let frame_h = geometry.height_px();

    let box_width_px = (detection.right - detection.left) * frame_w;
    let box_height_px = (detection.bottom - detection.top) * frame_h;
    let center_x_px = (detection.left + detection.right) * frame_w / 2.0;
    let center_y_px = (detection.top + detection.bottom) * frame_h / 2.0;

    let area_ratio = (box_width_px * box_height_px) / (frame_w * frame_h);

    let dx = center_x_px - frame_w / 2.0;
    let dy = center_y_px - frame_h / 2.0;
    let center_distance = (dx * dx + dy * dy).sqrt();
    let max_distance = (frame_w * frame_w + frame_h * frame_h).sqrt();
    let center_factor = 1.0 - center_distance / max_distance;

    let urgency_score = thresholds.area_weight * area_ratio + thresholds.center_weight * center_factor;

    Some(ScoredCandidate {
        detection: *detection,
        geometry,
        box_width_px,
        box_height_px,
        center_x_px,
        center_y_px,
        urgency_score,
        area_ratio,
    })
}

/// Pick the most urgent detection of a frame.
///
/// Ties keep the earliest detection in detector order.
pub fn select_closest<'a, I>(
    detections: I,
    geometry: FrameGeometry,
    thresholds: &AlertThresholds,
) -> Option<ScoredCandidate>
where
    I: IntoIterator<Item = &'a Detection>,
{
    let mut best: Option<ScoredCandidate> = None;
    for detection in detections {
        let Some(candidate) = score_detection(detection, geometry, thresholds) else {
            continue;
        };
        match &best {
            Some(current) if candidate.urgency_score <= current.urgency_score => {}
            _ => best = Some(candidate),
        }
    }
    best
}
