use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One object reported by the detector for a single frame.
///
/// Coordinates are normalized to `0..=1` relative to the frame, in the
/// `top, left, bottom, right` order the SSD family emits them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub class_id: u32,
    pub score: f32,
}

/// Why a detection was dropped from a frame's candidate pool.
///
/// Rejections are local to the frame; none of them stop the pipeline.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum DetectionError {
    #[error("malformed detection: {reason}")]
    Malformed { reason: &'static str },

    #[error("unknown class id {0}")]
    UnknownClassId(u32),
}

impl Detection {
    pub fn new(top: f32, left: f32, bottom: f32, right: f32, class_id: u32, score: f32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
            class_id,
            score,
        }
    }

    /// Check the box and score invariants.
    pub fn validate(&self) -> Result<(), DetectionError> {
        let fields = [self.top, self.left, self.bottom, self.right, self.score];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(DetectionError::Malformed {
                reason: "non-finite coordinate or score",
            });
        }
        if self.top > self.bottom {
            return Err(DetectionError::Malformed {
                reason: "top below bottom",
            });
        }
        if self.left > self.right {
            return Err(DetectionError::Malformed {
                reason: "left beyond right",
            });
        }
        if !(0.0..=1.0).contains(&self.score) {
            return Err(DetectionError::Malformed {
                reason: "score outside 0..=1",
            });
        }
        Ok(())
    }
}

/// Pixel dimensions of the frame a batch of detections was computed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "frame geometry must be non-zero (got {}x{})",
                width,
                height
            ));
        }
        Ok(Self { width, height })
    }

    pub fn width_px(&self) -> f32 {
        self.width as f32
    }

    pub fn height_px(&self) -> f32 {
        self.height as f32
    }

    pub fn area_px(&self) -> f32 {
        self.width_px() * self.height_px()
    }
}

/// Everything the detector hands over for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionBatch {
    pub geometry: FrameGeometry,
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn new(geometry: FrameGeometry, detections: Vec<Detection>) -> Self {
        Self {
            geometry,
            detections,
        }
    }

    pub fn empty(geometry: FrameGeometry) -> Self {
        Self::new(geometry, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_detection_passes() {
        let d = Detection::new(0.1, 0.1, 0.9, 0.9, 1, 0.9);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn degenerate_box_is_valid() {
        // Zero-area boxes satisfy top <= bottom and left <= right.
        let d = Detection::new(0.5, 0.5, 0.5, 0.5, 1, 0.9);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn inverted_boxes_are_malformed() {
        let upside_down = Detection::new(0.8, 0.1, 0.2, 0.9, 1, 0.9);
        assert!(matches!(
            upside_down.validate(),
            Err(DetectionError::Malformed { .. })
        ));

        let mirrored = Detection::new(0.1, 0.9, 0.9, 0.1, 1, 0.9);
        assert!(matches!(
            mirrored.validate(),
            Err(DetectionError::Malformed { .. })
        ));
    }

    #[test]
    fn score_outside_unit_interval_is_malformed() {
        assert!(Detection::new(0.1, 0.1, 0.9, 0.9, 1, 1.01).validate().is_err());
        assert!(Detection::new(0.1, 0.1, 0.9, 0.9, 1, -0.1).validate().is_err());
        assert!(Detection::new(0.1, 0.1, 0.9, 0.9, 1, f32::NAN).validate().is_err());
    }

    #[test]
    fn zero_geometry_is_rejected() {
        assert!(FrameGeometry::new(0, 480).is_err());
        assert!(FrameGeometry::new(640, 0).is_err());
        assert_eq!(FrameGeometry::new(640, 480).unwrap().area_px(), 307_200.0);
    }

    #[test]
    fn batch_round_trips_through_json() {
        let batch = DetectionBatch::new(
            FrameGeometry::new(640, 480).unwrap(),
            vec![Detection::new(0.1, 0.2, 0.3, 0.4, 7, 0.75)],
        );
        let json = serde_json::to_string(&batch).unwrap();
        let back: DetectionBatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, batch);
    }
}
