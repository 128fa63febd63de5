//! Frame container handed from a frame source to a detector backend.
//!
//! - `Frame`: RGB pixels plus the geometry detections are scaled against.
//!
//! Frames are ephemeral: a frame lives until the detector has produced its
//! `DetectionBatch`, after which only the batch flows into the alert pipeline.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use crate::detect::FrameGeometry;

/// Bytes per pixel for the packed RGB layout every source produces.
pub const RGB_CHANNELS: usize = 3;

/// One captured frame. Pixels are packed RGB, row-major.
pub struct Frame {
    pixels: Vec<u8>,
    geometry: FrameGeometry,
    /// Source-assigned, monotonically increasing frame number.
    sequence: u64,
    captured_at: Instant,
}

impl Frame {
    /// Wrap packed RGB pixels. The buffer length must match the geometry.
    pub fn rgb(pixels: Vec<u8>, geometry: FrameGeometry, sequence: u64) -> Result<Self> {
        let expected = (geometry.width as usize)
            .checked_mul(geometry.height as usize)
            .and_then(|v| v.checked_mul(RGB_CHANNELS))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                geometry.width,
                geometry.height,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            geometry,
            sequence,
            captured_at: Instant::now(),
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Time since capture, for latency logging.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_frame_requires_matching_length() {
        let geometry = FrameGeometry::new(4, 2).unwrap();
        assert!(Frame::rgb(vec![0u8; 4 * 2 * 3], geometry, 1).is_ok());
        assert!(Frame::rgb(vec![0u8; 4 * 2], geometry, 1).is_err());
    }

    #[test]
    fn frame_exposes_metadata() {
        let geometry = FrameGeometry::new(2, 2).unwrap();
        let frame = Frame::rgb(vec![7u8; 12], geometry, 42).unwrap();
        assert_eq!(frame.geometry(), geometry);
        assert_eq!(frame.sequence(), 42);
        assert_eq!(frame.pixels().len(), 12);
        assert!(frame.age() < Duration::from_secs(60));
    }
}
