//! Synthetic frame source.
//!
//! Generates patterned RGB frames at a fixed geometry. Paired with the
//! scripted detector it drives the whole alert chain without a camera.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use crate::detect::FrameGeometry;
use crate::frame::{Frame, RGB_CHANNELS};

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    /// Target frame rate. The caller paces itself with `frame_interval`.
    pub target_fps: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            target_fps: 10,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub connected_for: Option<Duration>,
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    geometry: FrameGeometry,
    frame_count: u64,
    connected_at: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.target_fps == 0 {
            return Err(anyhow!("target_fps must be >= 1"));
        }
        let geometry = FrameGeometry::new(config.width, config.height)?;
        Ok(Self {
            config,
            geometry,
            frame_count: 0,
            connected_at: None,
        })
    }

    /// Synthetic sources are always "connected".
    pub fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected ({}x{} @ {} fps)",
            self.config.width,
            self.config.height,
            self.config.target_fps
        );
        self.connected_at = Some(Instant::now());
        Ok(())
    }

    pub fn next_frame(&mut self) -> Result<Frame> {
        if self.connected_at.is_none() {
            return Err(anyhow!("SyntheticSource: next_frame before connect"));
        }
        self.frame_count += 1;
        let pixels = self.generate_pixels();
        Frame::rgb(pixels, self.geometry, self.frame_count)
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.config.target_fps as f64)
    }

    pub fn is_healthy(&self) -> bool {
        self.connected_at.is_some()
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            connected_for: self.connected_at.map(|at| at.elapsed()),
        }
    }

    // Diagonal gradient that drifts one step per frame.
    fn generate_pixels(&self) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels = vec![0u8; width * height * RGB_CHANNELS];
        for (i, px) in pixels.chunks_exact_mut(RGB_CHANNELS).enumerate() {
            let x = (i % width) as u64;
            let y = (i / width) as u64;
            let v = ((x + y + self.frame_count) % 256) as u8;
            px[0] = v;
            px[1] = v / 2;
            px[2] = 255 - v;
        }
        pixels
    }
}
