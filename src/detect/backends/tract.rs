#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::DetectionBatch;
use crate::detect::ssd::{decode_ssd_outputs, SsdOutputs};
use crate::frame::{Frame, RGB_CHANNELS};

/// Square input edge of SSD-MobileNet v1.
pub const SSD_INPUT_SIZE: u32 = 300;

/// Tract-based backend for SSD-MobileNet ONNX models.
///
/// The model takes a `[1, 300, 300, 3]` u8 RGB tensor and produces the four
/// SSD outputs in `boxes, classes, scores, count` order. Frames are resized
/// to the model input with nearest-neighbour sampling; detections stay
/// normalized, so the batch keeps the original frame geometry.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = SSD_INPUT_SIZE as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(0, InferenceFact::dt_shape(u8::datum_type(), tvec!(1, size, size, 3)))
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size: SSD_INPUT_SIZE,
        })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let geometry = frame.geometry();
        let src_w = geometry.width as usize;
        let src_h = geometry.height as usize;
        let size = self.input_size as usize;
        let pixels = frame.pixels();

        let input = tract_ndarray::Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| {
            let sy = (y * src_h / size).min(src_h - 1);
            let sx = (x * src_w / size).min(src_w - 1);
            pixels[(sy * src_w + sx) * RGB_CHANNELS + c]
        });
        input.into_tensor()
    }

    fn output_values(outputs: &TVec<TValue>, index: usize) -> Result<Vec<f32>> {
        let output = outputs
            .get(index)
            .ok_or_else(|| anyhow!("model produced no output #{}", index))?;
        let view = output
            .to_array_view::<f32>()
            .with_context(|| format!("model output #{} was not f32", index))?;
        Ok(view.iter().copied().collect())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionBatch> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;

        let locations = Self::output_values(&outputs, 0)?;
        let classes = Self::output_values(&outputs, 1)?;
        let scores = Self::output_values(&outputs, 2)?;
        let count = Self::output_values(&outputs, 3)
            .ok()
            .and_then(|v| v.first().copied());

        let detections = decode_ssd_outputs(&SsdOutputs {
            locations: &locations,
            classes: &classes,
            scores: &scores,
            count,
        });
        Ok(DetectionBatch::new(frame.geometry(), detections))
    }
}
