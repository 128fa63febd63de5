use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionBatch};
use crate::frame::Frame;

/// Scripted backend. Replays pre-recorded per-frame detection lists.
///
/// Each call to `detect` returns the next list in the script, scaled against
/// the geometry of the frame it was called with. The script wraps around
/// when exhausted; an empty script yields empty batches.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Vec<Vec<Detection>>,
    cursor: usize,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self { script, cursor: 0 }
    }

    /// Load a JSON-lines script: one JSON array of detections per line.
    ///
    /// Blank lines are skipped; use `[]` for a frame without detections.
    pub fn from_jsonl(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detector script {}", path.display()))?;
        Self::parse_jsonl(&raw)
            .with_context(|| format!("invalid detector script {}", path.display()))
    }

    pub fn parse_jsonl(raw: &str) -> Result<Self> {
        let mut script = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let frame: Vec<Detection> = serde_json::from_str(line)
                .map_err(|e| anyhow!("line {}: {}", idx + 1, e))?;
            script.push(frame);
        }
        Ok(Self::new(script))
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionBatch> {
        if self.script.is_empty() {
            return Ok(DetectionBatch::empty(frame.geometry()));
        }
        let detections = self.script[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.script.len();
        Ok(DetectionBatch::new(frame.geometry(), detections))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FrameGeometry;

    fn frame(sequence: u64) -> Frame {
        let geometry = FrameGeometry::new(4, 4).unwrap();
        Frame::rgb(vec![0u8; 48], geometry, sequence).unwrap()
    }

    #[test]
    fn scripted_backend_cycles_through_frames() {
        let person = Detection::new(0.1, 0.1, 0.9, 0.9, 1, 0.9);
        let mut backend = ScriptedBackend::new(vec![vec![person], vec![]]);

        let b1 = backend.detect(&frame(1)).unwrap();
        assert_eq!(b1.detections, vec![person]);
        assert_eq!(b1.geometry.width, 4);

        let b2 = backend.detect(&frame(2)).unwrap();
        assert!(b2.is_empty());

        let b3 = backend.detect(&frame(3)).unwrap();
        assert_eq!(b3.detections, vec![person]);
    }

    #[test]
    fn empty_script_yields_empty_batches() {
        let mut backend = ScriptedBackend::new(Vec::new());
        assert!(backend.detect(&frame(1)).unwrap().is_empty());
    }

    #[test]
    fn parses_jsonl_script() {
        let raw = r#"
[{"top":0.1,"left":0.1,"bottom":0.9,"right":0.9,"class_id":1,"score":0.9}]

[]
"#;
        let backend = ScriptedBackend::parse_jsonl(raw).unwrap();
        assert_eq!(backend.len(), 2);
    }

    #[test]
    fn jsonl_errors_name_the_line() {
        let err = ScriptedBackend::parse_jsonl("[]\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn debug_output_shows_script_position() {
        let mut backend = ScriptedBackend::new(vec![vec![], vec![]]);
        backend.detect(&frame(1)).unwrap();
        let debug = format!("{:?}", backend);
        assert!(debug.contains("cursor: 1"));
    }
}
