//! SightSense obstacle alerts
//!
//! This crate turns per-frame object detections into spoken proximity
//! warnings for visually impaired users.
//!
//! # Architecture
//!
//! Each frame runs one chain on the frame context:
//!
//! 1. **Validate**: malformed boxes and unknown class ids leave the pool.
//! 2. **Score + select**: the single most urgent detection is kept.
//! 3. **Classify**: area ratio and horizontal position pick a message.
//! 4. **Gate**: identical text inside the cooldown is suppressed.
//! 5. **Queue**: the warning is spoken now or queued behind the current one.
//!
//! The speech device completes utterances asynchronously on its own threads;
//! the queue serializes both sides behind one lock.
//!
//! # Module Structure
//!
//! - `detect`: Detection records, detector backends, SSD output decoding
//! - `proximity`, `warning`, `gate`: the per-frame decision chain
//! - `speech`: Speech devices and the one-at-a-time speech queue
//! - `frame`, `ingest`: Frames and the synthetic frame source
//! - Core types: AlertThresholds, AlertPipeline, AlertSession

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod detect;
pub mod frame;
pub mod gate;
pub mod ingest;
pub mod labels;
pub mod proximity;
pub mod speech;
pub mod ui;
pub mod warning;

pub use detect::{
    BackendRegistry, Detection, DetectionBatch, DetectionError, DetectorBackend, FrameGeometry,
    ScriptedBackend,
};
pub use frame::Frame;
pub use gate::{Clock, GateState, ManualClock, MonotonicClock, WarningGate};
pub use ingest::{SyntheticConfig, SyntheticSource};
pub use labels::{LabelMap, LabelResolver};
pub use proximity::{score_detection, select_closest, ScoredCandidate};
pub use speech::{
    CommandSpeechDevice, CompletionHandle, LogSpeechDevice, RecordingSpeechDevice, SpeechDevice,
    SpeechQueue, SubmitOutcome, UtteranceId,
};
pub use warning::{classify, Direction, Severity, Warning};

// -------------------- Thresholds --------------------

const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
const DEFAULT_CLOSE_AREA_RATIO: f32 = 0.25;
const DEFAULT_STEP_AREA_RATIO: f32 = 0.35;
const DEFAULT_STOP_AREA_RATIO: f32 = 0.45;
const DEFAULT_CENTER_ZONE_HALF_WIDTH: f32 = 0.15;
const DEFAULT_AREA_WEIGHT: f32 = 0.7;
const DEFAULT_CENTER_WEIGHT: f32 = 0.3;
const DEFAULT_COOLDOWN_MS: u64 = 1500;

/// Tunables of the per-frame decision chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Detections must score strictly above this to be considered.
    pub min_confidence: f32,
    /// Area ratio a candidate must exceed to produce any warning.
    pub close_area_ratio: f32,
    pub step_area_ratio: f32,
    pub stop_area_ratio: f32,
    /// Half-width of the `Center` zone around the frame's vertical midline.
    pub center_zone_half_width: f32,
    pub area_weight: f32,
    pub center_weight: f32,
    /// Minimum gap between two emissions of the identical text.
    pub cooldown_ms: u64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            close_area_ratio: DEFAULT_CLOSE_AREA_RATIO,
            step_area_ratio: DEFAULT_STEP_AREA_RATIO,
            stop_area_ratio: DEFAULT_STOP_AREA_RATIO,
            center_zone_half_width: DEFAULT_CENTER_ZONE_HALF_WIDTH,
            area_weight: DEFAULT_AREA_WEIGHT,
            center_weight: DEFAULT_CENTER_WEIGHT,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

impl AlertThresholds {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f32| -> Result<()> {
            if !(v > 0.0 && v < 1.0) {
                return Err(anyhow!("{} must be within (0, 1), got {}", name, v));
            }
            Ok(())
        };
        unit("min_confidence", self.min_confidence)?;
        unit("close_area_ratio", self.close_area_ratio)?;
        unit("step_area_ratio", self.step_area_ratio)?;
        unit("stop_area_ratio", self.stop_area_ratio)?;

        if !(self.close_area_ratio < self.step_area_ratio
            && self.step_area_ratio < self.stop_area_ratio)
        {
            return Err(anyhow!(
                "area ratios must be strictly increasing: close < step < stop"
            ));
        }
        if !(0.0..0.5).contains(&self.center_zone_half_width) {
            return Err(anyhow!(
                "center_zone_half_width must be within [0, 0.5), got {}",
                self.center_zone_half_width
            ));
        }
        if !(self.area_weight >= 0.0 && self.center_weight >= 0.0) {
            return Err(anyhow!("score weights must be non-negative"));
        }
        Ok(())
    }
}

// -------------------- Frame Outcome --------------------

/// What one frame produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Nothing survived validation and the confidence filter.
    NoQualifyingDetections,
    /// A candidate was selected but is too small to warn about.
    BelowProximityThreshold,
    /// A warning was classified but the gate held it back.
    Suppressed(Warning),
    /// A warning passed the gate and should be spoken.
    Emitted(Warning),
}

/// Per-frame detection accounting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub total: usize,
    pub malformed: usize,
    pub unknown_class: usize,
    pub low_confidence: usize,
    /// Detections that reached the selector.
    pub admitted: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    pub outcome: FrameOutcome,
    pub stats: FrameStats,
    pub candidate: Option<ScoredCandidate>,
}

impl FrameReport {
    pub fn emitted(&self) -> Option<&Warning> {
        match &self.outcome {
            FrameOutcome::Emitted(w) => Some(w),
            _ => None,
        }
    }
}

// -------------------- Pipeline --------------------

/// The per-frame chain: validate, select, classify, gate.
///
/// Owns the session's `GateState`. Runs only on the frame context, so it
/// needs no locking of its own.
pub struct AlertPipeline {
    thresholds: AlertThresholds,
    labels: Arc<dyn LabelResolver>,
    gate: WarningGate,
    clock: Arc<dyn Clock>,
}

impl AlertPipeline {
    pub fn new(
        thresholds: AlertThresholds,
        labels: Arc<dyn LabelResolver>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        thresholds.validate()?;
        let gate = WarningGate::new(thresholds.cooldown());
        Ok(Self {
            thresholds,
            labels,
            gate,
            clock,
        })
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    pub fn gate_state(&self) -> &GateState {
        self.gate.state()
    }

    /// Run one frame through the chain at the clock's current time.
    pub fn process(&mut self, batch: &DetectionBatch) -> FrameReport {
        let now_ms = self.clock.now_ms();
        self.process_at(batch, now_ms)
    }

    /// Run one frame through the chain at an explicit monotonic time.
    pub fn process_at(&mut self, batch: &DetectionBatch, now_ms: u64) -> FrameReport {
        let mut stats = FrameStats {
            total: batch.detections.len(),
            ..FrameStats::default()
        };

        let mut admitted: Vec<Detection> = Vec::with_capacity(batch.detections.len());
        for detection in &batch.detections {
            if let Err(e) = self.admit_detection(detection) {
                log::debug!("dropping detection {:?}: {}", detection, e);
                match e {
                    DetectionError::Malformed { .. } => stats.malformed += 1,
                    DetectionError::UnknownClassId(_) => stats.unknown_class += 1,
                }
                continue;
            }
            if detection.score <= self.thresholds.min_confidence {
                stats.low_confidence += 1;
                continue;
            }
            admitted.push(*detection);
        }
        stats.admitted = admitted.len();

        let Some(candidate) = select_closest(&admitted, batch.geometry, &self.thresholds) else {
            return FrameReport {
                outcome: FrameOutcome::NoQualifyingDetections,
                stats,
                candidate: None,
            };
        };

        let warning = self
            .labels
            .resolve(candidate.detection.class_id)
            .and_then(|label| classify(&candidate, label, &self.thresholds));

        let outcome = match warning {
            None => FrameOutcome::BelowProximityThreshold,
            Some(warning) if self.gate.admit(&warning, now_ms) => {
                log::info!(
                    "warning: {} ({:?}/{:?}, area={:.3})",
                    warning,
                    warning.severity(),
                    warning.direction(),
                    candidate.area_ratio
                );
                FrameOutcome::Emitted(warning)
            }
            Some(warning) => {
                log::debug!("warning suppressed by cooldown: {}", warning);
                FrameOutcome::Suppressed(warning)
            }
        };

        FrameReport {
            outcome,
            stats,
            candidate: Some(candidate),
        }
    }

    fn admit_detection(&self, detection: &Detection) -> Result<(), DetectionError> {
        detection.validate()?;
        if self.labels.resolve(detection.class_id).is_none() {
            return Err(DetectionError::UnknownClassId(detection.class_id));
        }
        Ok(())
    }
}

// -------------------- Session --------------------

/// Session-scoped alert state: the pipeline (gate) plus the speech queue.
///
/// Construct once at startup and feed every frame through `on_frame`.
/// Dropping the session discards anything still pending.
pub struct AlertSession {
    pipeline: AlertPipeline,
    queue: SpeechQueue,
}

impl AlertSession {
    pub fn new(pipeline: AlertPipeline, queue: SpeechQueue) -> Self {
        Self { pipeline, queue }
    }

    /// Process one frame and submit any emitted warning for speech.
    pub fn on_frame(&mut self, batch: &DetectionBatch) -> Result<FrameReport> {
        let report = self.pipeline.process(batch);
        if let Some(warning) = report.emitted() {
            let outcome = self.queue.submit(warning.clone())?;
            log::debug!("speech queue: {:?}", outcome);
        }
        Ok(report)
    }

    pub fn pipeline(&self) -> &AlertPipeline {
        &self.pipeline
    }

    pub fn queue(&self) -> &SpeechQueue {
        &self.queue
    }

    /// Stop speaking and drop pending warnings.
    pub fn shutdown(&self) -> Result<()> {
        self.queue.shutdown()
    }
}

// -------------------- Tests --------------------
