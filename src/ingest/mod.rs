//! Frame ingestion sources.
//!
//! - Synthetic source (dry runs, scripted detector replays, tests)
//!
//! Sources produce `Frame` instances that go straight to the detector and are
//! dropped once the frame's `DetectionBatch` exists. Sources never:
//! - Store frames to disk
//! - Log pixel content

pub mod synthetic;

pub use synthetic::{SourceStats, SyntheticConfig, SyntheticSource};
