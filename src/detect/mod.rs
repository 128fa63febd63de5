mod backend;
mod backends;
mod registry;
mod result;
mod ssd;

pub use backend::DetectorBackend;
pub use backends::ScriptedBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::BackendRegistry;
pub use result::{Detection, DetectionBatch, DetectionError, FrameGeometry};
pub use ssd::{decode_ssd_outputs, SsdOutputs};
