use anyhow::Result;

use crate::detect::result::DetectionBatch;
use crate::frame::Frame;

/// Detector backend trait.
///
/// A backend turns one frame into the raw detections for that frame. The
/// alert pipeline never calls back into a backend; it only consumes the
/// returned `DetectionBatch`.
///
/// Implementations must treat the frame as read-only and must not hold on
/// to pixel data past the `detect` call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// The returned batch carries the frame's geometry so detections can be
    /// scaled to pixel space downstream.
    fn detect(&mut self, frame: &Frame) -> Result<DetectionBatch>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
