use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Object detector run once per frame over the whole image.
///
/// Implementations return every box they find; class and confidence
/// filtering is applied by the caller. Frames are read-only and must not be
/// retained past the call.
pub trait VehicleDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
