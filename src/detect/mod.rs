//! Vehicle detector seam for the detection-overlap strategy.
//!
//! The detector is optional. `load_detector` never fails: a missing model,
//! a load error or a build without an inference backend all yield `None`
//! with a warning, and the overlap strategy then reports every space free.

mod backend;
mod backends;
mod result;

use std::path::Path;

pub use backend::VehicleDetector;
pub use backends::StubDetector;
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use result::{non_max_suppression, Detection, ObjectClass};

/// Load the ONNX detector at `model_path`, if one is configured and loadable.
///
/// Candidates scoring below `min_confidence` are dropped inside the detector.
pub fn load_detector(
    model_path: Option<&Path>,
    min_confidence: f32,
) -> Option<Box<dyn VehicleDetector>> {
    let Some(path) = model_path else {
        log::warn!("no detection model configured; detection strategy will report zero occupied");
        return None;
    };
    load_onnx(path, min_confidence)
}

#[cfg(feature = "backend-tract")]
fn load_onnx(path: &Path, min_confidence: f32) -> Option<Box<dyn VehicleDetector>> {
    let mut detector = match TractDetector::new(path) {
        Ok(detector) => detector.with_threshold(min_confidence),
        Err(e) => {
            log::warn!(
                "detection model {} unavailable: {:#}; detection strategy disabled",
                path.display(),
                e
            );
            return None;
        }
    };
    if let Err(e) = detector.warm_up() {
        log::warn!(
            "detection model {} failed warm-up: {:#}; detection strategy disabled",
            path.display(),
            e
        );
        return None;
    }
    log::info!("detection model loaded from {}", path.display());
    Some(Box::new(detector))
}

#[cfg(not(feature = "backend-tract"))]
fn load_onnx(path: &Path, _min_confidence: f32) -> Option<Box<dyn VehicleDetector>> {
    log::warn!(
        "detection model {} ignored: built without the backend-tract feature",
        path.display()
    );
    None
}
