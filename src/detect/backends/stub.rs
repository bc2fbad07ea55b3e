use anyhow::Result;

use crate::detect::backend::VehicleDetector;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Stub backend for testing. Returns a scripted set of boxes for every frame.
#[derive(Clone, Debug, Default)]
pub struct StubDetector {
    detections: Vec<Detection>,
    frames_seen: u64,
}

impl StubDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            frames_seen: 0,
        }
    }

    /// Replace the boxes returned from the next frame on.
    pub fn set_detections(&mut self, detections: Vec<Detection>) {
        self.detections = detections;
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl VehicleDetector for StubDetector {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.frames_seen += 1;
        Ok(self.detections.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::ObjectClass;

    #[test]
    fn stub_replays_script() {
        let frame = Frame::filled(4, 4, [0, 0, 0]);
        let car = Detection::new([0.0, 0.0, 2.0, 2.0], 0.8, ObjectClass::Car);
        let mut backend = StubDetector::new(vec![car.clone()]);

        assert_eq!(backend.detect(&frame).unwrap(), vec![car]);
        backend.set_detections(Vec::new());
        assert!(backend.detect(&frame).unwrap().is_empty());
        assert_eq!(backend.frames_seen(), 2);
    }
}
