use crate::classify::classify_regions;
use crate::classify::results::{ClassificationResult, DetectionMethod, Evidence};
use crate::detect::Detection;
use crate::region::RegionCollection;

pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.15;

/// Detection-overlap strategy.
///
/// Only vehicle classes with confidence strictly above `min_confidence` are
/// considered. A space is occupied iff some detection covers strictly more
/// than `overlap_threshold` of the region's area.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlapClassifier {
    min_confidence: f32,
    overlap_threshold: f32,
}

impl Default for OverlapClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE, DEFAULT_OVERLAP_THRESHOLD)
    }
}

impl OverlapClassifier {
    pub fn new(min_confidence: f32, overlap_threshold: f32) -> Self {
        Self {
            min_confidence,
            overlap_threshold,
        }
    }

    pub fn min_confidence(&self) -> f32 {
        self.min_confidence
    }

    pub fn overlap_threshold(&self) -> f32 {
        self.overlap_threshold
    }

    fn qualifies(&self, detection: &Detection) -> bool {
        detection.class.is_vehicle() && detection.confidence > self.min_confidence
    }

    /// Classify against one frame's detections.
    ///
    /// `frame_size` only bounds-checks regions; ratios use the full region area.
    pub fn classify(
        &self,
        detections: &[Detection],
        frame_size: (usize, usize),
        regions: &RegionCollection,
    ) -> ClassificationResult {
        let vehicles: Vec<&Detection> = detections.iter().filter(|d| self.qualifies(d)).collect();
        classify_regions(DetectionMethod::Detection, regions, frame_size, |region, _| {
            let best = vehicles
                .iter()
                .map(|d| region.overlap_ratio(&d.bbox))
                .fold(0.0f32, f32::max);
            Ok((best > self.overlap_threshold, Evidence::OverlapRatio(best)))
        })
    }

    /// Result when no detector is available: every region free.
    pub fn unavailable(&self, frame_size: (usize, usize), regions: &RegionCollection) -> ClassificationResult {
        self.classify(&[], frame_size, regions)
    }
}
