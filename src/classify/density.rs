use crate::classify::results::{ClassificationResult, DetectionMethod, Evidence};
use crate::classify::classify_regions;
use crate::frame::ActivityMask;
use crate::region::RegionCollection;

/// Foreground pixel count at or above which a space is occupied.
pub const DEFAULT_DENSITY_THRESHOLD: u64 = 500;

/// Pixel-density strategy: free iff the foreground count in the region is
/// strictly below the threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DensityClassifier {
    threshold: u64,
}

impl Default for DensityClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_DENSITY_THRESHOLD)
    }
}

impl DensityClassifier {
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn classify(&self, mask: &ActivityMask, regions: &RegionCollection) -> ClassificationResult {
        classify_regions(
            DetectionMethod::Density,
            regions,
            (mask.width(), mask.height()),
            |_, rect| {
                let count = mask.count_in(rect) as u64;
                Ok((count >= self.threshold, Evidence::PixelCount(count)))
            },
        )
    }
}
