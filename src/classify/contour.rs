use crate::classify::classify_regions;
use crate::classify::results::{ClassificationResult, DetectionMethod, Evidence};
use crate::frame::ActivityMask;
use crate::imgproc;
use crate::region::RegionCollection;

/// Contour area above which a space is occupied.
pub const DEFAULT_CONTOUR_AREA_THRESHOLD: f64 = 1500.0;

/// Contour strategy: occupied iff any external contour in the region's crop
/// encloses more than the area threshold.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContourClassifier {
    min_area: f64,
}

impl Default for ContourClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CONTOUR_AREA_THRESHOLD)
    }
}

impl ContourClassifier {
    pub fn new(min_area: f64) -> Self {
        Self { min_area }
    }

    pub fn min_area(&self) -> f64 {
        self.min_area
    }

    pub fn classify(&self, mask: &ActivityMask, regions: &RegionCollection) -> ClassificationResult {
        classify_regions(
            DetectionMethod::Contour,
            regions,
            (mask.width(), mask.height()),
            |_, rect| {
                let crop = mask.crop(rect);
                let hit = imgproc::external_contours(&crop)
                    .iter()
                    .any(|contour| contour.area() > self.min_area);
                Ok((hit, Evidence::ContourHit(hit)))
            },
        )
    }
}
