//! Occupancy classifiers.
//!
//! Three interchangeable strategies share one contract: given a frame-derived
//! input and the region collection, produce one `RegionOutcome` per region.
//! A region that cannot be evaluated is skipped with a diagnostic; the rest
//! of the frame is still classified.

mod contour;
mod density;
mod engine;
mod overlap;
mod results;

use anyhow::Result;

use crate::region::{PixelRect, Region, RegionCollection};

pub use contour::{ContourClassifier, DEFAULT_CONTOUR_AREA_THRESHOLD};
pub use density::{DensityClassifier, DEFAULT_DENSITY_THRESHOLD};
pub use engine::{MaskSource, OccupancyEngine, Strategy};
pub use overlap::{OverlapClassifier, DEFAULT_MIN_CONFIDENCE, DEFAULT_OVERLAP_THRESHOLD};
pub use results::{
    ClassificationResult, DetectionMethod, Evidence, OccupancySummary, OverlayItem,
    RegionOutcome, SpaceVerdict,
};

/// Run `judge` over every region that has pixels inside a `frame_size` frame.
///
/// Each region yields its own outcome; a region outside the frame or a
/// failing judgement becomes `RegionOutcome::Skipped`.
pub(crate) fn classify_regions<F>(
    method: DetectionMethod,
    regions: &RegionCollection,
    frame_size: (usize, usize),
    mut judge: F,
) -> ClassificationResult
where
    F: FnMut(&Region, PixelRect) -> Result<(bool, Evidence)>,
{
    let (width, height) = frame_size;
    let outcomes = regions
        .iter()
        .enumerate()
        .map(|(index, region)| {
            let Some(rect) = region.clamp_to(width, height) else {
                log::warn!(
                    "{}: skipping space {} {}: outside {}x{} frame",
                    method,
                    index,
                    region,
                    width,
                    height
                );
                return RegionOutcome::Skipped {
                    index,
                    reason: format!("outside {}x{} frame", width, height),
                };
            };
            match judge(region, rect) {
                Ok((occupied, evidence)) => RegionOutcome::Classified(SpaceVerdict {
                    index,
                    region: *region,
                    occupied,
                    evidence,
                }),
                Err(e) => {
                    log::warn!("{}: skipping space {} {}: {:#}", method, index, region, e);
                    RegionOutcome::Skipped {
                        index,
                        reason: format!("{:#}", e),
                    }
                }
            }
        })
        .collect();
    ClassificationResult::new(method, outcomes)
}
