use serde::Serialize;

use crate::region::Region;

/// Which classifier produced a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Density,
    Contour,
    Detection,
}

impl DetectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionMethod::Density => "density",
            DetectionMethod::Contour => "contour",
            DetectionMethod::Detection => "detection",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "density" => Some(DetectionMethod::Density),
            "contour" | "contours" => Some(DetectionMethod::Contour),
            "detection" | "overlap" | "iou" => Some(DetectionMethod::Detection),
            _ => None,
        }
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal behind a verdict, shown next to the space by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Evidence {
    /// Foreground pixels inside the region.
    PixelCount(u64),
    /// Whether a contour above the area threshold was found.
    ContourHit(bool),
    /// Best overlap ratio against any qualifying detection.
    OverlapRatio(f32),
}

impl Evidence {
    /// Numeric form of the evidence.
    pub fn value(&self) -> f64 {
        match *self {
            Evidence::PixelCount(count) => count as f64,
            Evidence::ContourHit(hit) => {
                if hit {
                    1.0
                } else {
                    0.0
                }
            }
            Evidence::OverlapRatio(ratio) => ratio as f64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SpaceVerdict {
    pub index: usize,
    pub region: Region,
    pub occupied: bool,
    pub evidence: Evidence,
}

/// Per-region result. A skipped region carries the diagnostic instead of a
/// verdict and counts as neither free nor occupied.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegionOutcome {
    Classified(SpaceVerdict),
    Skipped { index: usize, reason: String },
}

impl RegionOutcome {
    pub fn index(&self) -> usize {
        match self {
            RegionOutcome::Classified(verdict) => verdict.index,
            RegionOutcome::Skipped { index, .. } => *index,
        }
    }

    pub fn verdict(&self) -> Option<&SpaceVerdict> {
        match self {
            RegionOutcome::Classified(verdict) => Some(verdict),
            RegionOutcome::Skipped { .. } => None,
        }
    }
}

/// One overlay entry for the rendering collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OverlayItem {
    pub index: usize,
    pub region: Region,
    pub occupied: bool,
    pub score: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OccupancySummary {
    pub free: usize,
    pub total: usize,
}

impl std::fmt::Display for OccupancySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Free: {}/{}", self.free, self.total)
    }
}

/// Whole-frame classification, one outcome per region in index order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub method: DetectionMethod,
    pub outcomes: Vec<RegionOutcome>,
}

impl ClassificationResult {
    pub fn new(method: DetectionMethod, outcomes: Vec<RegionOutcome>) -> Self {
        Self { method, outcomes }
    }

    pub fn verdicts(&self) -> impl Iterator<Item = &SpaceVerdict> {
        self.outcomes.iter().filter_map(RegionOutcome::verdict)
    }

    pub fn verdict(&self, index: usize) -> Option<&SpaceVerdict> {
        self.verdicts().find(|v| v.index == index)
    }

    pub fn skipped(&self) -> impl Iterator<Item = (usize, &str)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            RegionOutcome::Skipped { index, reason } => Some((*index, reason.as_str())),
            RegionOutcome::Classified(_) => None,
        })
    }

    pub fn occupied_count(&self) -> usize {
        self.verdicts().filter(|v| v.occupied).count()
    }

    pub fn free_count(&self) -> usize {
        self.verdicts().filter(|v| !v.occupied).count()
    }

    /// Number of regions considered, skipped ones included.
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn overlay(&self) -> Vec<OverlayItem> {
        self.verdicts()
            .map(|v| OverlayItem {
                index: v.index,
                region: v.region,
                occupied: v.occupied,
                score: v.evidence.value(),
            })
            .collect()
    }

    pub fn summary(&self) -> OccupancySummary {
        OccupancySummary {
            free: self.free_count(),
            total: self.total(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(index: usize, occupied: bool) -> RegionOutcome {
        RegionOutcome::Classified(SpaceVerdict {
            index,
            region: Region::legacy(index as i32 * 60, 0),
            occupied,
            evidence: Evidence::PixelCount(if occupied { 900 } else { 10 }),
        })
    }

    #[test]
    fn counts_ignore_skipped_regions() {
        let result = ClassificationResult::new(
            DetectionMethod::Density,
            vec![
                verdict(0, true),
                RegionOutcome::Skipped {
                    index: 1,
                    reason: "outside frame".into(),
                },
                verdict(2, false),
            ],
        );
        assert_eq!(result.occupied_count(), 1);
        assert_eq!(result.free_count(), 1);
        assert_eq!(result.total(), 3);
        assert_eq!(result.summary(), OccupancySummary { free: 1, total: 3 });
        assert_eq!(result.skipped().collect::<Vec<_>>(), vec![(1, "outside frame")]);

        let overlay = result.overlay();
        assert_eq!(overlay.len(), 2);
        assert_eq!(overlay[0].score, 900.0);
        assert_eq!(overlay[1].index, 2);
    }

    #[test]
    fn method_names_parse() {
        for method in [
            DetectionMethod::Density,
            DetectionMethod::Contour,
            DetectionMethod::Detection,
        ] {
            assert_eq!(DetectionMethod::parse(method.as_str()), Some(method));
        }
        assert_eq!(DetectionMethod::parse("IoU"), Some(DetectionMethod::Detection));
        assert_eq!(DetectionMethod::parse("guess"), None);
    }
}
