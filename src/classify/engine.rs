use anyhow::Result;

use crate::background::{BackgroundConfig, BackgroundModel};
use crate::classify::results::{ClassificationResult, DetectionMethod};
use crate::classify::{ContourClassifier, DensityClassifier, OverlapClassifier};
use crate::detect::{Detection, VehicleDetector};
use crate::frame::{ActivityMask, Frame};
use crate::preprocess::{FramePreprocessor, TuningParams};
use crate::region::RegionCollection;

/// Where the activity mask for the mask-based strategies comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MaskSource {
    /// Static adaptive-threshold pipeline, driven by the tuning controls.
    #[default]
    AdaptiveThreshold,
    /// Temporal background model.
    BackgroundSubtraction,
}

impl MaskSource {
    pub fn as_str(self) -> &'static str {
        match self {
            MaskSource::AdaptiveThreshold => "threshold",
            MaskSource::BackgroundSubtraction => "background",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "threshold" | "adaptive" | "adaptive_threshold" => Some(MaskSource::AdaptiveThreshold),
            "background" | "bg" | "background_subtraction" => {
                Some(MaskSource::BackgroundSubtraction)
            }
            _ => None,
        }
    }
}

/// Configured classifier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Strategy {
    Density(DensityClassifier),
    Contour(ContourClassifier),
    Overlap(OverlapClassifier),
}

impl Strategy {
    pub fn method(&self) -> DetectionMethod {
        match self {
            Strategy::Density(_) => DetectionMethod::Density,
            Strategy::Contour(_) => DetectionMethod::Contour,
            Strategy::Overlap(_) => DetectionMethod::Detection,
        }
    }

    /// Strategy with its default thresholds.
    pub fn default_for(method: DetectionMethod) -> Self {
        match method {
            DetectionMethod::Density => Strategy::Density(DensityClassifier::default()),
            DetectionMethod::Contour => Strategy::Contour(ContourClassifier::default()),
            DetectionMethod::Detection => Strategy::Overlap(OverlapClassifier::default()),
        }
    }
}

/// Owns every stateful collaborator of the classification pass: the
/// preprocessor, the background model and the optional vehicle detector.
///
/// One engine serves one video stream, frame after frame.
pub struct OccupancyEngine {
    strategy: Strategy,
    mask_source: MaskSource,
    preprocessor: FramePreprocessor,
    background: Option<BackgroundModel>,
    detector: Option<Box<dyn VehicleDetector>>,
    warned_no_detector: bool,
}

impl OccupancyEngine {
    pub fn new(strategy: Strategy, mask_source: MaskSource) -> Result<Self> {
        Self::with_background(strategy, mask_source, BackgroundConfig::default())
    }

    pub fn with_background(
        strategy: Strategy,
        mask_source: MaskSource,
        background: BackgroundConfig,
    ) -> Result<Self> {
        let background = match mask_source {
            MaskSource::BackgroundSubtraction => Some(BackgroundModel::new(background)?),
            MaskSource::AdaptiveThreshold => None,
        };
        Ok(Self {
            strategy,
            mask_source,
            preprocessor: FramePreprocessor::new(),
            background,
            detector: None,
            warned_no_detector: false,
        })
    }

    /// Attach (or clear) the detector used by the overlap strategy.
    pub fn set_detector(&mut self, detector: Option<Box<dyn VehicleDetector>>) {
        self.detector = detector;
        self.warned_no_detector = false;
    }

    pub fn with_detector(mut self, detector: Option<Box<dyn VehicleDetector>>) -> Self {
        self.set_detector(detector);
        self
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn method(&self) -> DetectionMethod {
        self.strategy.method()
    }

    pub fn mask_source(&self) -> MaskSource {
        self.mask_source
    }

    pub fn detector_name(&self) -> Option<&'static str> {
        self.detector.as_ref().map(|d| d.name())
    }

    /// Forget temporal state, e.g. after the frame source rewinds.
    pub fn reset(&mut self) {
        if let Some(model) = self.background.as_mut() {
            model.reset();
        }
    }

    /// Activity mask for `frame` from the configured source.
    ///
    /// Feeds the background model, so call it once per frame.
    pub fn activity_mask(&mut self, frame: &Frame, params: TuningParams) -> Result<ActivityMask> {
        match self.background.as_mut() {
            Some(model) => Ok(model.apply(frame)),
            None => self.preprocessor.process(frame, params),
        }
    }

    /// Classify every region for one frame.
    pub fn process(
        &mut self,
        frame: &Frame,
        regions: &RegionCollection,
        params: TuningParams,
    ) -> Result<ClassificationResult> {
        let frame_size = (frame.width(), frame.height());
        match self.strategy {
            Strategy::Density(classifier) => {
                let mask = self.activity_mask(frame, params)?;
                Ok(classifier.classify(&mask, regions))
            }
            Strategy::Contour(classifier) => {
                let mask = self.activity_mask(frame, params)?;
                Ok(classifier.classify(&mask, regions))
            }
            Strategy::Overlap(classifier) => match self.detect(frame) {
                Some(detections) => Ok(classifier.classify(&detections, frame_size, regions)),
                None => Ok(classifier.unavailable(frame_size, regions)),
            },
        }
    }

    fn detect(&mut self, frame: &Frame) -> Option<Vec<Detection>> {
        let Some(detector) = self.detector.as_mut() else {
            if !self.warned_no_detector {
                log::warn!("no vehicle detector loaded; reporting every space free");
                self.warned_no_detector = true;
            }
            return None;
        };
        match detector.detect(frame) {
            Ok(detections) => {
                log::debug!("{}: {} detections", detector.name(), detections.len());
                Some(detections)
            }
            Err(e) => {
                log::warn!("{} detector failed on frame: {:#}", detector.name(), e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{ObjectClass, StubDetector};
    use crate::region::{PixelRect, Region};

    fn regions() -> RegionCollection {
        vec![
            Region::new(10, 10, 60, 60).unwrap(),
            Region::new(100, 10, 60, 60).unwrap(),
        ]
        .into()
    }

    #[test]
    fn overlap_without_detector_reports_zero_occupied() {
        let mut engine =
            OccupancyEngine::new(Strategy::default_for(DetectionMethod::Detection), MaskSource::default())
                .unwrap();
        let frame = Frame::filled(200, 100, [90, 90, 90]);
        let result = engine.process(&frame, &regions(), TuningParams::default()).unwrap();
        assert_eq!(result.method, DetectionMethod::Detection);
        assert_eq!(result.occupied_count(), 0);
        assert_eq!(result.free_count(), 2);
    }

    #[test]
    fn overlap_uses_attached_detector() {
        let car = Detection::new([100.0, 10.0, 160.0, 70.0], 0.9, ObjectClass::Car);
        let mut engine =
            OccupancyEngine::new(Strategy::default_for(DetectionMethod::Detection), MaskSource::default())
                .unwrap()
                .with_detector(Some(Box::new(StubDetector::new(vec![car]))));
        assert_eq!(engine.detector_name(), Some("stub"));

        let frame = Frame::filled(200, 100, [90, 90, 90]);
        let result = engine.process(&frame, &regions(), TuningParams::default()).unwrap();
        assert!(!result.verdict(0).unwrap().occupied);
        assert!(result.verdict(1).unwrap().occupied);
    }

    #[test]
    fn density_on_flat_frame_is_all_free() {
        let mut engine =
            OccupancyEngine::new(Strategy::default_for(DetectionMethod::Density), MaskSource::default())
                .unwrap();
        let frame = Frame::filled(200, 100, [128, 128, 128]);
        let result = engine.process(&frame, &regions(), TuningParams::default()).unwrap();
        assert_eq!(result.free_count(), 2);
    }

    #[test]
    fn tuning_applies_per_call() {
        let mut engine =
            OccupancyEngine::new(Strategy::default_for(DetectionMethod::Density), MaskSource::default())
                .unwrap();
        let frame = Frame::filled(200, 100, [128, 128, 128]);

        // A zero offset marks every pixel of a flat frame as foreground.
        let eager = engine.process(&frame, &regions(), TuningParams::new(25, 0, 5)).unwrap();
        assert_eq!(eager.occupied_count(), 2);

        let result = engine.process(&frame, &regions(), TuningParams::new(25, 16, 5)).unwrap();
        assert_eq!(result.occupied_count(), 0);
    }

    #[test]
    fn background_source_flags_new_object() {
        let mut engine = OccupancyEngine::new(
            Strategy::default_for(DetectionMethod::Density),
            MaskSource::BackgroundSubtraction,
        )
        .unwrap();
        let empty = Frame::filled(200, 100, [100, 100, 100]);
        for _ in 0..20 {
            engine.process(&empty, &regions(), TuningParams::default()).unwrap();
        }
        let mut parked = empty.clone();
        parked.fill_rect(
            PixelRect {
                x: 100,
                y: 10,
                width: 60,
                height: 60,
            },
            [200, 30, 30],
        );
        let result = engine.process(&parked, &regions(), TuningParams::default()).unwrap();
        assert!(!result.verdict(0).unwrap().occupied);
        assert!(result.verdict(1).unwrap().occupied);
    }

    #[test]
    fn mask_source_names_parse() {
        assert_eq!(MaskSource::parse("threshold"), Some(MaskSource::AdaptiveThreshold));
        assert_eq!(MaskSource::parse("Background"), Some(MaskSource::BackgroundSubtraction));
        assert_eq!(MaskSource::parse("optical-flow"), None);
    }
}
