use parking_occupancy::classify::{ContourClassifier, DensityClassifier};
use parking_occupancy::ingest::synthetic::{bay_layout, bay_occupied, BAY_HEIGHT, BAY_WIDTH};
use parking_occupancy::{
    Detection, DetectionMethod, FileConfig, FileSource, InMemoryStatsLog, MaskSource, ObjectClass,
    OccupancyEngine, OccupancyRecord, RegionCollection, StatsLog, Strategy, StubDetector,
    TuningParams,
};

const WIDTH: usize = 320;
const HEIGHT: usize = 240;

fn source(frames: u64) -> FileSource {
    FileSource::new(FileConfig {
        stub_width: WIDTH,
        stub_height: HEIGHT,
        stub_frames: frames,
        ..FileConfig::new("stub://pipeline")
    })
    .expect("synthetic source")
}

fn bays() -> RegionCollection {
    bay_layout(WIDTH, HEIGHT)
}

fn expected(frame_index: u64) -> Vec<bool> {
    (0..bays().len())
        .map(|bay| bay_occupied(bay, frame_index))
        .collect()
}

fn verdicts(result: &parking_occupancy::ClassificationResult) -> Vec<bool> {
    result.verdicts().map(|v| v.occupied).collect()
}

#[test]
fn density_with_threshold_mask_tracks_parked_cars() {
    let mut engine = OccupancyEngine::new(
        Strategy::Density(DensityClassifier::default()),
        MaskSource::AdaptiveThreshold,
    )
    .unwrap();
    let mut source = source(120);
    let regions = bays();
    assert_eq!(regions.len(), 4);

    let mut index = 0u64;
    while let Some(frame) = source.next_frame().unwrap() {
        if index % 25 == 0 {
            let result = engine
                .process(&frame, &regions, TuningParams::default())
                .unwrap();
            assert_eq!(verdicts(&result), expected(index), "frame {}", index);
            assert_eq!(result.summary().total, 4);
        }
        index += 1;
    }
    assert_eq!(index, 120);
}

#[test]
fn contour_strategy_agrees_with_density() {
    let mut engine = OccupancyEngine::new(
        Strategy::Contour(ContourClassifier::default()),
        MaskSource::AdaptiveThreshold,
    )
    .unwrap();
    let mut source = source(60);
    let regions = bays();

    let frame = source.next_frame().unwrap().unwrap();
    let result = engine
        .process(&frame, &regions, TuningParams::default())
        .unwrap();
    assert_eq!(result.method, DetectionMethod::Contour);
    assert_eq!(verdicts(&result), expected(0));
}

#[test]
fn background_mask_reports_changes_since_learning() {
    let mut engine = OccupancyEngine::new(
        Strategy::Density(DensityClassifier::default()),
        MaskSource::BackgroundSubtraction,
    )
    .unwrap();
    let mut source = source(51);
    let regions = bays();

    let mut last = None;
    while let Some(frame) = source.next_frame().unwrap() {
        last = Some(
            engine
                .process(&frame, &regions, TuningParams::default())
                .unwrap(),
        );
    }
    let result = last.unwrap();
    // Frame 50: bay 2 was vacated and bay 3 filled; bays 0 and 1 are unchanged.
    assert_eq!(verdicts(&result), vec![false, false, true, true]);
}

#[test]
fn detection_overlap_with_scripted_detector() {
    let regions = bays();
    let mut detector = StubDetector::default();
    let mut source = source(200);
    let mut stats = InMemoryStatsLog::new();

    let mut engine =
        OccupancyEngine::new(Strategy::default_for(DetectionMethod::Detection), MaskSource::default())
            .unwrap();

    for index in 0..200u64 {
        let frame = source.next_frame().unwrap().unwrap();
        if index % 50 != 0 {
            continue;
        }
        let boxes = regions
            .iter()
            .enumerate()
            .filter(|(bay, _)| bay_occupied(*bay, index))
            .map(|(_, r)| {
                let (x, y) = (r.x as f32 + 6.0, r.y as f32 + 6.0);
                Detection::new(
                    [x, y, x + (BAY_WIDTH - 12) as f32, y + (BAY_HEIGHT - 12) as f32],
                    0.8,
                    ObjectClass::Car,
                )
            })
            .collect();
        detector.set_detections(boxes);
        engine.set_detector(Some(Box::new(detector.clone())));

        let result = engine
            .process(&frame, &regions, TuningParams::default())
            .unwrap();
        assert_eq!(verdicts(&result), expected(index), "frame {}", index);

        stats
            .record_status(&OccupancyRecord::from_result(&result, index, 1_700_000_000 + index))
            .unwrap();
        stats.record_space_history(&result, 1_700_000_000 + index).unwrap();
    }

    assert_eq!(stats.statuses.len(), 4);
    assert!(stats.statuses.iter().all(|r| r.detection_method == "detection"));
    assert_eq!(stats.statuses[0].occupied_spaces, 2);
    assert_eq!(stats.statuses[0].occupancy_rate, 0.5);
    assert_eq!(stats.history.len(), 16);
}

#[test]
fn detection_strategy_without_model_reports_all_free() {
    let mut engine =
        OccupancyEngine::new(Strategy::default_for(DetectionMethod::Detection), MaskSource::default())
            .unwrap()
            .with_detector(parking_occupancy::load_detector(None, 0.5));
    let frame = source(1).next_frame().unwrap().unwrap();
    let result = engine
        .process(&frame, &bays(), TuningParams::default())
        .unwrap();
    assert_eq!(result.occupied_count(), 0);
    assert_eq!(result.summary().free, 4);
}

#[test]
fn regions_outside_the_frame_are_skipped() {
    let mut regions = bays();
    regions.push(parking_occupancy::Region::new(WIDTH as i32 + 10, 0, 50, 50).unwrap());
    let mut engine = OccupancyEngine::new(
        Strategy::Density(DensityClassifier::default()),
        MaskSource::AdaptiveThreshold,
    )
    .unwrap();
    let frame = source(1).next_frame().unwrap().unwrap();
    let result = engine
        .process(&frame, &regions, TuningParams::default())
        .unwrap();
    assert_eq!(verdicts(&result), expected(0));
    assert_eq!(result.skipped().map(|(i, _)| i).collect::<Vec<_>>(), vec![4]);
    assert_eq!(result.summary().total, 5);
}
