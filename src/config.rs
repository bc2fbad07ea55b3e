use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classify::{
    ContourClassifier, DensityClassifier, DetectionMethod, MaskSource, OverlapClassifier, Strategy,
    DEFAULT_CONTOUR_AREA_THRESHOLD, DEFAULT_DENSITY_THRESHOLD, DEFAULT_MIN_CONFIDENCE,
    DEFAULT_OVERLAP_THRESHOLD,
};
use crate::ingest::FileConfig;
use crate::preprocess::{TuningParams, TUNING_MAX};

const DEFAULT_DB_PATH: &str = "database/parking_data.db";
const DEFAULT_VIDEO_PATH: &str = "car_parking.mp4";
const DEFAULT_REGIONS_PATH: &str = "CarParkPos.json";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_STUB_WIDTH: usize = 640;
const DEFAULT_STUB_HEIGHT: usize = 480;
const DEFAULT_STUB_FRAMES: u64 = 300;
const DEFAULT_LOG_EVERY: u64 = 30;

#[derive(Debug, Deserialize, Default)]
struct ParkdConfigFile {
    db_path: Option<String>,
    video: Option<VideoConfigFile>,
    regions: Option<RegionsConfigFile>,
    detection: Option<DetectionConfigFile>,
    tuning: Option<TuningConfigFile>,
    stats: Option<StatsConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    path: Option<String>,
    target_fps: Option<u32>,
    loop_playback: Option<bool>,
    stub_width: Option<usize>,
    stub_height: Option<usize>,
    stub_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RegionsConfigFile {
    path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    method: Option<String>,
    mask_source: Option<String>,
    density_threshold: Option<u64>,
    contour_area_threshold: Option<f64>,
    overlap_threshold: Option<f32>,
    min_confidence: Option<f32>,
    model_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct TuningConfigFile {
    block_size: Option<u32>,
    constant_offset: Option<u32>,
    median_kernel: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct StatsConfigFile {
    enabled: Option<bool>,
    log_every: Option<u64>,
}

/// Settings for the `parkd` detection loop.
#[derive(Debug, Clone)]
pub struct ParkdConfig {
    pub db_path: String,
    pub video: VideoSettings,
    pub regions_path: PathBuf,
    pub detection: DetectionSettings,
    pub tuning: TuningParams,
    pub stats: StatsSettings,
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub path: String,
    pub target_fps: u32,
    pub loop_playback: bool,
    pub stub_width: usize,
    pub stub_height: usize,
    pub stub_frames: u64,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub method: DetectionMethod,
    pub mask_source: MaskSource,
    pub density_threshold: u64,
    pub contour_area_threshold: f64,
    pub overlap_threshold: f32,
    pub min_confidence: f32,
    pub model_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StatsSettings {
    pub enabled: bool,
    /// Frames between status records.
    pub log_every: u64,
}

impl ParkdConfig {
    /// Load from the JSON file named by `PARKING_CONFIG` (if set), fill in
    /// defaults, then apply `PARKING_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PARKING_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ParkdConfigFile) -> Result<Self> {
        let db_path = file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let video = file.video.unwrap_or_default();
        let video = VideoSettings {
            path: video
                .path
                .unwrap_or_else(|| DEFAULT_VIDEO_PATH.to_string()),
            target_fps: video.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
            loop_playback: video.loop_playback.unwrap_or(true),
            stub_width: video.stub_width.unwrap_or(DEFAULT_STUB_WIDTH),
            stub_height: video.stub_height.unwrap_or(DEFAULT_STUB_HEIGHT),
            stub_frames: video.stub_frames.unwrap_or(DEFAULT_STUB_FRAMES),
        };
        let regions_path = file
            .regions
            .and_then(|regions| regions.path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REGIONS_PATH));

        let detection = file.detection.unwrap_or_default();
        let method = match detection.method.as_deref() {
            Some(name) => parse_method(name)?,
            None => DetectionMethod::Density,
        };
        let mask_source = match detection.mask_source.as_deref() {
            Some(name) => parse_mask_source(name)?,
            None => MaskSource::default(),
        };
        let detection = DetectionSettings {
            method,
            mask_source,
            density_threshold: detection
                .density_threshold
                .unwrap_or(DEFAULT_DENSITY_THRESHOLD),
            contour_area_threshold: detection
                .contour_area_threshold
                .unwrap_or(DEFAULT_CONTOUR_AREA_THRESHOLD),
            overlap_threshold: detection
                .overlap_threshold
                .unwrap_or(DEFAULT_OVERLAP_THRESHOLD),
            min_confidence: detection.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            model_path: detection.model_path,
        };

        let defaults = TuningParams::default();
        let tuning = file.tuning.unwrap_or_default();
        let tuning = TuningParams::new(
            tuning.block_size.unwrap_or(defaults.block_size),
            tuning.constant_offset.unwrap_or(defaults.constant_offset),
            tuning.median_kernel.unwrap_or(defaults.median_kernel),
        );

        let stats = file.stats.unwrap_or_default();
        let stats = StatsSettings {
            enabled: stats.enabled.unwrap_or(true),
            log_every: stats.log_every.unwrap_or(DEFAULT_LOG_EVERY),
        };

        Ok(Self {
            db_path,
            video,
            regions_path,
            detection,
            tuning,
            stats,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("PARKING_VIDEO_PATH") {
            if !path.trim().is_empty() {
                self.video.path = path;
            }
        }
        if let Ok(path) = std::env::var("PARKING_REGIONS_PATH") {
            if !path.trim().is_empty() {
                self.regions_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("PARKING_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(method) = std::env::var("PARKING_METHOD") {
            if !method.trim().is_empty() {
                self.detection.method = parse_method(&method)?;
            }
        }
        if let Ok(source) = std::env::var("PARKING_MASK_SOURCE") {
            if !source.trim().is_empty() {
                self.detection.mask_source = parse_mask_source(&source)?;
            }
        }
        if let Ok(path) = std::env::var("PARKING_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detection.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(every) = std::env::var("PARKING_LOG_EVERY") {
            self.stats.log_every = every
                .trim()
                .parse()
                .map_err(|_| anyhow!("PARKING_LOG_EVERY must be an integer number of frames"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.video.path.trim().is_empty() {
            return Err(anyhow!("video path must not be empty"));
        }
        if self.detection.density_threshold == 0 {
            return Err(anyhow!("density threshold must be greater than zero"));
        }
        if !(self.detection.contour_area_threshold > 0.0) {
            return Err(anyhow!("contour area threshold must be greater than zero"));
        }
        let ratio = self.detection.overlap_threshold;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(anyhow!("overlap threshold must be in (0, 1], got {}", ratio));
        }
        let confidence = self.detection.min_confidence;
        if !(0.0..1.0).contains(&confidence) {
            return Err(anyhow!("min confidence must be in [0, 1), got {}", confidence));
        }
        let t = self.tuning;
        for (name, value) in [
            ("block_size", t.block_size),
            ("constant_offset", t.constant_offset),
            ("median_kernel", t.median_kernel),
        ] {
            if value > TUNING_MAX {
                return Err(anyhow!(
                    "tuning {} must be in [0, {}], got {}",
                    name,
                    TUNING_MAX,
                    value
                ));
            }
        }
        if self.stats.log_every == 0 {
            return Err(anyhow!("stats log interval must be greater than zero"));
        }
        if self.video.stub_width == 0 || self.video.stub_height == 0 {
            return Err(anyhow!("stub frame size must be non-zero"));
        }
        Ok(())
    }

    /// Classifier configured by the detection section.
    pub fn strategy(&self) -> Strategy {
        let d = &self.detection;
        match d.method {
            DetectionMethod::Density => {
                Strategy::Density(DensityClassifier::new(d.density_threshold))
            }
            DetectionMethod::Contour => {
                Strategy::Contour(ContourClassifier::new(d.contour_area_threshold))
            }
            DetectionMethod::Detection => Strategy::Overlap(OverlapClassifier::new(
                d.min_confidence,
                d.overlap_threshold,
            )),
        }
    }

    pub fn file_config(&self) -> FileConfig {
        FileConfig {
            path: self.video.path.clone(),
            stub_width: self.video.stub_width,
            stub_height: self.video.stub_height,
            stub_frames: self.video.stub_frames,
        }
    }
}

fn parse_method(name: &str) -> Result<DetectionMethod> {
    DetectionMethod::parse(name).ok_or_else(|| {
        anyhow!(
            "unknown detection method '{}' (expected density, contour or detection)",
            name
        )
    })
}

fn parse_mask_source(name: &str) -> Result<MaskSource> {
    MaskSource::parse(name).ok_or_else(|| {
        anyhow!(
            "unknown mask source '{}' (expected threshold or background)",
            name
        )
    })
}

fn read_config_file(path: &Path) -> Result<ParkdConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
