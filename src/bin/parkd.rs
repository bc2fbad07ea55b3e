//! parkd - parking occupancy detection loop
//!
//! This daemon:
//! 1. Loads the marked parking spaces
//! 2. Reads frames from a local video (looping at end of stream)
//! 3. Classifies every space per frame with the configured strategy
//! 4. Periodically writes occupancy statistics to SQLite

use anyhow::Result;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_occupancy::config::ParkdConfig;
use parking_occupancy::{
    load_detector, now_s, ClassificationResult, DetectionMethod, FileRegionStore, FileSource,
    OccupancyEngine, OccupancyRecord, Playback, PlaybackEvent, RegionStore, SqliteStatsLog,
    StatsLog, TuningParams,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Stop after this many frames (0 runs until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    frames: u64,
    /// Video path, overriding configuration.
    #[arg(long)]
    video: Option<String>,
    // Tuning flags are read once at startup and applied unchanged to every frame.
    /// Adaptive threshold neighbourhood (0-50, even values are bumped).
    #[arg(long)]
    block_size: Option<u32>,
    /// Constant subtracted from the local mean (0-50).
    #[arg(long)]
    constant_offset: Option<u32>,
    /// Median filter size (0-50, even values are bumped).
    #[arg(long)]
    median_kernel: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = ParkdConfig::load()?;
    if let Some(video) = args.video {
        cfg.video.path = video;
    }
    let tuning = TuningParams::new(
        args.block_size.unwrap_or(cfg.tuning.block_size),
        args.constant_offset.unwrap_or(cfg.tuning.constant_offset),
        args.median_kernel.unwrap_or(cfg.tuning.median_kernel),
    )
    .clamped();

    let regions = FileRegionStore::new(&cfg.regions_path).load();
    if regions.is_empty() {
        log::warn!(
            "no parking spaces in {}; run mark_spaces first",
            cfg.regions_path.display()
        );
    }

    let source = FileSource::new(cfg.file_config())?;
    let mut playback = Playback::new(source, cfg.video.loop_playback);

    let mut engine = OccupancyEngine::new(cfg.strategy(), cfg.detection.mask_source)?;
    if engine.method() == DetectionMethod::Detection {
        engine.set_detector(load_detector(
            cfg.detection.model_path.as_deref(),
            cfg.detection.min_confidence,
        ));
    }

    let mut stats = if cfg.stats.enabled {
        match SqliteStatsLog::open(&cfg.db_path) {
            Ok(mut store) => {
                if let Err(e) = store.save_spaces(&regions) {
                    log::warn!("failed to store space layout: {:#}", e);
                }
                Some(store)
            }
            Err(e) => {
                log::warn!("statistics disabled: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .map_err(|e| anyhow::anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!(
        "parkd running: {} spaces, method={}, mask={}, video={}",
        regions.len(),
        engine.method(),
        engine.mask_source().as_str(),
        cfg.video.path
    );
    log::info!(
        "tuning block_size={} constant_offset={} median_kernel={}",
        tuning.block_size,
        tuning.constant_offset,
        tuning.median_kernel
    );

    let frame_interval = if cfg.video.target_fps == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(1000 / cfg.video.target_fps as u64)
    };
    let mut frame_number = 0u64;
    let mut last: Option<ClassificationResult> = None;

    while !shutdown.load(Ordering::SeqCst) {
        if args.frames > 0 && frame_number >= args.frames {
            break;
        }
        let started = Instant::now();

        let frame = match playback.advance()? {
            PlaybackEvent::Frame(frame) => frame,
            PlaybackEvent::Restarted(frame) => {
                engine.reset();
                frame
            }
            PlaybackEvent::Skipped => continue,
            PlaybackEvent::Finished => {
                log::info!("end of video after {} frames", frame_number);
                break;
            }
        };
        frame_number += 1;

        let result = match engine.process(&frame, &regions, tuning) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("frame {} skipped: {:#}", frame_number, e);
                continue;
            }
        };
        log::debug!("frame {}: {}", frame_number, result.summary());
        for item in result.overlay() {
            log::trace!(
                "space {} {} occupied={} score={:.2}",
                item.index,
                item.region,
                item.occupied,
                item.score
            );
        }

        if frame_number % cfg.stats.log_every == 0 {
            log::info!("frame {}: {}", frame_number, result.summary());
            if let Some(store) = stats.as_mut() {
                record(store, &result, frame_number);
            }
        }
        last = Some(result);

        if let Some(rest) = frame_interval.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    let source_stats = playback.source().stats();
    log::info!(
        "parkd stopping after {} frames ({} read from {}, {} skipped)",
        frame_number,
        source_stats.frames_captured,
        source_stats.path,
        playback.skipped()
    );
    if let Some(result) = last.as_ref() {
        log::info!("final occupancy: {}", result.summary());
    }
    if let Some(store) = stats.as_mut() {
        if let Some(result) = last.as_ref() {
            record(store, result, frame_number);
        }
        match now_s() {
            Ok(now) => {
                if let Err(e) = store.cleanup(now) {
                    log::warn!("statistics cleanup failed: {:#}", e);
                }
            }
            Err(e) => log::warn!("statistics cleanup skipped: {:#}", e),
        }
    }
    Ok(())
}

/// Write one status record and the per-space history; failures are logged only.
fn record(store: &mut SqliteStatsLog, result: &ClassificationResult, frame_number: u64) {
    let timestamp = match now_s() {
        Ok(ts) => ts,
        Err(e) => {
            log::warn!("statistics record skipped: {:#}", e);
            return;
        }
    };
    let record = OccupancyRecord::from_result(result, frame_number, timestamp);
    if let Err(e) = store.record_status(&record) {
        log::warn!("failed to log occupancy status: {:#}", e);
    }
    if let Err(e) = store.record_space_history(result, timestamp) {
        log::warn!("failed to log space history: {:#}", e);
    }
}
