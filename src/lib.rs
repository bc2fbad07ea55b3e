//! Parking space occupancy detection.
//!
//! Operators mark rectangular parking spaces once on a reference frame; every
//! later frame is then classified space by space as free or occupied.
//!
//! # Pipeline
//!
//! ```text
//! frame ─▶ FramePreprocessor │ BackgroundModel ─▶ ActivityMask ─┐
//!       └▶ VehicleDetector ─▶ detections ─────────────────────────┤
//!                                        RegionCollection ────────┴▶ classifier ─▶ ClassificationResult
//! ```
//!
//! # Module Structure
//!
//! - `region`, `region_store`: space geometry and persistence
//! - `annotate`: pointer-driven region drawing
//! - `frame`, `imgproc`: pixel containers and image operations
//! - `preprocess`, `background`: activity mask sources
//! - `detect`: optional vehicle detector
//! - `classify`: density, contour and detection-overlap strategies
//! - `stats`: occupancy statistics log
//! - `ingest`: frame sources
//! - `config`: daemon configuration

use anyhow::Result;
use rand::RngCore;
use rusqlite::{Connection, OpenFlags};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod annotate;
pub mod background;
pub mod classify;
pub mod config;
pub mod detect;
pub mod frame;
pub mod imgproc;
pub mod ingest;
pub mod preprocess;
pub mod region;
pub mod region_store;
pub mod stats;

pub use annotate::{AnnotationSession, PointerEvent, SessionState};
pub use background::{BackgroundConfig, BackgroundModel};
pub use classify::{
    ClassificationResult, ContourClassifier, DensityClassifier, DetectionMethod, Evidence,
    MaskSource, OccupancyEngine, OccupancySummary, OverlapClassifier, OverlayItem, RegionOutcome,
    SpaceVerdict, Strategy,
};
pub use detect::{load_detector, Detection, ObjectClass, StubDetector, VehicleDetector};
pub use frame::{ActivityMask, Frame, GrayImage};
pub use ingest::{FileConfig, FileSource, FrameSource, Playback, PlaybackEvent};
pub use preprocess::{FramePreprocessor, TuningParams};
pub use region::{Point, Region, RegionCollection};
pub use region_store::{FileRegionStore, InMemoryRegionStore, RegionStore};
pub use stats::{InMemoryStatsLog, OccupancyRecord, SqliteStatsLog, StatsLog};

/// In-memory SQLite URI private to one caller, shared across its connections.
pub fn shared_memory_uri() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "file:parking_occupancy_{:x}?mode=memory&cache=shared",
        u64::from_le_bytes(bytes)
    )
}

pub(crate) fn open_db_connection(db_path: &str) -> Result<Connection> {
    if db_path.starts_with("file:") {
        return Ok(Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?);
    }
    Ok(Connection::open(db_path)?)
}

/// Seconds since the Unix epoch.
pub fn now_s() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}
