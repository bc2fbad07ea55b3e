//! Occupancy statistics log.
//!
//! Fire-and-forget from the caller's side: the detection loop logs failures
//! and keeps classifying.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::classify::ClassificationResult;
use crate::open_db_connection;
use crate::region::{Region, RegionCollection};

/// Status rows kept by `cleanup`.
pub const STATUS_ROWS_KEPT: i64 = 1000;
/// Age after which per-space history is dropped by `cleanup`.
pub const HISTORY_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Lot-wide snapshot for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OccupancyRecord {
    pub total_spaces: u32,
    pub occupied_spaces: u32,
    pub free_spaces: u32,
    pub occupancy_rate: f64,
    pub detection_method: String,
    pub frame_number: u64,
    pub timestamp: u64,
}

impl OccupancyRecord {
    /// Totals count every region, skipped ones included; those are neither
    /// free nor occupied.
    pub fn from_result(result: &ClassificationResult, frame_number: u64, timestamp: u64) -> Self {
        let total = result.total() as u32;
        let occupied = result.occupied_count() as u32;
        let occupancy_rate = if total > 0 {
            occupied as f64 / total as f64
        } else {
            0.0
        };
        Self {
            total_spaces: total,
            occupied_spaces: occupied,
            free_spaces: result.free_count() as u32,
            occupancy_rate,
            detection_method: result.method.as_str().to_string(),
            frame_number,
            timestamp,
        }
    }
}

/// Per-space row of `space_status_history`.
#[derive(Clone, Debug, PartialEq)]
pub struct SpaceHistoryEntry {
    pub space_id: usize,
    pub occupied: bool,
    pub timestamp: u64,
    pub confidence: f64,
    pub detection_method: String,
}

fn history_entries(result: &ClassificationResult, timestamp: u64) -> Vec<SpaceHistoryEntry> {
    result
        .verdicts()
        .map(|v| SpaceHistoryEntry {
            space_id: v.index,
            occupied: v.occupied,
            timestamp,
            confidence: v.evidence.value(),
            detection_method: result.method.as_str().to_string(),
        })
        .collect()
}

pub trait StatsLog {
    fn record_status(&mut self, record: &OccupancyRecord) -> Result<()>;

    /// One history row per classified space.
    fn record_space_history(&mut self, result: &ClassificationResult, timestamp: u64) -> Result<()>;

    /// Replace the stored space layout.
    fn save_spaces(&mut self, regions: &RegionCollection) -> Result<()>;

    /// Drop all but the newest status rows and history older than the
    /// retention window, relative to `now`.
    fn cleanup(&mut self, now: u64) -> Result<()>;
}

// ----------------------------------------------------------------------------
// SQLite
// ----------------------------------------------------------------------------

pub struct SqliteStatsLog {
    conn: Connection,
}

impl SqliteStatsLog {
    /// Open (creating if needed) the statistics database.
    ///
    /// Accepts a filesystem path or a `file:` URI.
    pub fn open(db_path: &str) -> Result<Self> {
        if !db_path.starts_with("file:") {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("failed to create database directory {}", parent.display())
                    })?;
                }
            }
        }
        let conn = open_db_connection(db_path)
            .with_context(|| format!("failed to open statistics database {}", db_path))?;
        let mut store = Self { conn };
        store.ensure_schema()?;
        log::info!("statistics database ready at {}", db_path);
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS parking_spaces (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              space_id INTEGER NOT NULL,
              x INTEGER NOT NULL,
              y INTEGER NOT NULL,
              width INTEGER NOT NULL,
              height INTEGER NOT NULL,
              created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS parking_status_log (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              timestamp INTEGER NOT NULL,
              total_spaces INTEGER NOT NULL,
              occupied_spaces INTEGER NOT NULL,
              free_spaces INTEGER NOT NULL,
              occupancy_rate REAL NOT NULL,
              detection_method TEXT NOT NULL,
              frame_number INTEGER
            );

            CREATE TABLE IF NOT EXISTS space_status_history (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              space_id INTEGER NOT NULL,
              is_occupied INTEGER NOT NULL,
              timestamp INTEGER NOT NULL,
              confidence REAL,
              detection_method TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_parking_status_timestamp ON parking_status_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_space_status_space_id ON space_status_history(space_id);
            CREATE INDEX IF NOT EXISTS idx_space_status_timestamp ON space_status_history(timestamp);
            "#,
        )?;
        Ok(())
    }

    pub fn status_count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM parking_status_log", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    pub fn history_count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM space_status_history", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Stored layout, ordered by space id.
    pub fn spaces(&self) -> Result<Vec<Region>> {
        let mut stmt = self
            .conn
            .prepare("SELECT x, y, width, height FROM parking_spaces ORDER BY space_id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (x, y, w, h) = row?;
            out.push(Region::new(x as i32, y as i32, w as u32, h as u32)?);
        }
        Ok(out)
    }

    /// Most recent status record, if any.
    pub fn latest_status(&self) -> Result<Option<OccupancyRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT total_spaces, occupied_spaces, free_spaces, occupancy_rate,
                   detection_method, frame_number, timestamp
            FROM parking_status_log ORDER BY id DESC LIMIT 1
            "#,
        )?;
        let mut rows = stmt.query([])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(OccupancyRecord {
            total_spaces: row.get::<_, i64>(0)? as u32,
            occupied_spaces: row.get::<_, i64>(1)? as u32,
            free_spaces: row.get::<_, i64>(2)? as u32,
            occupancy_rate: row.get(3)?,
            detection_method: row.get(4)?,
            frame_number: row.get::<_, Option<i64>>(5)?.unwrap_or(0) as u64,
            timestamp: row.get::<_, i64>(6)? as u64,
        }))
    }
}

impl StatsLog for SqliteStatsLog {
    fn record_status(&mut self, record: &OccupancyRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO parking_status_log
              (timestamp, total_spaces, occupied_spaces, free_spaces, occupancy_rate, detection_method, frame_number)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.timestamp as i64,
                record.total_spaces,
                record.occupied_spaces,
                record.free_spaces,
                record.occupancy_rate,
                record.detection_method,
                record.frame_number as i64
            ],
        )?;
        Ok(())
    }

    fn record_space_history(&mut self, result: &ClassificationResult, timestamp: u64) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO space_status_history
                  (space_id, is_occupied, timestamp, confidence, detection_method)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for entry in history_entries(result, timestamp) {
                stmt.execute(params![
                    entry.space_id as i64,
                    entry.occupied,
                    entry.timestamp as i64,
                    entry.confidence,
                    entry.detection_method
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn save_spaces(&mut self, regions: &RegionCollection) -> Result<()> {
        let created_at = crate::now_s()? as i64;
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM parking_spaces", [])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO parking_spaces (space_id, x, y, width, height, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for (index, region) in regions.iter().enumerate() {
                stmt.execute(params![
                    index as i64,
                    region.x,
                    region.y,
                    region.width,
                    region.height,
                    created_at
                ])?;
            }
        }
        tx.commit()?;
        log::info!("saved {} spaces to statistics database", regions.len());
        Ok(())
    }

    fn cleanup(&mut self, now: u64) -> Result<()> {
        let cutoff = now.saturating_sub(HISTORY_RETENTION.as_secs()) as i64;
        let status_removed = self.conn.execute(
            r#"
            DELETE FROM parking_status_log WHERE id NOT IN (
              SELECT id FROM parking_status_log ORDER BY id DESC LIMIT ?1
            )
            "#,
            params![STATUS_ROWS_KEPT],
        )?;
        let history_removed = self.conn.execute(
            "DELETE FROM space_status_history WHERE timestamp < ?1",
            params![cutoff],
        )?;
        log::info!(
            "statistics cleanup removed {} status rows and {} history rows",
            status_removed,
            history_removed
        );
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// In-memory
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct InMemoryStatsLog {
    pub statuses: Vec<OccupancyRecord>,
    pub history: Vec<SpaceHistoryEntry>,
    pub spaces: Vec<Region>,
}

impl InMemoryStatsLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsLog for InMemoryStatsLog {
    fn record_status(&mut self, record: &OccupancyRecord) -> Result<()> {
        self.statuses.push(record.clone());
        Ok(())
    }

    fn record_space_history(&mut self, result: &ClassificationResult, timestamp: u64) -> Result<()> {
        self.history.extend(history_entries(result, timestamp));
        Ok(())
    }

    fn save_spaces(&mut self, regions: &RegionCollection) -> Result<()> {
        self.spaces = regions.iter().copied().collect();
        Ok(())
    }

    fn cleanup(&mut self, now: u64) -> Result<()> {
        let keep = STATUS_ROWS_KEPT as usize;
        if self.statuses.len() > keep {
            self.statuses.drain(..self.statuses.len() - keep);
        }
        let cutoff = now.saturating_sub(HISTORY_RETENTION.as_secs());
        self.history.retain(|entry| entry.timestamp >= cutoff);
        Ok(())
    }
}
