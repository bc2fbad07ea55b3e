//! Region persistence.
//!
//! Regions are stored as a versioned JSON envelope:
//!
//! ```json
//! { "version": 1, "regions": [[x, y, width, height], ...] }
//! ```
//!
//! Decoding also accepts a bare array of tuples. Two-element tuples are
//! legacy top-left points and are upgraded to `LEGACY_REGION_SIZE` squares.
//! Tuples of any other arity are dropped.
//!
//! Loading never fails: a missing or unreadable store yields an empty
//! collection. Saving always replaces the whole store and reports failures.
//! A file that existed but could not be read is copied aside before the
//! first save replaces it.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::region::{Region, RegionCollection};

pub const REGION_FILE_VERSION: u32 = 1;

pub trait RegionStore {
    /// Read the persisted regions. Failures are logged and yield an empty collection.
    fn load(&mut self) -> RegionCollection;

    /// Replace the persisted regions with `regions`.
    fn save(&mut self, regions: &RegionCollection) -> Result<()>;

    /// Append one region and persist the full collection immediately.
    ///
    /// Returns the index of the new region. On a failed save the region stays
    /// in `regions` and the error is returned.
    fn append(&mut self, regions: &mut RegionCollection, region: Region) -> Result<usize> {
        let index = regions.push(region);
        self.save(regions)?;
        Ok(index)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RegionFile {
    version: u32,
    regions: Vec<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredRegions {
    Versioned(RegionFile),
    Bare(Vec<Vec<i64>>),
}

/// Encode regions in the current file format.
pub fn encode_regions(regions: &RegionCollection) -> Result<Vec<u8>> {
    let file = RegionFile {
        version: REGION_FILE_VERSION,
        regions: regions
            .iter()
            .map(|r| vec![r.x as i64, r.y as i64, r.width as i64, r.height as i64])
            .collect(),
    };
    let mut bytes = serde_json::to_vec_pretty(&file)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode regions, upgrading legacy entries and dropping malformed ones.
pub fn decode_regions(bytes: &[u8]) -> Result<RegionCollection> {
    let stored: StoredRegions =
        serde_json::from_slice(bytes).context("region data is not a region list")?;
    let entries = match stored {
        StoredRegions::Versioned(file) => {
            if file.version > REGION_FILE_VERSION {
                return Err(anyhow!(
                    "region file version {} is newer than supported version {}",
                    file.version,
                    REGION_FILE_VERSION
                ));
            }
            file.regions
        }
        StoredRegions::Bare(entries) => entries,
    };

    let total = entries.len();
    let regions: RegionCollection = entries.iter().filter_map(|e| region_from_entry(e)).collect();
    if regions.len() != total {
        log::warn!(
            "dropped {} malformed region entries out of {}",
            total - regions.len(),
            total
        );
    }
    Ok(regions)
}

fn region_from_entry(entry: &[i64]) -> Option<Region> {
    match *entry {
        [x, y] => Some(Region::legacy(i32::try_from(x).ok()?, i32::try_from(y).ok()?)),
        [x, y, w, h] => Region::new(
            i32::try_from(x).ok()?,
            i32::try_from(y).ok()?,
            u32::try_from(w).ok()?,
            u32::try_from(h).ok()?,
        )
        .ok(),
        _ => None,
    }
}

/// Regions persisted to a JSON file on local disk.
#[derive(Clone, Debug)]
pub struct FileRegionStore {
    path: PathBuf,
    /// The last load found a file it could not use.
    unreadable: bool,
}

impl FileRegionStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            unreadable: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable region file is kept once a save replaces it.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }

    fn preserve_unreadable(&mut self) -> Result<()> {
        if !self.unreadable || !self.path.is_file() {
            return Ok(());
        }
        let backup = self.backup_path();
        std::fs::copy(&self.path, &backup).with_context(|| {
            format!(
                "refusing to replace unreadable region file {}: backup to {} failed",
                self.path.display(),
                backup.display()
            )
        })?;
        log::warn!(
            "kept unreadable region file {} as {}",
            self.path.display(),
            backup.display()
        );
        Ok(())
    }
}

impl RegionStore for FileRegionStore {
    fn load(&mut self) -> RegionCollection {
        self.unreadable = false;
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("no region file at {}, starting empty", self.path.display());
                return RegionCollection::new();
            }
            Err(e) => {
                log::warn!(
                    "failed to read region file {}: {}; starting empty",
                    self.path.display(),
                    e
                );
                self.unreadable = true;
                return RegionCollection::new();
            }
        };
        match decode_regions(&bytes) {
            Ok(regions) => {
                log::info!(
                    "loaded {} parking spaces from {}",
                    regions.len(),
                    self.path.display()
                );
                regions
            }
            Err(e) => {
                log::warn!(
                    "corrupt region file {}: {:#}; starting empty",
                    self.path.display(),
                    e
                );
                self.unreadable = true;
                RegionCollection::new()
            }
        }
    }

    fn save(&mut self, regions: &RegionCollection) -> Result<()> {
        let bytes = encode_regions(regions)?;
        self.preserve_unreadable()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        // Write beside the target, then rename into place.
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &bytes)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;
        self.unreadable = false;
        log::debug!(
            "saved {} parking spaces to {}",
            regions.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Regions kept as encoded bytes in memory. Goes through the same codec as
/// `FileRegionStore`.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRegionStore {
    bytes: Option<Vec<u8>>,
    saves: usize,
}

impl InMemoryRegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with pre-encoded bytes (legacy or corrupt data included).
    pub fn with_raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: Some(bytes.into()),
            saves: 0,
        }
    }

    pub fn raw(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    /// Number of successful saves.
    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl RegionStore for InMemoryRegionStore {
    fn load(&mut self) -> RegionCollection {
        let Some(bytes) = self.bytes.as_deref() else {
            return RegionCollection::new();
        };
        decode_regions(bytes).unwrap_or_else(|e| {
            log::warn!("corrupt in-memory region data: {:#}; starting empty", e);
            RegionCollection::new()
        })
    }

    fn save(&mut self, regions: &RegionCollection) -> Result<()> {
        self.bytes = Some(encode_regions(regions)?);
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_pairs_upgrade_and_bad_arity_is_dropped() {
        let regions = decode_regions(b"[[10, 20], [1, 2, 3, 4], [1, 2, 3], []]").unwrap();
        assert_eq!(
            regions.as_slice(),
            &[Region::legacy(10, 20), Region::new(1, 2, 3, 4).unwrap()]
        );
        assert_eq!(regions.get(0).unwrap().width, 50);
    }

    #[test]
    fn zero_or_negative_sizes_are_dropped() {
        let regions = decode_regions(br#"{"version":1,"regions":[[0,0,0,5],[0,0,-4,5],[7,7,5,5]]}"#)
            .unwrap();
        assert_eq!(regions.as_slice(), &[Region::new(7, 7, 5, 5).unwrap()]);
    }

    #[test]
    fn newer_versions_are_refused() {
        assert!(decode_regions(br#"{"version":99,"regions":[]}"#).is_err());
    }

    #[test]
    fn corrupt_data_loads_as_empty() {
        let mut store = InMemoryRegionStore::with_raw(b"\x80not json".to_vec());
        assert!(store.load().is_empty());
    }

    #[test]
    fn append_writes_through() {
        let mut store = InMemoryRegionStore::new();
        let mut regions = store.load();
        let index = store
            .append(&mut regions, Region::new(10, 10, 50, 30).unwrap())
            .unwrap();
        assert_eq!(index, 0);
        assert_eq!(store.saves(), 1);
        assert_eq!(store.load(), regions);
    }

    #[test]
    fn encoded_file_is_versioned() {
        let regions: RegionCollection = vec![Region::new(1, 2, 3, 4).unwrap()].into();
        let bytes = encode_regions(&regions).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["regions"][0], serde_json::json!([1, 2, 3, 4]));
    }
}
