//! Parking space geometry.
//!
//! A `Region` is an axis-aligned rectangle in frame pixel coordinates. Its
//! identity is its position in the owning `RegionCollection`; the collection
//! only grows by appending, so indices stay stable for display and logging.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Side length used when upgrading legacy point-only records.
pub const LEGACY_REGION_SIZE: u32 = 50;

/// Pointer position in frame coordinates. May lie outside the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Builds a region, rejecting zero width or height.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "region at ({}, {}) has zero size {}x{}",
                x,
                y,
                width,
                height
            ));
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Upgrade of a legacy top-left-only record.
    pub fn legacy(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            width: LEGACY_REGION_SIZE,
            height: LEGACY_REGION_SIZE,
        }
    }

    /// Normalized rectangle spanned by two drag corners.
    pub fn from_corners(a: Point, b: Point) -> Result<Self> {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        let width = a.x.abs_diff(b.x);
        let height = a.y.abs_diff(b.y);
        Self::new(x, y, width, height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Intersection with a `width`x`height` frame.
    ///
    /// Returns `None` when nothing of the region lies inside the frame.
    pub fn clamp_to(&self, width: usize, height: usize) -> Option<PixelRect> {
        let x0 = (self.x as i64).clamp(0, width as i64);
        let y0 = (self.y as i64).clamp(0, height as i64);
        let x1 = self.right().clamp(0, width as i64);
        let y1 = self.bottom().clamp(0, height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(PixelRect {
            x: x0 as usize,
            y: y0 as usize,
            width: (x1 - x0) as usize,
            height: (y1 - y0) as usize,
        })
    }

    /// Area shared with an axis-aligned box given as `[x1, y1, x2, y2]`.
    pub fn intersection_area(&self, bbox: &[f32; 4]) -> f32 {
        let ix1 = (self.x as f32).max(bbox[0]);
        let iy1 = (self.y as f32).max(bbox[1]);
        let ix2 = (self.right() as f32).min(bbox[2]);
        let iy2 = (self.bottom() as f32).min(bbox[3]);
        (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0)
    }

    /// Fraction of this region covered by `bbox`.
    pub fn overlap_ratio(&self, bbox: &[f32; 4]) -> f32 {
        let area = self.area();
        if area == 0 {
            return 0.0;
        }
        self.intersection_area(bbox) / area as f32
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.x, self.y, self.width, self.height
        )
    }
}

/// In-bounds pixel rectangle produced by [`Region::clamp_to`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// Ordered parking spaces. Insertion order is the stable space index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionCollection {
    regions: Vec<Region>,
}

impl RegionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, region: Region) -> usize {
        self.regions.push(region);
        self.regions.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn as_slice(&self) -> &[Region] {
        &self.regions
    }
}

impl From<Vec<Region>> for RegionCollection {
    fn from(regions: Vec<Region>) -> Self {
        Self { regions }
    }
}

impl FromIterator<Region> for RegionCollection {
    fn from_iter<I: IntoIterator<Item = Region>>(iter: I) -> Self {
        Self {
            regions: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RegionCollection {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_normalize_any_drag_direction() {
        let forward = Region::from_corners(Point::new(10, 10), Point::new(60, 40)).unwrap();
        let backward = Region::from_corners(Point::new(60, 40), Point::new(10, 10)).unwrap();
        assert_eq!(forward, Region::new(10, 10, 50, 30).unwrap());
        assert_eq!(forward, backward);
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(Region::new(5, 5, 0, 10).is_err());
        assert!(Region::from_corners(Point::new(3, 3), Point::new(3, 9)).is_err());
    }

    #[test]
    fn clamp_trims_partial_regions_and_drops_outside_ones() {
        let partial = Region::new(-10, 90, 30, 30).unwrap();
        assert_eq!(
            partial.clamp_to(100, 100),
            Some(PixelRect {
                x: 0,
                y: 90,
                width: 20,
                height: 10
            })
        );

        let outside = Region::new(120, 10, 30, 30).unwrap();
        assert_eq!(outside.clamp_to(100, 100), None);
    }

    #[test]
    fn overlap_ratio_is_relative_to_region_area() {
        let region = Region::new(0, 0, 100, 100).unwrap();
        let quarter = [50.0, 50.0, 150.0, 150.0];
        assert!((region.overlap_ratio(&quarter) - 0.25).abs() < 1e-6);
        assert_eq!(region.overlap_ratio(&[200.0, 200.0, 300.0, 300.0]), 0.0);
    }

    #[test]
    fn collection_indices_follow_insertion_order() {
        let mut regions = RegionCollection::new();
        assert_eq!(regions.push(Region::legacy(0, 0)), 0);
        assert_eq!(regions.push(Region::legacy(60, 0)), 1);
        assert_eq!(regions.get(1).unwrap().x, 60);
        assert_eq!(regions.len(), 2);
    }
}
