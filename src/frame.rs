//! Frame and plane containers.
//!
//! - `Frame`: packed RGB pixels as delivered by a frame source.
//! - `GrayImage`: single-channel 8-bit plane used by the image operations.
//! - `ActivityMask`: frame-sized plane where any nonzero pixel is foreground.
//!
//! All three are row-major with no row padding.

use anyhow::{anyhow, Result};

use crate::region::PixelRect;

// ----------------------------------------------------------------------------
// Frame: packed RGB
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl Frame {
    /// Wrap packed RGB bytes. `data.len()` must equal `width * height * 3`.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Uniform frame, mostly for tests and synthetic sources.
    pub fn filled(width: usize, height: usize, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let idx = (y * self.width + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let idx = (y * self.width + x) * 3;
        self.data[idx..idx + 3].copy_from_slice(&rgb);
    }

    /// Paint a solid rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, rect: PixelRect, rgb: [u8; 3]) {
        let x1 = (rect.x + rect.width).min(self.width);
        let y1 = (rect.y + rect.height).min(self.height);
        for y in rect.y.min(y1)..y1 {
            for x in rect.x.min(x1)..x1 {
                self.set_pixel(x, y, rgb);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// GrayImage: single channel
// ----------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![0; width * height],
            width,
            height,
        }
    }

    pub fn from_raw(data: Vec<u8>, width: usize, height: usize) -> Result<Self> {
        if data.len() != width * height {
            return Err(anyhow!(
                "expected {} bytes for {}x{} plane, received {}",
                width * height,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u8) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    /// Copy out an in-bounds rectangle.
    pub fn crop(&self, rect: PixelRect) -> GrayImage {
        let mut data = Vec::with_capacity(rect.width * rect.height);
        for y in rect.y..rect.y + rect.height {
            let start = y * self.width + rect.x;
            data.extend_from_slice(&self.data[start..start + rect.width]);
        }
        GrayImage {
            data,
            width: rect.width,
            height: rect.height,
        }
    }

    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

// ----------------------------------------------------------------------------
// ActivityMask: foreground plane
// ----------------------------------------------------------------------------

/// Per-frame foreground signal. Recomputed every frame, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityMask {
    plane: GrayImage,
}

impl ActivityMask {
    pub fn from_plane(plane: GrayImage) -> Self {
        Self { plane }
    }

    pub fn empty(width: usize, height: usize) -> Self {
        Self {
            plane: GrayImage::new(width, height),
        }
    }

    pub fn width(&self) -> usize {
        self.plane.width()
    }

    pub fn height(&self) -> usize {
        self.plane.height()
    }

    pub fn plane(&self) -> &GrayImage {
        &self.plane
    }

    pub fn is_foreground(&self, x: usize, y: usize) -> bool {
        self.plane.get(x, y) != 0
    }

    /// Mark a rectangle as foreground, clipped to the mask.
    pub fn fill(&mut self, rect: PixelRect) {
        let x1 = (rect.x + rect.width).min(self.width());
        let y1 = (rect.y + rect.height).min(self.height());
        for y in rect.y.min(y1)..y1 {
            for x in rect.x.min(x1)..x1 {
                self.plane.set(x, y, 255);
            }
        }
    }

    /// Foreground pixels inside an in-bounds rectangle.
    pub fn count_in(&self, rect: PixelRect) -> usize {
        (rect.y..rect.y + rect.height)
            .map(|y| {
                self.plane.row(y)[rect.x..rect.x + rect.width]
                    .iter()
                    .filter(|&&v| v != 0)
                    .count()
            })
            .sum()
    }

    pub fn crop(&self, rect: PixelRect) -> GrayImage {
        self.plane.crop(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_wrong_length() {
        assert!(Frame::new(vec![0; 10], 2, 2).is_err());
        assert!(Frame::new(vec![0; 12], 2, 2).is_ok());
    }

    #[test]
    fn mask_counts_only_inside_rect() {
        let mut mask = ActivityMask::empty(20, 20);
        mask.fill(PixelRect {
            x: 5,
            y: 5,
            width: 10,
            height: 10,
        });
        let rect = PixelRect {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        };
        assert_eq!(mask.count_in(rect), 25);
        assert_eq!(mask.crop(rect).count_nonzero(), 25);
    }
}
