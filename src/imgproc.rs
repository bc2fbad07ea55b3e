//! Pure-Rust image operations on 8-bit planes.
//!
//! Semantics follow the conventional definitions used by common vision
//! toolkits:
//! - grayscale uses BT.601 weights in 14-bit fixed point,
//! - Gaussian blur reflects at the border without repeating the edge pixel,
//! - adaptive threshold compares against a Gaussian-weighted local mean with
//!   replicated borders,
//! - median blur replicates borders,
//! - erode/dilate ignore pixels outside the image,
//! - contour area is the polygon area through the boundary pixel centres.

use anyhow::{anyhow, Result};

use crate::frame::{Frame, GrayImage};

// ----------------------------------------------------------------------------
// Color conversion
// ----------------------------------------------------------------------------

const GRAY_SHIFT: u32 = 14;
const GRAY_R: u32 = 4899;
const GRAY_G: u32 = 9617;
const GRAY_B: u32 = 1868;

pub fn to_gray(frame: &Frame) -> GrayImage {
    GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
        let [r, g, b] = frame.pixel(x, y);
        let v = r as u32 * GRAY_R + g as u32 * GRAY_G + b as u32 * GRAY_B;
        ((v + (1 << (GRAY_SHIFT - 1))) >> GRAY_SHIFT) as u8
    })
}

// ----------------------------------------------------------------------------
// Border handling
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Border {
    /// `gfedcb|abcdefgh|gfedcba`
    Reflect101,
    /// `aaaaaa|abcdefgh|hhhhhhh`
    Replicate,
}

#[inline]
fn border_index(mut i: isize, len: usize, border: Border) -> usize {
    let n = len as isize;
    if n == 1 {
        return 0;
    }
    match border {
        Border::Replicate => i.clamp(0, n - 1) as usize,
        Border::Reflect101 => {
            while i < 0 || i >= n {
                if i < 0 {
                    i = -i;
                }
                if i >= n {
                    i = 2 * n - 2 - i;
                }
            }
            i as usize
        }
    }
}

// ----------------------------------------------------------------------------
// Linear filters
// ----------------------------------------------------------------------------

/// Normalized 1-D Gaussian kernel. A non-positive `sigma` is derived from `ksize`.
pub fn gaussian_kernel(ksize: usize, sigma: f64) -> Vec<f32> {
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8
    };
    let center = (ksize as f64 - 1.0) / 2.0;
    let scale = -0.5 / (sigma * sigma);
    let weights: Vec<f64> = (0..ksize)
        .map(|i| {
            let d = i as f64 - center;
            (scale * d * d).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| (w / sum) as f32).collect()
}

fn separable_filter(src: &GrayImage, kernel: &[f32], border: Border) -> GrayImage {
    let (w, h) = (src.width(), src.height());
    if w == 0 || h == 0 {
        return src.clone();
    }
    let r = (kernel.len() / 2) as isize;

    let mut horizontal = vec![0f32; w * h];
    for y in 0..h {
        let row = src.row(y);
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = border_index(x as isize + k as isize - r, w, border);
                acc += weight * row[sx] as f32;
            }
            horizontal[y * w + x] = acc;
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = border_index(y as isize + k as isize - r, h, border);
                acc += weight * horizontal[sy * w + x];
            }
            out.set(x, y, acc.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}

/// Square Gaussian blur. `ksize` must be odd.
pub fn gaussian_blur(src: &GrayImage, ksize: usize, sigma: f64) -> Result<GrayImage> {
    if ksize % 2 == 0 {
        return Err(anyhow!("gaussian kernel size must be odd, got {}", ksize));
    }
    let kernel = gaussian_kernel(ksize, sigma);
    Ok(separable_filter(src, &kernel, Border::Reflect101))
}

/// Inverted adaptive threshold against a Gaussian-weighted local mean.
///
/// A pixel becomes 255 when `src - mean <= -offset`, otherwise 0.
/// `block_size` must be odd and at least 3.
pub fn adaptive_threshold_inv(src: &GrayImage, block_size: usize, offset: i32) -> Result<GrayImage> {
    if block_size < 3 || block_size % 2 == 0 {
        return Err(anyhow!(
            "adaptive threshold block size must be odd and >= 3, got {}",
            block_size
        ));
    }
    let kernel = gaussian_kernel(block_size, 0.0);
    let mean = separable_filter(src, &kernel, Border::Replicate);
    let data = src
        .as_slice()
        .iter()
        .zip(mean.as_slice())
        .map(|(&s, &m)| if s as i32 - m as i32 <= -offset { 255 } else { 0 })
        .collect();
    GrayImage::from_raw(data, src.width(), src.height())
}

// ----------------------------------------------------------------------------
// Median filter
// ----------------------------------------------------------------------------

/// Median blur with a square `ksize` window. `ksize` must be odd.
///
/// Uses a sliding column histogram so cost per pixel is linear in `ksize`.
pub fn median_blur(src: &GrayImage, ksize: usize) -> Result<GrayImage> {
    if ksize % 2 == 0 {
        return Err(anyhow!("median kernel size must be odd, got {}", ksize));
    }
    let (w, h) = (src.width(), src.height());
    if ksize == 1 || w == 0 || h == 0 {
        return Ok(src.clone());
    }
    let r = (ksize / 2) as isize;
    let rank = (ksize * ksize) / 2 + 1;
    let mut out = GrayImage::new(w, h);

    for y in 0..h {
        let rows: Vec<&[u8]> = (-r..=r)
            .map(|dy| src.row(border_index(y as isize + dy, h, Border::Replicate)))
            .collect();
        let mut hist = [0u32; 256];
        for dx in -r..=r {
            let sx = border_index(dx, w, Border::Replicate);
            for row in &rows {
                hist[row[sx] as usize] += 1;
            }
        }

        for x in 0..w {
            out.set(x, y, histogram_rank(&hist, rank));
            if x + 1 == w {
                break;
            }
            let leaving = border_index(x as isize - r, w, Border::Replicate);
            let entering = border_index(x as isize + r + 1, w, Border::Replicate);
            for row in &rows {
                hist[row[leaving] as usize] -= 1;
                hist[row[entering] as usize] += 1;
            }
        }
    }
    Ok(out)
}

fn histogram_rank(hist: &[u32; 256], rank: usize) -> u8 {
    let mut seen = 0usize;
    for (value, &count) in hist.iter().enumerate() {
        seen += count as usize;
        if seen >= rank {
            return value as u8;
        }
    }
    255
}

// ----------------------------------------------------------------------------
// Morphology
// ----------------------------------------------------------------------------

/// Structuring element as offsets from its centre anchor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuringElement {
    offsets: Vec<(isize, isize)>,
}

impl StructuringElement {
    pub fn rect(width: usize, height: usize) -> Self {
        let (ax, ay) = ((width / 2) as isize, (height / 2) as isize);
        let offsets = (0..height as isize)
            .flat_map(|y| (0..width as isize).map(move |x| (x - ax, y - ay)))
            .collect();
        Self { offsets }
    }

    /// Filled ellipse inscribed in a `width`x`height` box.
    pub fn ellipse(width: usize, height: usize) -> Self {
        let (r, c) = ((height / 2) as isize, (width / 2) as isize);
        let inv_r2 = if r > 0 { 1.0 / (r * r) as f64 } else { 0.0 };
        let mut offsets = Vec::new();
        for i in 0..height as isize {
            let dy = i - r;
            let (j1, j2) = if dy.abs() <= r {
                let dx = (c as f64 * (((r * r - dy * dy) as f64) * inv_r2).sqrt()).round() as isize;
                ((c - dx).max(0), (c + dx + 1).min(width as isize))
            } else {
                (0, 0)
            };
            for j in j1..j2 {
                offsets.push((j - c, dy));
            }
        }
        Self { offsets }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

fn morph(src: &GrayImage, element: &StructuringElement, pick_max: bool) -> GrayImage {
    let (w, h) = (src.width() as isize, src.height() as isize);
    GrayImage::from_fn(src.width(), src.height(), |x, y| {
        let mut acc: Option<u8> = None;
        for &(dx, dy) in &element.offsets {
            let (sx, sy) = (x as isize + dx, y as isize + dy);
            if sx < 0 || sy < 0 || sx >= w || sy >= h {
                continue;
            }
            let v = src.get(sx as usize, sy as usize);
            acc = Some(match acc {
                None => v,
                Some(a) if pick_max => a.max(v),
                Some(a) => a.min(v),
            });
        }
        acc.unwrap_or_else(|| src.get(x, y))
    })
}

pub fn dilate(src: &GrayImage, element: &StructuringElement) -> GrayImage {
    morph(src, element, true)
}

pub fn erode(src: &GrayImage, element: &StructuringElement) -> GrayImage {
    morph(src, element, false)
}

/// Erosion followed by dilation. Removes specks smaller than `element`.
pub fn open(src: &GrayImage, element: &StructuringElement) -> GrayImage {
    dilate(&erode(src, element), element)
}

// ----------------------------------------------------------------------------
// Contours
// ----------------------------------------------------------------------------

/// Chain-code directions, counter-clockwise on screen starting east.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),
    (1, -1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];
const WEST: usize = 4;

/// Closed boundary through pixel centres.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<(i32, i32)>,
}

impl Contour {
    /// Polygon (shoelace) area. Single pixels and lines have area 0.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let twice: i64 = (0..n)
            .map(|i| {
                let (x0, y0) = self.points[i];
                let (x1, y1) = self.points[(i + 1) % n];
                x0 as i64 * y1 as i64 - x1 as i64 * y0 as i64
            })
            .sum();
        twice.abs() as f64 / 2.0
    }
}

/// Outer boundaries of every 8-connected foreground component.
///
/// A component lying in a hole of another component gets its own contour.
/// Its area is always smaller than the enclosing one.
pub fn external_contours(src: &GrayImage) -> Vec<Contour> {
    let (w, h) = (src.width(), src.height());
    let mut visited = vec![false; w * h];
    let mut contours = Vec::new();
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if visited[idx] || src.get(x, y) == 0 {
                continue;
            }
            // First raster hit is the top-left pixel of a new component.
            contours.push(trace_border(src, (x as i32, y as i32)));

            visited[idx] = true;
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                for (dx, dy) in DIRECTIONS {
                    let (nx, ny) = (cx as i32 + dx, cy as i32 + dy);
                    if !is_foreground(src, nx, ny) {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    if !visited[nidx] {
                        visited[nidx] = true;
                        stack.push((nx as usize, ny as usize));
                    }
                }
            }
        }
    }
    contours
}

#[inline]
fn is_foreground(src: &GrayImage, x: i32, y: i32) -> bool {
    x >= 0
        && y >= 0
        && (x as usize) < src.width()
        && (y as usize) < src.height()
        && src.get(x as usize, y as usize) != 0
}

fn direction_between(from: (i32, i32), to: (i32, i32)) -> usize {
    let delta = (to.0 - from.0, to.1 - from.1);
    DIRECTIONS.iter().position(|&d| d == delta).unwrap_or(WEST)
}

fn step(p: (i32, i32), dir: usize) -> (i32, i32) {
    (p.0 + DIRECTIONS[dir].0, p.1 + DIRECTIONS[dir].1)
}

/// Border following from a pixel whose west neighbour is background.
fn trace_border(src: &GrayImage, start: (i32, i32)) -> Contour {
    // Clockwise search from the west neighbour for the first foreground pixel.
    let first = (0..8)
        .map(|k| (WEST + 8 - k) % 8)
        .map(|dir| step(start, dir))
        .find(|&(x, y)| is_foreground(src, x, y));
    let Some(first) = first else {
        return Contour {
            points: vec![start],
        };
    };

    let mut points = Vec::new();
    let mut prev = first;
    let mut current = start;
    let limit = 4 * src.width() * src.height() + 8;
    while points.len() < limit {
        let back = direction_between(current, prev);
        let next = (1..=8)
            .map(|k| step(current, (back + k) % 8))
            .find(|&(x, y)| is_foreground(src, x, y))
            .unwrap_or(current);
        points.push(current);
        if next == start && current == first {
            break;
        }
        prev = current;
        current = next;
    }
    Contour { points }
}
