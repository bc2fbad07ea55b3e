//! Static-texture activity mask.
//!
//! Pipeline: grayscale, fixed 3x3 Gaussian smoothing, inverted adaptive
//! threshold, median despeckle, 3x3 dilation. Only the three `TuningParams`
//! are operator controlled; everything else is fixed.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::frame::{ActivityMask, Frame};
use crate::imgproc::{self, StructuringElement};

pub const GAUSSIAN_BLUR_KERNEL: usize = 3;
pub const GAUSSIAN_BLUR_SIGMA: f64 = 1.0;
pub const DILATION_KERNEL: usize = 3;
pub const DILATION_ITERATIONS: usize = 1;

/// Upper bound of every tuning control.
pub const TUNING_MAX: u32 = 50;

/// Operator-tunable preprocessing controls, each in `0..=TUNING_MAX`.
///
/// Values are taken raw; [`TuningParams::normalized`] applies the odd-size
/// and minimum-size coercions right before use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningParams {
    pub block_size: u32,
    pub constant_offset: u32,
    pub median_kernel: u32,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            block_size: 25,
            constant_offset: 16,
            median_kernel: 5,
        }
    }
}

/// Kernel sizes ready for the image operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizedTuning {
    pub block_size: usize,
    pub constant_offset: i32,
    pub median_kernel: usize,
}

impl TuningParams {
    pub fn new(block_size: u32, constant_offset: u32, median_kernel: u32) -> Self {
        Self {
            block_size,
            constant_offset,
            median_kernel,
        }
    }

    /// Clamp every control into `0..=TUNING_MAX`.
    pub fn clamped(self) -> Self {
        Self {
            block_size: self.block_size.min(TUNING_MAX),
            constant_offset: self.constant_offset.min(TUNING_MAX),
            median_kernel: self.median_kernel.min(TUNING_MAX),
        }
    }

    /// Even kernel sizes are bumped to the next odd value; the threshold
    /// block is additionally held at 3 or more.
    pub fn normalized(self) -> NormalizedTuning {
        let p = self.clamped();
        NormalizedTuning {
            block_size: (make_odd(p.block_size) as usize).max(3),
            constant_offset: p.constant_offset as i32,
            median_kernel: make_odd(p.median_kernel) as usize,
        }
    }
}

fn make_odd(value: u32) -> u32 {
    if value % 2 == 0 {
        value + 1
    } else {
        value
    }
}

/// Stateless frame-to-mask converter.
#[derive(Clone, Debug)]
pub struct FramePreprocessor {
    dilation: StructuringElement,
}

impl Default for FramePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePreprocessor {
    pub fn new() -> Self {
        Self {
            dilation: StructuringElement::rect(DILATION_KERNEL, DILATION_KERNEL),
        }
    }

    pub fn process(&self, frame: &Frame, params: TuningParams) -> Result<ActivityMask> {
        let tuning = params.normalized();
        let gray = imgproc::to_gray(frame);
        let blurred = imgproc::gaussian_blur(&gray, GAUSSIAN_BLUR_KERNEL, GAUSSIAN_BLUR_SIGMA)?;
        let thresholded =
            imgproc::adaptive_threshold_inv(&blurred, tuning.block_size, tuning.constant_offset)?;
        let mut mask = imgproc::median_blur(&thresholded, tuning.median_kernel)?;
        for _ in 0..DILATION_ITERATIONS {
            mask = imgproc::dilate(&mask, &self.dilation);
        }
        Ok(ActivityMask::from_plane(mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::PixelRect;

    #[test]
    fn even_sizes_become_odd() {
        let n = TuningParams::new(24, 16, 4).normalized();
        assert_eq!(n.block_size, 25);
        assert_eq!(n.median_kernel, 5);
        assert_eq!(n.constant_offset, 16);
    }

    #[test]
    fn degenerate_block_sizes_are_held_at_three() {
        assert_eq!(TuningParams::new(0, 0, 0).normalized().block_size, 3);
        assert_eq!(TuningParams::new(1, 0, 0).normalized().block_size, 3);
        assert_eq!(TuningParams::new(2, 0, 0).normalized().block_size, 3);
        assert_eq!(TuningParams::new(0, 0, 0).normalized().median_kernel, 1);
    }

    #[test]
    fn out_of_range_controls_are_clamped() {
        let n = TuningParams::new(90, 70, 60).normalized();
        assert_eq!(n.block_size, 51);
        assert_eq!(n.constant_offset, 50);
        assert_eq!(n.median_kernel, 51);
    }

    #[test]
    fn flat_pavement_yields_no_activity() {
        let frame = Frame::filled(64, 48, [110, 110, 110]);
        let mask = FramePreprocessor::new()
            .process(&frame, TuningParams::default())
            .unwrap();
        assert_eq!(mask.plane().count_nonzero(), 0);
    }

    #[test]
    fn dark_object_on_bright_ground_is_activity() {
        let mut frame = Frame::filled(80, 80, [200, 200, 200]);
        frame.fill_rect(
            PixelRect {
                x: 30,
                y: 30,
                width: 12,
                height: 12,
            },
            [10, 10, 10],
        );
        let mask = FramePreprocessor::new()
            .process(&frame, TuningParams::default())
            .unwrap();
        assert!(mask.is_foreground(31, 31));
        assert!(!mask.is_foreground(5, 5));
    }
}
