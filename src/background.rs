//! Temporal background model.
//!
//! Each pixel keeps a small mixture of RGB Gaussians ordered by weight. The
//! heaviest modes whose weights add up to `background_ratio` describe the
//! empty lot; a sample outside all of them is foreground. Foreground samples
//! that look like a darker copy of a background mode are classed as shadow
//! and suppressed. The mask is then opened with a 5x5 ellipse.
//!
//! The model is owned by the caller and updated once per `apply`.

use anyhow::{anyhow, Result};

use crate::frame::{ActivityMask, Frame, GrayImage};
use crate::imgproc::{self, StructuringElement};

pub const FOREGROUND: u8 = 255;
pub const OPENING_KERNEL: usize = 5;

#[derive(Clone, Debug, PartialEq)]
pub struct BackgroundConfig {
    /// Frames over which the learning rate settles to `1 / history`.
    pub history: u32,
    /// Squared Mahalanobis distance separating foreground from background.
    pub var_threshold: f32,
    /// Suppress shadow pixels from the foreground.
    pub detect_shadows: bool,
    pub max_modes: usize,
    pub background_ratio: f32,
    /// Squared distance under which a sample updates an existing mode.
    pub var_threshold_gen: f32,
    pub var_init: f32,
    pub var_min: f32,
    pub var_max: f32,
    /// Weight decay pulling unused modes out of the mixture.
    pub complexity_reduction: f32,
    /// Darkest brightness ratio still considered a shadow.
    pub shadow_tau: f32,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 50.0,
            detect_shadows: true,
            max_modes: 5,
            background_ratio: 0.9,
            var_threshold_gen: 9.0,
            var_init: 15.0,
            var_min: 4.0,
            var_max: 75.0,
            complexity_reduction: 0.05,
            shadow_tau: 0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Mode {
    weight: f32,
    mean: [f32; 3],
    variance: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PixelClass {
    Background,
    Shadow,
    Foreground,
}

pub struct BackgroundModel {
    config: BackgroundConfig,
    width: usize,
    height: usize,
    modes: Vec<Mode>,
    used: Vec<u8>,
    frames_seen: u64,
    opening: StructuringElement,
}

impl BackgroundModel {
    pub fn new(config: BackgroundConfig) -> Result<Self> {
        if config.max_modes == 0 || config.max_modes > u8::MAX as usize {
            return Err(anyhow!("max_modes must be in 1..=255"));
        }
        if config.history == 0 {
            return Err(anyhow!("history must be greater than zero"));
        }
        Ok(Self {
            config,
            width: 0,
            height: 0,
            modes: Vec::new(),
            used: Vec::new(),
            frames_seen: 0,
            opening: StructuringElement::ellipse(OPENING_KERNEL, OPENING_KERNEL),
        })
    }

    pub fn config(&self) -> &BackgroundConfig {
        &self.config
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Forget everything learnt. The next frame starts a fresh model.
    pub fn reset(&mut self) {
        self.modes.clear();
        self.used.clear();
        self.width = 0;
        self.height = 0;
        self.frames_seen = 0;
    }

    /// Update the model with `frame` and return its foreground mask.
    ///
    /// A change of frame size resets the model.
    pub fn apply(&mut self, frame: &Frame) -> ActivityMask {
        if frame.width() != self.width || frame.height() != self.height {
            if self.frames_seen > 0 {
                log::info!(
                    "background model reset: frame size changed {}x{} -> {}x{}",
                    self.width,
                    self.height,
                    frame.width(),
                    frame.height()
                );
            }
            self.reset();
            self.width = frame.width();
            self.height = frame.height();
            let pixels = self.width * self.height;
            self.modes = vec![Mode::default(); pixels * self.config.max_modes];
            self.used = vec![0; pixels];
        }

        self.frames_seen += 1;
        let alpha = 1.0 / (2 * self.frames_seen).min(self.config.history as u64) as f32;

        let mut raw = GrayImage::new(self.width, self.height);
        let k = self.config.max_modes;
        for (idx, px) in frame.pixels().chunks_exact(3).enumerate() {
            let sample = [px[0] as f32, px[1] as f32, px[2] as f32];
            let slots = &mut self.modes[idx * k..(idx + 1) * k];
            let class = update_pixel(&self.config, slots, &mut self.used[idx], sample, alpha);
            if class == PixelClass::Foreground {
                raw.as_mut_slice()[idx] = FOREGROUND;
            }
        }

        ActivityMask::from_plane(imgproc::open(&raw, &self.opening))
    }
}

fn update_pixel(
    cfg: &BackgroundConfig,
    slots: &mut [Mode],
    used: &mut u8,
    sample: [f32; 3],
    alpha: f32,
) -> PixelClass {
    let n = *used as usize;
    let decay = 1.0 - alpha;
    let prune = -alpha * cfg.complexity_reduction;

    // Classify against the model as it stood before this sample.
    let mut class = PixelClass::Foreground;
    let mut cumulative = 0.0;
    for mode in &slots[..n] {
        if cumulative >= cfg.background_ratio {
            break;
        }
        if distance2(&mode.mean, &sample) < cfg.var_threshold * mode.variance {
            class = PixelClass::Background;
            break;
        }
        cumulative += mode.weight;
    }
    if class == PixelClass::Foreground && cfg.detect_shadows && is_shadow(cfg, &slots[..n], sample)
    {
        class = PixelClass::Shadow;
    }

    // Update: the first close mode absorbs the sample, all others decay.
    let mut matched = false;
    for mode in &mut slots[..n] {
        mode.weight = decay * mode.weight + prune;
        if matched {
            continue;
        }
        let d2 = distance2(&mode.mean, &sample);
        if d2 < cfg.var_threshold_gen * mode.variance {
            matched = true;
            mode.weight += alpha;
            let rate = alpha / mode.weight;
            for c in 0..3 {
                mode.mean[c] += rate * (sample[c] - mode.mean[c]);
            }
            mode.variance = (mode.variance + rate * (d2 - mode.variance))
                .clamp(cfg.var_min, cfg.var_max);
        }
    }

    // Drop modes whose weight decayed away.
    let mut kept = 0;
    for i in 0..n {
        if slots[i].weight > 0.0 {
            slots[kept] = slots[i];
            kept += 1;
        }
    }
    let mut n = kept;

    if !matched {
        // A full mixture replaces its lightest mode.
        if n < slots.len() {
            n += 1;
        }
        slots[n - 1] = Mode {
            weight: if n == 1 { 1.0 } else { alpha },
            mean: sample,
            variance: cfg.var_init,
        };
    }

    let total: f32 = slots[..n].iter().map(|m| m.weight).sum();
    if total > 0.0 {
        for mode in &mut slots[..n] {
            mode.weight /= total;
        }
    }
    slots[..n].sort_by(|a, b| b.weight.total_cmp(&a.weight));
    *used = n as u8;

    class
}

#[inline]
fn distance2(mean: &[f32; 3], sample: &[f32; 3]) -> f32 {
    (0..3).map(|c| (mean[c] - sample[c]).powi(2)).sum()
}

/// A shadow is a background colour scaled down by a factor in `[tau, 1]`.
fn is_shadow(cfg: &BackgroundConfig, modes: &[Mode], sample: [f32; 3]) -> bool {
    let mut cumulative = 0.0;
    for mode in modes {
        let numerator: f32 = (0..3).map(|c| sample[c] * mode.mean[c]).sum();
        let denominator: f32 = mode.mean.iter().map(|m| m * m).sum();
        if denominator == 0.0 {
            return false;
        }
        if numerator <= denominator && numerator >= cfg.shadow_tau * denominator {
            let a = numerator / denominator;
            let d2: f32 = (0..3).map(|c| (a * mode.mean[c] - sample[c]).powi(2)).sum();
            if d2 < cfg.var_threshold * mode.variance * a * a {
                return true;
            }
        }
        cumulative += mode.weight;
        if cumulative > cfg.background_ratio {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::PixelRect;

    fn lot() -> Frame {
        Frame::filled(40, 30, [120, 120, 120])
    }

    fn car_rect() -> PixelRect {
        PixelRect {
            x: 10,
            y: 8,
            width: 14,
            height: 12,
        }
    }

    fn learnt_model() -> BackgroundModel {
        let mut model = BackgroundModel::new(BackgroundConfig::default()).unwrap();
        for _ in 0..30 {
            model.apply(&lot());
        }
        model
    }

    #[test]
    fn static_scene_is_background() {
        let mut model = learnt_model();
        let mask = model.apply(&lot());
        assert_eq!(mask.plane().count_nonzero(), 0);
        assert_eq!(model.frames_seen(), 31);
    }

    #[test]
    fn new_object_is_foreground() {
        let mut model = learnt_model();
        let mut frame = lot();
        frame.fill_rect(car_rect(), [220, 30, 30]);
        let mask = model.apply(&frame);
        assert!(mask.is_foreground(16, 14));
        assert!(!mask.is_foreground(2, 2));
    }

    #[test]
    fn shadows_are_suppressed() {
        let mut model = learnt_model();
        let mut frame = lot();
        frame.fill_rect(car_rect(), [84, 84, 84]);
        let mask = model.apply(&frame);
        assert_eq!(mask.plane().count_nonzero(), 0);

        let mut config = BackgroundConfig::default();
        config.detect_shadows = false;
        let mut model = BackgroundModel::new(config).unwrap();
        for _ in 0..30 {
            model.apply(&lot());
        }
        let mask = model.apply(&frame);
        assert!(mask.is_foreground(16, 14));
    }

    #[test]
    fn parked_object_fades_into_background() {
        let mut model = learnt_model();
        let mut frame = lot();
        frame.fill_rect(car_rect(), [220, 30, 30]);
        for _ in 0..400 {
            model.apply(&frame);
        }
        assert!(!model.apply(&frame).is_foreground(16, 14));
    }

    #[test]
    fn size_change_resets_model() {
        let mut model = learnt_model();
        let mask = model.apply(&Frame::filled(20, 20, [0, 0, 0]));
        assert_eq!(mask.width(), 20);
        assert_eq!(model.frames_seen(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = BackgroundConfig::default();
        config.max_modes = 0;
        assert!(BackgroundModel::new(config).is_err());
    }
}
