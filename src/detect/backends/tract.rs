#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::VehicleDetector;
use crate::detect::result::{non_max_suppression, Detection, ObjectClass};
use crate::frame::Frame;

const DEFAULT_INPUT_SIZE: u32 = 640;
const NMS_IOU_THRESHOLD: f32 = 0.45;
/// Box centre, width and height precede the class scores.
const BOX_ATTRS: usize = 4;

/// Tract-based backend for YOLO-family ONNX detectors.
///
/// Expects a single output of shape `[1, 4 + classes, candidates]` (or its
/// transpose) with boxes as centre/size in model input pixels and per-class
/// scores. Loads a local model file only; no network I/O.
pub struct TractDetector {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    confidence_threshold: f32,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        Self::with_input_size(model_path, DEFAULT_INPUT_SIZE)
    }

    pub fn with_input_size<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            confidence_threshold: 0.25,
        })
    }

    /// Override the pre-filter confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(anyhow!("cannot run detection on an empty frame"));
        }
        let side = self.input_size as usize;
        let resized = resize_bilinear(frame.pixels(), frame.width(), frame.height(), side, side);
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            resized[(y * side + x) * 3 + c] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        decode_output(
            view,
            self.input_size,
            self.confidence_threshold,
            (frame.width(), frame.height()),
        )
    }
}

/// Turn a raw detector output into frame-space detections.
fn decode_output(
    view: tract_ndarray::ArrayViewD<'_, f32>,
    input_size: u32,
    confidence_threshold: f32,
    frame_size: (usize, usize),
) -> Result<Vec<Detection>> {
    let shape = view.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 {
        return Err(anyhow!("unexpected detector output shape {:?}", shape));
    }
    // Attributes run along the shorter axis.
    let (attrs, candidates, transposed) = if shape[1] <= shape[2] {
        (shape[1], shape[2], false)
    } else {
        (shape[2], shape[1], true)
    };
    if attrs <= BOX_ATTRS {
        return Err(anyhow!("detector output has no class scores: {:?}", shape));
    }
    let at = |attr: usize, i: usize| {
        if transposed {
            view[&[0, i, attr][..]]
        } else {
            view[&[0, attr, i][..]]
        }
    };

    let sx = frame_size.0 as f32 / input_size as f32;
    let sy = frame_size.1 as f32 / input_size as f32;
    let mut detections = Vec::new();
    for i in 0..candidates {
        let (class_id, score) = (BOX_ATTRS..attrs)
            .map(|a| (a - BOX_ATTRS, at(a, i)))
            .fold((0, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if score < confidence_threshold {
            continue;
        }
        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        detections.push(Detection::new(
            [
                (cx - w / 2.0) * sx,
                (cy - h / 2.0) * sy,
                (cx + w / 2.0) * sx,
                (cy + h / 2.0) * sy,
            ],
            score,
            ObjectClass::from_coco(class_id),
        ));
    }
    Ok(non_max_suppression(detections, NMS_IOU_THRESHOLD))
}

impl VehicleDetector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size as usize;
        let blank = Frame::filled(side, side, [0, 0, 0]);
        self.detect(&blank).map(|_| ())
    }
}

fn resize_bilinear(src: &[u8], src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];
    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;
            let sx0 = (sx.floor() as usize).min(src_w - 1);
            let sy0 = (sy.floor() as usize).min(src_h - 1);
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);
            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    dst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_keeps_uniform_color() {
        let src = vec![77u8; 8 * 6 * 3];
        let dst = resize_bilinear(&src, 8, 6, 4, 4);
        assert_eq!(dst.len(), 4 * 4 * 3);
        assert!(dst.iter().all(|&v| v == 77));
    }

    /// Output laid out as `[1, 4 + classes, candidates]`; class 2 is a car.
    fn two_cars() -> tract_ndarray::Array3<f32> {
        let mut out = tract_ndarray::Array3::<f32>::zeros((1, 7, 8));
        for (attr, v) in [320.0, 320.0, 100.0, 100.0].into_iter().enumerate() {
            out[[0, attr, 0]] = v;
        }
        out[[0, 6, 0]] = 0.9;
        for (attr, v) in [100.0, 100.0, 50.0, 50.0].into_iter().enumerate() {
            out[[0, attr, 1]] = v;
        }
        out[[0, 6, 1]] = 0.4;
        out
    }

    #[test]
    fn decode_drops_candidates_below_threshold() {
        let out = two_cars();
        let strict = decode_output(out.view().into_dyn(), 640, 0.5, (640, 640)).unwrap();
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].class, ObjectClass::Car);
        assert_eq!(strict[0].bbox, [270.0, 270.0, 370.0, 370.0]);

        let loose = decode_output(out.view().into_dyn(), 640, 0.25, (640, 640)).unwrap();
        assert_eq!(loose.len(), 2);
    }

    #[test]
    fn decode_scales_boxes_to_frame() {
        let out = two_cars();
        let kept = decode_output(out.view().into_dyn(), 640, 0.5, (320, 160)).unwrap();
        assert_eq!(kept[0].bbox, [135.0, 67.5, 185.0, 92.5]);
    }
}
