//! YuNet detector post-processing.
//!
//! YuNet is anchor-free. For each stride (8, 16, 32) it predicts, per grid
//! cell, a class score, an objectness score, a box and five landmarks:
//!
//! ```text
//! score = sqrt(clamp(cls) * clamp(obj))
//! cx    = (col + dx) * stride        w = exp(dw) * stride
//! cy    = (row + dy) * stride        h = exp(dh) * stride
//! lm_x  = (col + lx) * stride        lm_y = (row + ly) * stride
//! ```
//!
//! Output tensors come in the order cls_8, cls_16, cls_32, obj_8, obj_16,
//! obj_32, bbox_8, bbox_16, bbox_32, kps_8, kps_16, kps_32.

use anyhow::Result;
use ndarray::Array2;

pub const STRIDES: [usize; 3] = [8, 16, 32];
const OUTPUTS_PER_KIND: usize = STRIDES.len();

#[derive(Debug, Clone)]
pub struct RawDetection {
    pub bbox: [f32; 4], // x, y, w, h (normalized [0,1])
    pub score: f32,
    pub landmarks: [f32; 10], // normalized [0,1]
}

/// Predictions of one stride, one row per grid cell.
#[derive(Debug, Clone)]
pub struct StrideHead {
    pub stride: usize,
    pub scores: Array2<f32>,    // [cells, 1], already combined
    pub boxes: Array2<f32>,     // [cells, 4]
    pub landmarks: Array2<f32>, // [cells, 10]
}

impl StrideHead {
    pub fn grid_size(&self, input_size: usize) -> usize {
        input_size / self.stride
    }
}

/// Split the 12 raw YuNet outputs into one [`StrideHead`] per stride.
pub fn parse_outputs(outputs: &[(&[i64], &[f32])], input_size: usize) -> Result<Vec<StrideHead>> {
    if outputs.len() < 4 * OUTPUTS_PER_KIND {
        anyhow::bail!(
            "YuNet produced {} outputs, expected {}",
            outputs.len(),
            4 * OUTPUTS_PER_KIND
        );
    }

    STRIDES
        .iter()
        .enumerate()
        .map(|(k, &stride)| {
            let grid = input_size / stride;
            let cells = grid * grid;
            let cls = head_tensor(outputs, k, cells, 1, "cls")?;
            let obj = head_tensor(outputs, k + OUTPUTS_PER_KIND, cells, 1, "obj")?;
            let boxes = head_tensor(outputs, k + 2 * OUTPUTS_PER_KIND, cells, 4, "bbox")?;
            let landmarks = head_tensor(outputs, k + 3 * OUTPUTS_PER_KIND, cells, 10, "kps")?;

            let mut scores = cls;
            scores.zip_mut_with(&obj, |c, &o| {
                *c = (c.clamp(0.0, 1.0) * o.clamp(0.0, 1.0)).sqrt();
            });

            Ok(StrideHead {
                stride,
                scores,
                boxes,
                landmarks,
            })
        })
        .collect()
}

fn head_tensor(
    outputs: &[(&[i64], &[f32])],
    index: usize,
    cells: usize,
    cols: usize,
    kind: &str,
) -> Result<Array2<f32>> {
    let (shape, data) = outputs[index];
    let shape_ok = shape.len() == 3
        && shape[0] == 1
        && shape[1] as usize == cells
        && shape[2] as usize == cols;
    if !shape_ok {
        anyhow::bail!(
            "Unexpected {} shape at output {}: {:?}, expected [1, {}, {}]",
            kind,
            index,
            shape,
            cells,
            cols
        );
    }
    Ok(Array2::from_shape_vec((cells, cols), data.to_vec())?)
}

/// Decode every grid cell scoring at least `score_threshold`.
pub fn decode_detections(
    heads: &[StrideHead],
    score_threshold: f32,
    input_size: usize,
) -> Vec<RawDetection> {
    let norm = input_size as f32;
    let mut detections = Vec::new();

    for head in heads {
        let grid = head.grid_size(input_size);
        let stride = head.stride as f32;

        for (idx, &score) in head.scores.column(0).iter().enumerate() {
            if score < score_threshold {
                continue;
            }
            let row = (idx / grid) as f32;
            let col = (idx % grid) as f32;

            let b = head.boxes.row(idx);
            let cx = (col + b[0]) * stride;
            let cy = (row + b[1]) * stride;
            let w = b[2].exp() * stride;
            let h = b[3].exp() * stride;

            let kps = head.landmarks.row(idx);
            let mut landmarks = [0.0f32; 10];
            for p in 0..5 {
                landmarks[p * 2] = (col + kps[p * 2]) * stride / norm;
                landmarks[p * 2 + 1] = (row + kps[p * 2 + 1]) * stride / norm;
            }

            detections.push(RawDetection {
                bbox: [(cx - w / 2.0) / norm, (cy - h / 2.0) / norm, w / norm, h / norm],
                score,
                landmarks,
            });
        }
    }

    detections
}
