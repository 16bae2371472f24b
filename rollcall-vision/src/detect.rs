use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use ort::{session::Session, value::Value};

use crate::face::{nms, Detection};
use crate::preprocess::{self, Letterbox};
use crate::yunet;

/// YuNet 2023mar has a fixed `[1, 3, 640, 640]` input.
pub const DETECTOR_INPUT_SIZE: u32 = 640;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorOptions {
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            score_threshold: 0.6,
            nms_threshold: 0.3,
        }
    }
}

/// Detect faces with YuNet. Results are ordered by descending score.
pub fn detect_faces(
    session: &mut Session,
    img: &DynamicImage,
    options: DetectorOptions,
) -> Result<Vec<Detection>> {
    if preprocess::is_empty(img) {
        return Ok(Vec::new());
    }

    let (width, height) = img.dimensions();
    let letterbox = Letterbox::fit(width, height, DETECTOR_INPUT_SIZE);
    let canvas = letterbox.apply(img);
    let input_tensor = Value::from_array(preprocess::bgr_planar(&canvas)?)?;

    let outputs = session.run(ort::inputs![input_tensor])?;

    let mut tensors: Vec<(Vec<i64>, Vec<f32>)> = Vec::new();
    for (_name, output) in outputs.iter() {
        let (shape, data) = output.try_extract_tensor::<f32>()?;
        tensors.push((shape.iter().copied().collect(), data.to_vec()));
    }
    let views: Vec<(&[i64], &[f32])> = tensors
        .iter()
        .map(|(s, d)| (s.as_slice(), d.as_slice()))
        .collect();

    let input_size = DETECTOR_INPUT_SIZE as usize;
    let heads = yunet::parse_outputs(&views, input_size)?;
    let raw = yunet::decode_detections(&heads, options.score_threshold, input_size);
    log::debug!("yunet: {} candidates above {:.2}", raw.len(), options.score_threshold);

    let detections = raw
        .into_iter()
        .map(|d| to_source(&letterbox, &d))
        .collect();

    Ok(nms(detections, options.nms_threshold))
}

fn to_source(letterbox: &Letterbox, raw: &yunet::RawDetection) -> Detection {
    let mut landmarks = [0.0f32; 10];
    for p in 0..5 {
        landmarks[p * 2] = letterbox.source_x(raw.landmarks[p * 2]);
        landmarks[p * 2 + 1] = letterbox.source_y(raw.landmarks[p * 2 + 1]);
    }

    Detection {
        bbox: [
            letterbox.source_x(raw.bbox[0]),
            letterbox.source_y(raw.bbox[1]),
            letterbox.source_len(raw.bbox[2]),
            letterbox.source_len(raw.bbox[3]),
        ],
        score: raw.score,
        landmarks,
    }
}
