use std::path::PathBuf;

use anyhow::{Context, Result};
use image::DynamicImage;
use log::warn;
use ort::session::Session;
use parking_lot::Mutex;

use crate::align::align_face;
use crate::detect::{detect_faces, DetectorOptions};
use crate::encode::{encode_face, RECOGNIZER_INPUT_SIZE};
use crate::face::{Detection, Embedding, FaceRecord};
use crate::model;

/// Turns a decoded image into zero or more faces with embeddings.
///
/// Implementations must be deterministic for a fixed model. A valid image
/// with no faces yields an empty vector, never an error. Faces are ordered
/// by detection confidence when the implementation has one.
pub trait FaceExtractor: Send + Sync {
    fn extract_faces(&self, image: &DynamicImage) -> Result<Vec<FaceRecord>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorOptions {
    pub detector_model: PathBuf,
    pub recognizer_model: PathBuf,
    pub detector: DetectorOptions,
    pub normalize_embeddings: bool,
}

/// Full pipeline: detect faces → align → encode, on ONNX Runtime.
pub struct OnnxExtractor {
    detector: Mutex<Session>,
    encoder: Mutex<Session>,
    options: ExtractorOptions,
}

impl OnnxExtractor {
    pub fn new(options: ExtractorOptions) -> Result<Self> {
        Ok(Self {
            detector: Mutex::new(model::detector_session(&options.detector_model)?),
            encoder: Mutex::new(model::recog_session(&options.recognizer_model)?),
            options,
        })
    }
}

impl FaceExtractor for OnnxExtractor {
    fn extract_faces(&self, image: &DynamicImage) -> Result<Vec<FaceRecord>> {
        let detections = {
            let mut detector = self.detector.lock();
            detect_faces(&mut detector, image, self.options.detector)
                .context("detecting faces")?
        };
        if detections.is_empty() {
            return Ok(Vec::new());
        }

        let mut encoder = self.encoder.lock();
        encode_each(detections, |detection| {
            let crop =
                align_face(image, detection, RECOGNIZER_INPUT_SIZE).context("aligning face")?;
            encode_face(&mut encoder, &crop, self.options.normalize_embeddings)
                .context("encoding face")
        })
    }
}

/// Encode every detection, dropping the ones that fail with a warning.
///
/// Only when no detection survives is the first failure returned, so a
/// broken encoder still surfaces as an error rather than as an empty image.
fn encode_each<F>(detections: Vec<Detection>, mut encode: F) -> Result<Vec<FaceRecord>>
where
    F: FnMut(&Detection) -> Result<Embedding>,
{
    let mut faces = Vec::with_capacity(detections.len());
    let mut first_err = None;

    for (idx, detection) in detections.into_iter().enumerate() {
        match encode(&detection) {
            Ok(embedding) => faces.push(FaceRecord {
                embedding,
                detection: Some(detection),
            }),
            Err(e) => {
                warn!("skipping face {} (score {:.2}): {:#}", idx, detection.score, e);
                first_err.get_or_insert(e);
            }
        }
    }

    match first_err {
        Some(e) if faces.is_empty() => Err(e),
        _ => Ok(faces),
    }
}
