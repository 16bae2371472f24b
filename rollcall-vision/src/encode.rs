use anyhow::Result;
use image::{imageops::FilterType, DynamicImage};
use ort::{session::Session, value::Value};

use crate::face::Embedding;
use crate::preprocess;

/// SFace takes `[1, 3, 112, 112]` BGR in [0, 255].
pub const RECOGNIZER_INPUT_SIZE: u32 = 112;

/// Encode an aligned face crop with SFace.
///
/// Raw SFace output is returned unless `normalize` is set, in which case the
/// vector is scaled to unit length. Distance thresholds depend on which one
/// the gallery was built with.
pub fn encode_face(session: &mut Session, face_img: &DynamicImage, normalize: bool) -> Result<Embedding> {
    let size = RECOGNIZER_INPUT_SIZE;
    let face_rgb = face_img
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();
    let input_tensor = Value::from_array(preprocess::bgr_planar(&face_rgb)?)?;

    let outputs = session.run(ort::inputs![input_tensor])?;
    let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;

    // Expecting shape [1, D]
    let dim = if shape.len() == 2 {
        shape[1] as usize
    } else {
        data.len()
    };
    if dim == 0 || dim > data.len() {
        anyhow::bail!("unexpected recognizer output shape {:?}", &shape[..]);
    }

    let embedding = Embedding::new(data[..dim].to_vec());
    Ok(if normalize {
        embedding.l2_normalized()
    } else {
        embedding
    })
}
