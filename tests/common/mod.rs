#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rollcall::config::Config;
use rollcall::{FaceExtractor, FaceRecord};

/// Extractor keyed on the red channel of the top-left pixel.
///
/// Unknown tags yield no faces. The tag `255` simulates a model failure.
#[derive(Default)]
pub struct FakeExtractor {
    faces: HashMap<u8, Vec<Vec<f32>>>,
    calls: AtomicUsize,
}

pub const FAILING_TAG: u8 = 255;

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tag: u8, faces: &[&[f32]]) -> Self {
        self.faces
            .insert(tag, faces.iter().map(|f| f.to_vec()).collect());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaceExtractor for FakeExtractor {
    fn extract_faces(&self, image: &DynamicImage) -> anyhow::Result<Vec<FaceRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tag = image.to_rgb8().get_pixel(0, 0)[0];
        if tag == FAILING_TAG {
            anyhow::bail!("inference failed");
        }
        Ok(self
            .faces
            .get(&tag)
            .map(|faces| faces.iter().cloned().map(FaceRecord::from_embedding).collect())
            .unwrap_or_default())
    }
}

/// A small PNG whose pixels carry `tag` in the red channel.
pub fn png(tag: u8) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([tag, 0, 0])));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn write_reference(dir: &Path, name: &str, tag: u8) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, png(tag)).unwrap();
}

pub fn config_for(references: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.gallery.references_dir = references.to_path_buf();
    cfg
}
