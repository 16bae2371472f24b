//! Input preparation shared by the detector and the recogniser.

use anyhow::Result;
use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use ndarray::Array4;

/// Placement of a source image inside a square, zero-padded model canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub size: u32,
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub width: u32,
    pub height: u32,
}

impl Letterbox {
    /// Fit a `width` x `height` image into a `size` x `size` canvas, centred.
    pub fn fit(width: u32, height: u32, size: u32) -> Self {
        let max_dim = width.max(height).max(1);
        let scale = size as f32 / max_dim as f32;
        let width = ((width as f32 * scale) as u32).clamp(1, size);
        let height = ((height as f32 * scale) as u32).clamp(1, size);
        Self {
            size,
            scale,
            offset_x: (size - width) / 2,
            offset_y: (size - height) / 2,
            width,
            height,
        }
    }

    pub fn apply(&self, img: &DynamicImage) -> RgbImage {
        let resized = img
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgb8();
        let mut canvas = RgbImage::new(self.size, self.size);
        image::imageops::overlay(
            &mut canvas,
            &resized,
            self.offset_x as i64,
            self.offset_y as i64,
        );
        canvas
    }

    /// Canvas-normalised x (0..1) back to source pixels.
    pub fn source_x(&self, x: f32) -> f32 {
        (x * self.size as f32 - self.offset_x as f32) / self.scale
    }

    pub fn source_y(&self, y: f32) -> f32 {
        (y * self.size as f32 - self.offset_y as f32) / self.scale
    }

    pub fn source_len(&self, len: f32) -> f32 {
        len * self.size as f32 / self.scale
    }
}

/// Pack an RGB image into a `[1, 3, H, W]` BGR planar tensor with raw 0-255 values.
pub fn bgr_planar(img: &RgbImage) -> Result<Array4<f32>> {
    let (width, height) = img.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0.0f32; 3 * plane];

    for (i, px) in img.pixels().enumerate() {
        data[i] = px[2] as f32;
        data[plane + i] = px[1] as f32;
        data[2 * plane + i] = px[0] as f32;
    }

    Ok(Array4::from_shape_vec(
        (1, 3, height as usize, width as usize),
        data,
    )?)
}

pub fn is_empty(img: &DynamicImage) -> bool {
    let (w, h) = img.dimensions();
    w == 0 || h == 0
}
