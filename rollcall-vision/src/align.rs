use anyhow::Result;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::face::Detection;

/// ArcFace reference eye positions for a 112x112 crop.
const REF_LEFT_EYE: (f32, f32) = (38.2946, 51.6963);
const REF_RIGHT_EYE: (f32, f32) = (73.5318, 51.5014);
const REF_SIZE: f32 = 112.0;

/// Rotation + uniform scale + translation, mapping source pixels to crop pixels.
#[derive(Debug, Clone, Copy)]
struct Similarity {
    a: f32,
    b: f32,
    tx: f32,
    ty: f32,
}

impl Similarity {
    fn from_eyes(left: (f32, f32), right: (f32, f32), size: u32) -> Result<Self> {
        let dx = right.0 - left.0;
        let dy = right.1 - left.1;
        let eye_dist = (dx * dx + dy * dy).sqrt();
        if !eye_dist.is_finite() || eye_dist < 1e-3 {
            anyhow::bail!("degenerate eye landmarks");
        }

        let out_scale = size as f32 / REF_SIZE;
        let ref_dx = REF_RIGHT_EYE.0 - REF_LEFT_EYE.0;
        let ref_dy = REF_RIGHT_EYE.1 - REF_LEFT_EYE.1;
        let ref_dist = (ref_dx * ref_dx + ref_dy * ref_dy).sqrt();

        let scale = out_scale * ref_dist / eye_dist;
        let angle = dy.atan2(dx);
        let a = scale * angle.cos();
        let b = scale * angle.sin();

        let centre = ((left.0 + right.0) / 2.0, (left.1 + right.1) / 2.0);
        let target = (
            (REF_LEFT_EYE.0 + REF_RIGHT_EYE.0) / 2.0 * out_scale,
            (REF_LEFT_EYE.1 + REF_RIGHT_EYE.1) / 2.0 * out_scale,
        );

        // [a b; -b a] * p + t
        Ok(Self {
            a,
            b,
            tx: target.0 - (a * centre.0 + b * centre.1),
            ty: target.1 - (-b * centre.0 + a * centre.1),
        })
    }

    #[cfg(test)]
    fn forward(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.b * y + self.tx,
            -self.b * x + self.a * y + self.ty,
        )
    }

    fn inverse(&self, x: f32, y: f32) -> (f32, f32) {
        let det = self.a * self.a + self.b * self.b;
        let (u, v) = (x - self.tx, y - self.ty);
        ((self.a * u - self.b * v) / det, (self.b * u + self.a * v) / det)
    }
}

/// Align and crop a face to `size` x `size` using the eye landmarks.
/// Pixels falling outside the source are left black.
pub fn align_face(img: &DynamicImage, detection: &Detection, size: u32) -> Result<DynamicImage> {
    let transform = Similarity::from_eyes(detection.left_eye(), detection.right_eye(), size)?;
    let (img_w, img_h) = img.dimensions();
    let mut output = RgbImage::new(size, size);

    for out_y in 0..size {
        for out_x in 0..size {
            let (sx, sy) = transform.inverse(out_x as f32, out_y as f32);
            if sx >= 0.0 && sy >= 0.0 && sx < img_w as f32 && sy < img_h as f32 {
                output.put_pixel(out_x, out_y, bilinear(img, sx, sy));
            }
        }
    }

    Ok(DynamicImage::ImageRgb8(output))
}

fn bilinear(img: &DynamicImage, x: f32, y: f32) -> Rgb<u8> {
    let (w, h) = img.dimensions();
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let taps = [
        (img.get_pixel(x0, y0), (1.0 - fx) * (1.0 - fy)),
        (img.get_pixel(x1, y0), fx * (1.0 - fy)),
        (img.get_pixel(x0, y1), (1.0 - fx) * fy),
        (img.get_pixel(x1, y1), fx * fy),
    ];

    let mut rgb = [0u8; 3];
    for (c, out) in rgb.iter_mut().enumerate() {
        let v: f32 = taps.iter().map(|(p, w)| p[c] as f32 * w).sum();
        *out = v.round().clamp(0.0, 255.0) as u8;
    }
    Rgb(rgb)
}
