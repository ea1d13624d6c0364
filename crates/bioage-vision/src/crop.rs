//! Square face crop for the age regressor.
//!
//! The regressor expects the face centred in a 96×96 window with some margin.
//! The window is sampled straight from the source still by inverse mapping
//! each output pixel, with bilinear interpolation and black outside the frame.

use crate::detector::BoundingBox;
use image::{Rgb, RgbImage};

/// Context kept around the detected box, as a multiple of its longer side.
const CROP_MARGIN: f32 = 1.5;

/// A scale-only transform centred on a face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropWindow {
    pub center: (f32, f32),
    /// Output pixels per source pixel.
    pub scale: f32,
}

impl CropWindow {
    /// Window that fits the face plus margin into `out_size` pixels.
    pub fn around(face: &BoundingBox, out_size: u32) -> Self {
        let side = face.width.max(face.height).max(1.0) * CROP_MARGIN;
        Self {
            center: face.center(),
            scale: out_size as f32 / side,
        }
    }

    /// Source position for an output pixel.
    fn source(&self, out_x: f32, out_y: f32, half: f32) -> (f32, f32) {
        (
            (out_x - half) / self.scale + self.center.0,
            (out_y - half) / self.scale + self.center.1,
        )
    }
}

/// Sample an `out_size`×`out_size` crop from `image`.
pub fn crop_face(image: &RgbImage, window: &CropWindow, out_size: u32) -> RgbImage {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let half = out_size as f32 / 2.0;

    let texel = |x: i64, y: i64| -> [f32; 3] {
        if x >= 0 && x < width && y >= 0 && y < height {
            let p = image.get_pixel(x as u32, y as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32]
        } else {
            [0.0; 3]
        }
    };

    RgbImage::from_fn(out_size, out_size, |ox, oy| {
        let (sx, sy) = window.source(ox as f32, oy as f32, half);
        let (x0, y0) = (sx.floor() as i64, sy.floor() as i64);
        let (fx, fy) = (sx - x0 as f32, sy - y0 as f32);

        let corners = [
            (texel(x0, y0), (1.0 - fx) * (1.0 - fy)),
            (texel(x0 + 1, y0), fx * (1.0 - fy)),
            (texel(x0, y0 + 1), (1.0 - fx) * fy),
            (texel(x0 + 1, y0 + 1), fx * fy),
        ];
        let mut out = [0u8; 3];
        for (c, value) in out.iter_mut().enumerate() {
            let v: f32 = corners.iter().map(|(px, w)| px[c] * w).sum();
            *value = v.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    })
}
