//! Frame type and pixel conversion: YUYV/GREY/Y16/RGB3 to RGB, dark detection.

use image::RgbImage;

/// Luma below this counts as a dark pixel.
const DARK_LUMA: u8 = 32;

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed, 2 bytes per pixel.
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
    /// Packed 24-bit RGB.
    Rgb24,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Grey => 1,
            PixelFormat::Yuyv | PixelFormat::Y16 => 2,
            PixelFormat::Rgb24 => 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid {format:?} length: expected {expected}, got {actual}")]
    InvalidLength {
        format: PixelFormat,
        expected: usize,
        actual: usize,
    },
    #[error("odd frame width {0} for YUYV")]
    OddWidth(u32),
}

/// A captured colour frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB bytes (width * height * 3).
    pub rgb: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

impl Frame {
    /// Average luma (0.0–255.0).
    pub fn mean_luma(&self) -> f32 {
        let pixels = self.rgb.len() / 3;
        if pixels == 0 {
            return 0.0;
        }
        let total: u64 = self.rgb.chunks_exact(3).map(|p| luma(p[0], p[1], p[2]) as u64).sum();
        total as f32 / pixels as f32
    }

    pub fn into_image(self) -> Result<RgbImage, FrameError> {
        let (width, height, actual) = (self.width, self.height, self.rgb.len());
        RgbImage::from_raw(width, height, self.rgb).ok_or(FrameError::InvalidLength {
            format: PixelFormat::Rgb24,
            expected: width as usize * height as usize * 3,
            actual,
        })
    }
}

/// Convert a raw buffer in `format` to packed RGB.
pub fn to_rgb(format: PixelFormat, buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = width as usize * height as usize;
    let expected = pixels * format.bytes_per_pixel();
    if buf.len() < expected {
        return Err(FrameError::InvalidLength {
            format,
            expected,
            actual: buf.len(),
        });
    }
    let buf = &buf[..expected];

    Ok(match format {
        PixelFormat::Rgb24 => buf.to_vec(),
        PixelFormat::Grey => buf.iter().flat_map(|&y| [y, y, y]).collect(),
        // Keep the high byte of each little-endian sample.
        PixelFormat::Y16 => buf.chunks_exact(2).flat_map(|s| [s[1], s[1], s[1]]).collect(),
        PixelFormat::Yuyv => {
            if width % 2 != 0 {
                return Err(FrameError::OddWidth(width));
            }
            yuyv_to_rgb(buf)
        }
    })
}

/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]. BT.601 limited range.
fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);
    for quad in yuyv.chunks_exact(4) {
        let (u, v) = (quad[1], quad[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(quad[0], u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(quad[2], u, v));
    }
    rgb
}

fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = 298 * (y as i32 - 16);
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clip = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [clip(c + 409 * e), clip(c - 100 * d - 208 * e), clip(c + 516 * d)]
}

fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32) >> 8) as u8
}

/// True if more than `threshold_pct` of pixels have luma below 32.
pub fn is_dark_frame(rgb: &[u8], threshold_pct: f32) -> bool {
    let pixels = rgb.len() / 3;
    if pixels == 0 {
        return true;
    }
    let dark = rgb
        .chunks_exact(3)
        .filter(|p| luma(p[0], p[1], p[2]) < DARK_LUMA)
        .count();
    (dark as f32 / pixels as f32) > threshold_pct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ycbcr_reference_points() {
        assert_eq!(ycbcr_to_rgb(16, 128, 128), [0, 0, 0]);
        assert_eq!(ycbcr_to_rgb(235, 128, 128), [255, 255, 255]);
        assert_eq!(ycbcr_to_rgb(126, 128, 128), [128, 128, 128]);
        // Strong V pushes red up and green down.
        let [r, g, b] = ycbcr_to_rgb(126, 128, 240);
        assert!(r > 200 && g < 128 && b == 128);
    }

    #[test]
    fn test_yuyv_to_rgb_shares_chroma() {
        let rgb = to_rgb(PixelFormat::Yuyv, &[16, 128, 235, 128], 2, 1).unwrap();
        assert_eq!(rgb, vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_yuyv_rejects_short_and_odd() {
        assert!(matches!(
            to_rgb(PixelFormat::Yuyv, &[100, 128], 2, 1),
            Err(FrameError::InvalidLength { expected: 4, actual: 2, .. })
        ));
        assert!(matches!(to_rgb(PixelFormat::Yuyv, &[0; 6], 3, 1), Err(FrameError::OddWidth(3))));
    }

    #[test]
    fn test_grey_and_y16_expand() {
        assert_eq!(to_rgb(PixelFormat::Grey, &[7, 9], 2, 1).unwrap(), vec![7, 7, 7, 9, 9, 9]);
        // 0x1234 little-endian → high byte 0x12
        assert_eq!(to_rgb(PixelFormat::Y16, &[0x34, 0x12], 1, 1).unwrap(), vec![0x12; 3]);
    }

    #[test]
    fn test_rgb24_truncates_padding() {
        let rgb = to_rgb(PixelFormat::Rgb24, &[1, 2, 3, 99, 99], 1, 1).unwrap();
        assert_eq!(rgb, vec![1, 2, 3]);
    }

    #[test]
    fn test_dark_frame() {
        assert!(is_dark_frame(&[0u8; 300], 0.95));
        assert!(!is_dark_frame(&[128u8; 300], 0.95));
        assert!(is_dark_frame(&[], 0.95));

        // 96 dark pixels and 4 bright: 96% > 95%
        let mut rgb = vec![0u8; 96 * 3];
        rgb.extend(vec![200u8; 4 * 3]);
        assert!(is_dark_frame(&rgb, 0.95));

        // 94 dark pixels and 6 bright
        let mut rgb = vec![0u8; 94 * 3];
        rgb.extend(vec![200u8; 6 * 3]);
        assert!(!is_dark_frame(&rgb, 0.95));
    }

    #[test]
    fn test_frame_into_image() {
        let frame = Frame { rgb: vec![10; 2 * 2 * 3], width: 2, height: 2, sequence: 0 };
        assert_eq!(frame.mean_luma(), 10.0);
        let image = frame.into_image().unwrap();
        assert_eq!(image.dimensions(), (2, 2));

        let short = Frame { rgb: vec![0; 5], width: 2, height: 2, sequence: 0 };
        assert!(short.into_image().is_err());
    }
}
