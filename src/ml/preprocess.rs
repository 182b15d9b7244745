//! Image to tensor conversion shared by the ONNX backends.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;

use crate::error::{Result, VisionError};

/// Per-channel normalization `(pixel - mean) / std`
#[derive(Clone, Copy, Debug)]
pub(crate) struct Normalization {
    pub mean: f32,
    pub std: f32,
}

impl Normalization {
    /// Maps [0, 255] to [0, 1]
    pub const UNIT: Self = Self { mean: 0.0, std: 255.0 };
    /// UltraFace input normalization
    pub const ULTRAFACE: Self = Self { mean: 127.0, std: 128.0 };
    /// Maps [0, 255] to roughly [-1, 1]
    pub const SYMMETRIC: Self = Self { mean: 127.5, std: 128.0 };

    fn apply(&self, value: u8) -> f32 {
        (value as f32 - self.mean) / self.std
    }
}

/// Resize and convert to a CHW tensor (channels first), shape (1, 3, H, W)
pub(crate) fn to_nchw(
    image: &RgbImage,
    target_width: u32,
    target_height: u32,
    norm: Normalization,
) -> Result<Array4<f32>> {
    let resized = image::imageops::resize(image, target_width, target_height, FilterType::Triangle);
    let (w, h) = (target_width as usize, target_height as usize);
    let channel_stride = w * h;
    let mut output = vec![0.0f32; 3 * channel_stride];

    for (x, y, pixel) in resized.enumerate_pixels() {
        let pixel_idx = y as usize * w + x as usize;
        for c in 0..3 {
            output[c * channel_stride + pixel_idx] = norm.apply(pixel[c]);
        }
    }

    Array4::from_shape_vec((1, 3, h, w), output)
        .map_err(|e| VisionError::Inference(format!("Failed to create input array: {}", e)))
}

/// Resize and convert to an HWC tensor (channels last), shape (1, H, W, 3)
pub(crate) fn to_nhwc(
    image: &RgbImage,
    target_width: u32,
    target_height: u32,
    norm: Normalization,
) -> Result<Array4<f32>> {
    let resized = image::imageops::resize(image, target_width, target_height, FilterType::Triangle);
    let (w, h) = (target_width as usize, target_height as usize);

    let output: Vec<f32> = resized
        .pixels()
        .flat_map(|p| p.0.map(|v| norm.apply(v)))
        .collect();

    Array4::from_shape_vec((1, h, w, 3), output)
        .map_err(|e| VisionError::Inference(format!("Failed to create input array: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_nchw_layout() {
        let image = RgbImage::from_pixel(4, 2, Rgb([255, 0, 51]));
        let tensor = to_nchw(&image, 4, 2, Normalization::UNIT).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 2, 4]);
        assert_eq!(tensor[[0, 0, 1, 3]], 1.0);
        assert_eq!(tensor[[0, 1, 0, 0]], 0.0);
        assert!((tensor[[0, 2, 0, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_nhwc_layout() {
        let image = RgbImage::from_pixel(3, 3, Rgb([0, 255, 0]));
        let tensor = to_nhwc(&image, 2, 2, Normalization::UNIT).unwrap();

        assert_eq!(tensor.shape(), &[1, 2, 2, 3]);
        assert_eq!(tensor[[0, 1, 1, 0]], 0.0);
        assert_eq!(tensor[[0, 1, 1, 1]], 1.0);
    }
}
