//! Tensor preparation for the PaddleOCR models
//!
//! Handles image resizing, normalization, and NCHW conversion for the
//! detection and recognition networks.

use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;

/// Normalization applied to detection input, per RGB channel
pub const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Recognition input maps [0, 255] to [-1, 1]
pub const REC_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
pub const REC_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Detection input plus the factors mapping model coordinates back to the image
#[derive(Debug)]
pub struct DetectionInput {
    pub tensor: Array4<f32>,
    pub scale_x: f32,
    pub scale_y: f32,
}

/// Convert a grayscale image to a normalized 3-channel NCHW tensor (batch size 1)
///
/// The single channel is replicated into R, G and B.
pub fn gray_to_nchw(image: &GrayImage, mean: &[f32; 3], std: &[f32; 3]) -> Array4<f32> {
    let (w, h) = image.dimensions();
    Array4::from_shape_fn((1, 3, h as usize, w as usize), |(_, c, y, x)| {
        let v = image.get_pixel(x as u32, y as u32).0[0] as f32 / 255.0;
        (v - mean[c]) / std[c]
    })
}

/// Round a dimension to the nearest multiple of 32, never below 32
fn round_to_32(v: f32) -> u32 {
    (((v / 32.0).round() as u32) * 32).max(32)
}

/// Resize so the longest side fits `limit_side` and both sides are multiples of 32
pub fn detection_input(image: &GrayImage, limit_side: u32) -> DetectionInput {
    let (w, h) = image.dimensions();
    let longest = w.max(h) as f32;
    let ratio = if longest > limit_side as f32 {
        limit_side as f32 / longest
    } else {
        1.0
    };

    let new_w = round_to_32(w as f32 * ratio);
    let new_h = round_to_32(h as f32 * ratio);

    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    DetectionInput {
        tensor: gray_to_nchw(&resized, &DET_MEAN, &DET_STD),
        scale_x: w as f32 / new_w as f32,
        scale_y: h as f32 / new_h as f32,
    }
}

/// Resize a text crop to a fixed height, keep its aspect ratio and pad the
/// right side with zeros up to a width that holds the whole line
pub fn recognition_input(crop: &GrayImage, height: u32, max_width: u32) -> Array4<f32> {
    let height = height.max(1);
    let max_width = max_width.max(1);
    let (w, h) = crop.dimensions();
    let aspect = w as f32 / h.max(1) as f32;

    let target_w = ((height as f32 * aspect).ceil() as u32).clamp(1, max_width);
    let resized = imageops::resize(crop, target_w, height, FilterType::Triangle);

    // Pad to the batch width; at least as wide as the model's nominal 320 input
    let padded_w = target_w.max(320.min(max_width)) as usize;
    let content = gray_to_nchw(&resized, &REC_MEAN, &REC_STD);

    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, padded_w));
    tensor
        .slice_mut(ndarray::s![.., .., .., ..target_w as usize])
        .assign(&content);
    tensor
}
