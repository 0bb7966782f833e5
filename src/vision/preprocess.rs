//! Image preprocessing ahead of text detection
//!
//! Loads the source image and reduces it to a single-channel, binarized and
//! slightly blurred buffer. Handwriting on paper survives this well and the
//! detector sees far less background noise.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::filter::separable_filter_equal;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::PreprocessingConfig;
use crate::error::LoadError;

/// Binarize-and-blur preprocessor
#[derive(Debug, Clone)]
pub struct Preprocessor {
    threshold: u8,
    kernel: Vec<f32>,
}

impl Preprocessor {
    pub fn new(settings: &PreprocessingConfig) -> Self {
        let mut size = settings.blur_kernel.max(1);
        if size % 2 == 0 {
            warn!("Blur kernel size {} is even, using {}", size, size + 1);
            size += 1;
        }

        Self {
            threshold: settings.threshold,
            kernel: gaussian_kernel(size),
        }
    }

    /// Decode an image file
    pub fn load(path: &Path) -> Result<DynamicImage, LoadError> {
        image::open(path).map_err(|source| LoadError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Grayscale, threshold and blur an already decoded image
    pub fn preprocess(&self, image: &DynamicImage) -> GrayImage {
        let gray = to_grayscale(image);
        let binary = binarize(&gray, self.threshold);

        debug!(
            "Preprocessed {}x{} image (threshold {}, kernel {})",
            gray.width(),
            gray.height(),
            self.threshold,
            self.kernel.len()
        );

        if self.kernel.len() <= 1 {
            return binary;
        }
        blur(&binary, &self.kernel)
    }

    /// Load an image and preprocess it, keeping the decoded source around
    pub fn load_and_preprocess(&self, path: &Path) -> Result<(DynamicImage, GrayImage), LoadError> {
        let image = Self::load(path)?;
        let processed = self.preprocess(&image);
        Ok((image, processed))
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(&PreprocessingConfig::default())
    }
}

/// Convert to grayscale with BT.601 luminance weights, dropping alpha
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let gray = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([gray.round() as u8])
    })
}

/// Pixels at or above `level` become 255, everything else 0
pub fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    if level == 0 {
        return GrayImage::from_pixel(gray.width(), gray.height(), Luma([255]));
    }
    // `Binary` keeps strictly greater values
    threshold(gray, level - 1, ThresholdType::Binary)
}

/// Separable blur with `kernel` in both directions, rounded to nearest
///
/// Filtering `u8` directly would truncate after each pass. Borders replicate
/// the edge pixel.
pub fn blur(gray: &GrayImage, kernel: &[f32]) -> GrayImage {
    let float: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| Luma([gray.get_pixel(x, y)[0] as f32]));
    let blurred = separable_filter_equal(&float, kernel);

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([blurred.get_pixel(x, y)[0].round().clamp(0.0, 255.0) as u8])
    })
}

/// 1-D Gaussian kernel of odd `size`
///
/// Small kernels use the fixed binomial weights, larger ones derive sigma from
/// the size as `0.3 * ((size - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(size: u32) -> Vec<f32> {
    match size {
        0 | 1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
        _ => {
            let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
            let center = (size / 2) as f32;
            let weights: Vec<f32> = (0..size)
                .map(|i| {
                    let d = i as f32 - center;
                    (-(d * d) / (2.0 * sigma * sigma)).exp()
                })
                .collect();
            let sum: f32 = weights.iter().sum();
            weights.into_iter().map(|w| w / sum).collect()
        }
    }
}
