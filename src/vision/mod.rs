//! Vision/OCR Layer
//!
//! Preprocesses images, detects and recognizes text, and draws the results
//! back onto the image for display.
//! The detection capability is a trait; `PaddleDetector` runs PaddleOCR
//! models via ONNX Runtime.

pub mod annotate;
pub mod models;
pub mod paddle;
pub mod preprocess;
pub mod tensor;
pub mod thumbnail;

use image::GrayImage;

use crate::error::DetectionError;

pub use annotate::{sanitize_label, Annotator};
pub use paddle::PaddleDetector;
pub use preprocess::Preprocessor;
pub use thumbnail::encode_thumbnail;

/// Quadrilateral around a text fragment, in image pixel coordinates
///
/// Corner order is top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad(pub [(f32, f32); 4]);

impl Quad {
    /// Axis-aligned quad spanning two corners
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self([(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    /// Top-left corner truncated to whole pixels
    pub fn top_left(&self) -> (i32, i32) {
        let (x, y) = self.0[0];
        (x as i32, y as i32)
    }

    /// Bottom-right corner truncated to whole pixels
    pub fn bottom_right(&self) -> (i32, i32) {
        let (x, y) = self.0[2];
        (x as i32, y as i32)
    }
}

/// One recognized text fragment
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub bounding_box: Quad,
    /// Recognized text, unsanitized
    pub text: String,
    /// Recognition confidence (0.0 - 1.0)
    pub confidence: f32,
}

/// Text detection and recognition capability
pub trait TextDetector {
    /// Detect text in a preprocessed image
    ///
    /// `language` is a short language code used to pick the recognizer.
    /// Results come back in the detector's own order.
    fn detect(
        &mut self,
        image: &GrayImage,
        language: &str,
        use_acceleration: bool,
    ) -> Result<Vec<DetectionResult>, DetectionError>;
}
