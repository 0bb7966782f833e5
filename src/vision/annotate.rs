//! Box and label drawing for recognized text
//!
//! Labels are rendered with `ab_glyph`, using the bundled DejaVu Sans unless
//! a font file is configured. Without a usable font only the boxes are drawn.

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::{debug, warn};

use super::DetectionResult;
use crate::config::AnnotationConfig;

/// Bundled label font
const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// System fonts tried when neither the configured nor the bundled font loads
const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Keep printable ASCII and basic Cyrillic (А..я), then trim whitespace
pub fn sanitize_label(text: &str) -> String {
    text.chars()
        .filter(|&c| matches!(c, ' '..='~' | '\u{0410}'..='\u{044F}'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Draws detection boxes and labels onto an image
pub struct Annotator {
    color: Rgb<u8>,
    thickness: u32,
    label_scale: f32,
    label_offset: i32,
    font: Option<FontArc>,
}

impl Annotator {
    /// Create an annotator with the configured font, the bundled one otherwise
    pub fn new(settings: &AnnotationConfig) -> Self {
        let font = load_font(settings.font_path.as_deref());
        if font.is_none() {
            warn!("No usable font found, labels will not be drawn");
        }
        Self::with_font(settings, font)
    }

    /// Create an annotator with an explicit font (or none)
    pub fn with_font(settings: &AnnotationConfig, font: Option<FontArc>) -> Self {
        Self {
            color: Rgb(settings.color),
            thickness: settings.thickness.max(1),
            label_scale: settings.label_scale,
            label_offset: settings.label_offset,
            font,
        }
    }

    /// Draw every detection in place, returning the number of boxes drawn
    pub fn annotate(&self, image: &mut RgbImage, detections: &[DetectionResult]) -> usize {
        let mut drawn = 0;

        for detection in detections {
            let top_left = detection.bounding_box.top_left();
            let bottom_right = detection.bounding_box.bottom_right();

            self.draw_box(image, top_left, bottom_right);
            drawn += 1;

            let label = sanitize_label(&detection.text);
            if !label.is_empty() {
                self.draw_label(image, top_left, &label);
            }
        }

        debug!("Annotated {} detections", drawn);
        drawn
    }

    fn draw_box(&self, image: &mut RgbImage, (x0, y0): (i32, i32), (x1, y1): (i32, i32)) {
        let (left, right) = (x0.min(x1), x0.max(x1));
        let (top, bottom) = (y0.min(y1), y0.max(y1));
        let width = (right - left) as u32 + 1;
        let height = (bottom - top) as u32 + 1;

        // Grow outwards one pixel per ring
        for ring in 0..self.thickness {
            let r = ring as i32;
            let rect = Rect::at(left - r, top - r).of_size(width + 2 * ring, height + 2 * ring);
            draw_hollow_rect_mut(image, rect, self.color);
        }
    }

    fn draw_label(&self, image: &mut RgbImage, (x, y): (i32, i32), label: &str) {
        let Some(font) = &self.font else {
            return;
        };
        // imageproc positions text by its top edge; place the baseline above the box
        let top = y - self.label_offset - self.label_scale.round() as i32;
        draw_text_mut(image, self.color, x, top, PxScale::from(self.label_scale), font, label);
    }
}

/// Configured font, then the bundled one, then well-known system fonts
fn load_font(configured: Option<&Path>) -> Option<FontArc> {
    if let Some(path) = configured {
        match read_font(path) {
            Some(font) => return Some(font),
            None => warn!("Configured font {:?} is unusable, using the bundled font", path),
        }
    }

    match FontArc::try_from_slice(EMBEDDED_FONT) {
        Ok(font) => return Some(font),
        Err(e) => warn!("Bundled font could not be parsed: {}", e),
    }

    FALLBACK_FONTS
        .iter()
        .find_map(|path| read_font(Path::new(path)))
}

fn read_font(path: &Path) -> Option<FontArc> {
    let bytes = std::fs::read(path).ok()?;
    match FontArc::try_from_vec(bytes) {
        Ok(font) => {
            debug!("Using label font {:?}", path);
            Some(font)
        }
        Err(e) => {
            warn!("Font {:?} could not be parsed: {}", path, e);
            None
        }
    }
}
