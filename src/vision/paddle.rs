//! PaddleOCR text detection and recognition via ONNX Runtime
//!
//! Detection runs a DBNet model producing a per-pixel text probability map;
//! connected regions of that map become boxes. Each box is cropped and read
//! by a CRNN recognizer whose output is CTC-decoded against the character
//! dictionary of the language's script family.

use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use super::models::{ModelKind, ModelManager, OnnxSession};
use super::tensor::{detection_input, recognition_input};
use super::{DetectionResult, Quad, TextDetector};
use crate::config::DetectionConfig;
use crate::error::DetectionError;
use crate::language::{Language, ScriptFamily};

/// Boxes whose tops differ by less than this are treated as one line
const SAME_LINE_TOLERANCE: f32 = 10.0;

/// Axis-aligned box with its detection score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub score: f32,
}

struct Recognizer {
    session: OnnxSession,
    charset: Vec<String>,
}

/// `TextDetector` backed by PaddleOCR ONNX models
pub struct PaddleDetector {
    models: ModelManager,
    settings: DetectionConfig,
    /// Detection session and the acceleration flag it was built with
    detector: Option<(bool, OnnxSession)>,
    recognizers: HashMap<(ScriptFamily, bool), Recognizer>,
}

impl PaddleDetector {
    pub fn new(settings: DetectionConfig) -> Result<Self> {
        let models = ModelManager::new(&settings)?;
        Ok(Self::with_models(models, settings))
    }

    pub fn with_models(models: ModelManager, mut settings: DetectionConfig) -> Self {
        settings.rec_height = settings.rec_height.max(1);
        settings.rec_max_width = settings.rec_max_width.max(1);
        settings.det_limit_side = settings.det_limit_side.max(32);

        Self {
            models,
            settings,
            detector: None,
            recognizers: HashMap::new(),
        }
    }

    fn detection_session(&mut self, use_gpu: bool) -> Result<&mut OnnxSession> {
        let stale = !matches!(&self.detector, Some((gpu, _)) if *gpu == use_gpu);
        if stale {
            let path = self.models.ensure_model(ModelKind::Detection)?;
            self.detector = Some((use_gpu, OnnxSession::new(&path, use_gpu)?));
        }
        match &mut self.detector {
            Some((_, session)) => Ok(session),
            None => anyhow::bail!("Detection session was not initialized"),
        }
    }

    fn recognizer(&mut self, family: ScriptFamily, use_gpu: bool) -> Result<&mut Recognizer> {
        let key = (family, use_gpu);
        if !self.recognizers.contains_key(&key) {
            info!("Initializing recognizer for {}", family.model_dir());
            let model = self.models.ensure_model(ModelKind::Recognition(family))?;
            let dict = self.models.ensure_model(ModelKind::Dictionary(family))?;
            let recognizer = Recognizer {
                session: OnnxSession::new(&model, use_gpu)?,
                charset: load_charset(&dict)?,
            };
            self.recognizers.insert(key, recognizer);
        }
        self.recognizers
            .get_mut(&key)
            .context("Recognizer was not initialized")
    }

    /// Find text boxes in image coordinates, in reading order
    fn find_boxes(&mut self, image: &GrayImage, use_gpu: bool) -> Result<Vec<ScoredBox>> {
        let input = detection_input(image, self.settings.det_limit_side);
        let (shape, probs) = self.detection_session(use_gpu)?.run(input.tensor)?;

        let [.., map_h, map_w] = shape[..] else {
            anyhow::bail!("Unexpected detection output shape {:?}", shape);
        };

        let (img_w, img_h) = (image.width() as f32, image.height() as f32);
        let mut boxes: Vec<ScoredBox> = extract_boxes(&probs, map_w, map_h, &self.settings)
            .into_iter()
            .map(|b| ScoredBox {
                x0: (b.x0 * input.scale_x).clamp(0.0, img_w - 1.0),
                y0: (b.y0 * input.scale_y).clamp(0.0, img_h - 1.0),
                x1: (b.x1 * input.scale_x).clamp(0.0, img_w - 1.0),
                y1: (b.y1 * input.scale_y).clamp(0.0, img_h - 1.0),
                score: b.score,
            })
            .collect();

        sort_reading_order(&mut boxes);
        Ok(boxes)
    }

    fn recognize_box(
        &mut self,
        image: &GrayImage,
        b: &ScoredBox,
        family: ScriptFamily,
        use_gpu: bool,
    ) -> Result<(String, f32)> {
        let x = b.x0 as u32;
        let y = b.y0 as u32;
        let w = ((b.x1 - b.x0).ceil() as u32).max(1);
        let h = ((b.y1 - b.y0).ceil() as u32).max(1);
        let crop = image::imageops::crop_imm(image, x, y, w, h).to_image();

        let height = self.settings.rec_height;
        let max_width = self.settings.rec_max_width;
        let recognizer = self.recognizer(family, use_gpu)?;

        let (shape, probs) = recognizer.session.run(recognition_input(&crop, height, max_width))?;
        let [.., steps, classes] = shape[..] else {
            anyhow::bail!("Unexpected recognition output shape {:?}", shape);
        };

        Ok(ctc_decode(&probs, steps, classes, &recognizer.charset))
    }

    fn run(&mut self, image: &GrayImage, family: ScriptFamily, use_gpu: bool) -> Result<Vec<DetectionResult>> {
        let start = Instant::now();
        let boxes = self.find_boxes(image, use_gpu)?;

        let mut results = Vec::with_capacity(boxes.len());
        for b in &boxes {
            let (text, confidence) = self.recognize_box(image, b, family, use_gpu)?;
            if text.is_empty() {
                continue;
            }
            results.push(DetectionResult {
                bounding_box: Quad::from_corners(b.x0, b.y0, b.x1, b.y1),
                text,
                confidence,
            });
        }

        debug!(
            "PaddleOCR found {} boxes, {} with text, in {:?}",
            boxes.len(),
            results.len(),
            start.elapsed()
        );
        Ok(results)
    }
}

impl TextDetector for PaddleDetector {
    fn detect(
        &mut self,
        image: &GrayImage,
        language: &str,
        use_acceleration: bool,
    ) -> Result<Vec<DetectionResult>, DetectionError> {
        let language: Language = language
            .parse()
            .map_err(|e: crate::language::LanguageParseError| {
                DetectionError::UnsupportedLanguage(e.to_string())
            })?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectionError::InvalidImageSize { width, height });
        }

        let family = language.script_family();

        // Fetch models up front so a missing model is reported as such
        self.models
            .ensure_family(family)
            .map_err(|e| DetectionError::ModelUnavailable(format!("{:#}", e)))?;

        self.run(image, family, use_acceleration)
            .map_err(|e| DetectionError::InferenceFailed(format!("{:#}", e)))
    }
}

/// Read a dictionary file, one character per line; the space class is appended
pub fn load_charset(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dictionary {:?}", path))?;

    let mut charset: Vec<String> = content
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect();
    charset.push(" ".to_string());
    Ok(charset)
}

/// Turn a detection probability map into scored, unclipped boxes
///
/// Coordinates are in probability-map pixels.
pub fn extract_boxes(probs: &[f32], width: usize, height: usize, settings: &DetectionConfig) -> Vec<ScoredBox> {
    if width == 0 || height == 0 || probs.len() < width * height {
        return vec![];
    }

    let mask = GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let p = probs[y as usize * width + x as usize];
        Luma([if p > settings.det_pixel_threshold { 255 } else { 0 }])
    });
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    // label -> (min_x, min_y, max_x, max_y, prob_sum, count)
    let mut regions: HashMap<u32, (u32, u32, u32, u32, f32, u32)> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label.0[0];
        if label == 0 {
            continue;
        }
        let p = probs[y as usize * width + x as usize];
        let entry = regions.entry(label).or_insert((x, y, x, y, 0.0, 0));
        entry.0 = entry.0.min(x);
        entry.1 = entry.1.min(y);
        entry.2 = entry.2.max(x);
        entry.3 = entry.3.max(y);
        entry.4 += p;
        entry.5 += 1;
    }

    let min_size = settings.det_min_box_size as f32;
    let mut boxes: Vec<ScoredBox> = regions
        .into_values()
        .filter_map(|(x0, y0, x1, y1, sum, count)| {
            let w = (x1 - x0 + 1) as f32;
            let h = (y1 - y0 + 1) as f32;
            if w.min(h) < min_size {
                return None;
            }

            let score = sum / count as f32;
            if score < settings.det_box_threshold {
                return None;
            }

            // Shrunk kernels grow back by area * ratio / perimeter
            let d = w * h * settings.det_unclip_ratio / (2.0 * (w + h));
            if w.min(h) + 2.0 * d < min_size + 2.0 {
                return None;
            }

            Some(ScoredBox {
                x0: (x0 as f32 - d).max(0.0),
                y0: (y0 as f32 - d).max(0.0),
                x1: (x1 as f32 + 1.0 + d).min(width as f32),
                y1: (y1 as f32 + 1.0 + d).min(height as f32),
                score,
            })
        })
        .collect();

    // Component labels are arbitrary; give callers a stable order
    sort_reading_order(&mut boxes);
    boxes
}

/// Sort top-to-bottom, then left-to-right within a line
pub fn sort_reading_order(boxes: &mut [ScoredBox]) {
    boxes.sort_by(|a, b| a.y0.total_cmp(&b.y0).then(a.x0.total_cmp(&b.x0)));

    // Boxes on one visual line may start at slightly different heights
    for i in 0..boxes.len().saturating_sub(1) {
        let mut j = i;
        while j < boxes.len() - 1
            && (boxes[j + 1].y0 - boxes[j].y0).abs() < SAME_LINE_TOLERANCE
            && boxes[j + 1].x0 < boxes[j].x0
        {
            boxes.swap(j, j + 1);
            if j == 0 {
                break;
            }
            j -= 1;
        }
    }
}

/// Greedy CTC decoding of a `[steps, classes]` probability matrix
///
/// Class 0 is the blank; class `i` maps to `charset[i - 1]`. Repeated classes
/// collapse. Confidence is the mean probability of the emitted characters.
pub fn ctc_decode(probs: &[f32], steps: usize, classes: usize, charset: &[String]) -> (String, f32) {
    let mut text = String::new();
    let mut confidences = Vec::new();
    let mut previous = 0usize;

    for t in 0..steps {
        let Some(row) = probs.get(t * classes..(t + 1) * classes) else {
            break;
        };
        let (best, p) = row
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));

        if best != 0 && best != previous {
            if let Some(ch) = charset.get(best - 1) {
                text.push_str(ch);
                confidences.push(p);
            }
        }
        previous = best;
    }

    let confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };
    (text, confidence)
}
