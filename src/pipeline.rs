//! OCR pipeline and text refinement
//!
//! `OcrPipeline` turns an image file into a display thumbnail and the raw
//! recognized text. `TextRefiner` corrects and translates that text.
//! Both take their external capabilities as injected trait objects.

use image::DynamicImage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{AnnotationTarget, AppConfig};
use crate::error::ProcessingError;
use crate::text::{assemble, GrammarCorrector, Translator, AUTO_DETECT};
use crate::vision::{encode_thumbnail, Annotator, Preprocessor, TextDetector};

/// Prefix of the translated text when translation failed
pub const TRANSLATION_ERROR_PREFIX: &str = "Translation error";

/// Result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// PNG thumbnail of the annotated image
    pub thumbnail: Vec<u8>,
    /// Recognized fragments joined by newlines, in detection order
    pub text: String,
    /// Number of detections drawn
    pub detections: usize,
}

/// Preprocess → detect → annotate → encode
pub struct OcrPipeline<D: TextDetector> {
    preprocessor: Preprocessor,
    detector: D,
    annotator: Annotator,
    annotation_target: AnnotationTarget,
    thumbnail_max_side: u32,
}

impl<D: TextDetector> OcrPipeline<D> {
    /// Build a pipeline from configuration around a detector
    pub fn new(config: &AppConfig, detector: D) -> Self {
        Self::from_parts(
            Preprocessor::new(&config.preprocessing),
            detector,
            Annotator::new(&config.annotation),
            config.annotation.target,
            config.thumbnail.max_side,
        )
    }

    pub fn from_parts(
        preprocessor: Preprocessor,
        detector: D,
        annotator: Annotator,
        annotation_target: AnnotationTarget,
        thumbnail_max_side: u32,
    ) -> Self {
        Self {
            preprocessor,
            detector,
            annotator,
            annotation_target,
            thumbnail_max_side,
        }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Run OCR on one image
    ///
    /// Fails without partial output if the image cannot be loaded or
    /// detection fails.
    pub fn process(
        &mut self,
        path: &Path,
        language: &str,
        use_acceleration: bool,
    ) -> Result<PipelineOutput, ProcessingError> {
        let start = Instant::now();
        info!("OCR on {:?} with language '{}'", path, language);

        let (source, processed) = self.preprocessor.load_and_preprocess(path)?;
        let detections = self.detector.detect(&processed, language, use_acceleration)?;

        let mut display = match self.annotation_target {
            AnnotationTarget::Preprocessed => DynamicImage::ImageLuma8(processed).to_rgb8(),
            AnnotationTarget::Original => source.to_rgb8(),
        };

        let fragments: Vec<&str> = detections.iter().map(|d| d.text.as_str()).collect();
        let drawn = self.annotator.annotate(&mut display, &detections);

        let thumbnail = encode_thumbnail(&DynamicImage::ImageRgb8(display), self.thumbnail_max_side)
            .map_err(ProcessingError::Encode)?;
        let text = assemble(&fragments);

        debug!(
            "Pipeline finished in {:?}: {} detections, {} thumbnail bytes",
            start.elapsed(),
            drawn,
            thumbnail.len()
        );

        Ok(PipelineOutput {
            thumbnail,
            text,
            detections: drawn,
        })
    }
}

/// Corrected and translated text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinedText {
    pub corrected: String,
    /// Translation, or a message starting with `TRANSLATION_ERROR_PREFIX`
    pub translated: String,
}

/// Grammar correction followed by translation
pub struct TextRefiner {
    grammar: Option<Box<dyn GrammarCorrector>>,
    grammar_language: String,
    translator: Box<dyn Translator>,
}

impl TextRefiner {
    /// `grammar` may be `None` to skip correction
    pub fn new(
        grammar: Option<Box<dyn GrammarCorrector>>,
        grammar_language: impl Into<String>,
        translator: Box<dyn Translator>,
    ) -> Self {
        Self {
            grammar,
            grammar_language: grammar_language.into(),
            translator,
        }
    }

    /// Correct `text`, then translate it into `target`
    ///
    /// Never fails: a grammar failure passes the text through uncorrected and
    /// a translation failure becomes a readable message.
    pub fn refine(&self, text: &str, target: &str) -> RefinedText {
        let corrected = match &self.grammar {
            Some(grammar) => match grammar.correct(text, &self.grammar_language) {
                Ok(corrected) => corrected,
                Err(e) => {
                    warn!("Grammar correction failed, using uncorrected text: {}", e);
                    text.to_string()
                }
            },
            None => text.to_string(),
        };

        let translated = match self.translator.translate(&corrected, AUTO_DETECT, target) {
            Ok(translated) => translated,
            Err(e) => {
                warn!("Translation failed: {}", e);
                format!("{}: {}", TRANSLATION_ERROR_PREFIX, e)
            }
        };

        RefinedText {
            corrected,
            translated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnnotationConfig;
    use crate::error::DetectionError;
    use crate::fakes::{FailingTranslator, FakeDetector, FakeGrammar, FakeTranslator};
    use crate::vision::{DetectionResult, Quad};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_image(dir: &TempDir, width: u32, height: u32) -> PathBuf {
        let path = dir.path().join("scan.png");
        let img = RgbImage::from_fn(width, height, |x, _| {
            if x % 20 < 10 { Rgb([20, 20, 20]) } else { Rgb([230, 230, 230]) }
        });
        img.save_with_format(&path, ImageFormat::Png).unwrap();
        path
    }

    fn result(x0: f32, y0: f32, x1: f32, y1: f32, text: &str, confidence: f32) -> DetectionResult {
        DetectionResult {
            bounding_box: Quad::from_corners(x0, y0, x1, y1),
            text: text.to_string(),
            confidence,
        }
    }

    fn pipeline(detector: FakeDetector, target: AnnotationTarget) -> OcrPipeline<FakeDetector> {
        OcrPipeline::from_parts(
            Preprocessor::default(),
            detector,
            Annotator::with_font(&AnnotationConfig::default(), None),
            target,
            400,
        )
    }

    fn decode(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_text_assembled_in_detection_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, 120, 80);
        // Second box sits above the first; order must not change
        let detector = FakeDetector::returning(vec![
            result(10.0, 50.0, 60.0, 70.0, "Hello", 0.9),
            result(10.0, 5.0, 60.0, 25.0, "Мир", 0.8),
        ]);
        let mut pipeline = pipeline(detector, AnnotationTarget::Preprocessed);

        let output = pipeline.process(&path, "ru", false).unwrap();

        assert_eq!(output.text, "Hello\nМир");
        assert_eq!(output.detections, 2);
    }

    #[test]
    fn test_detector_receives_preprocessed_image_and_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, 64, 32);
        let mut pipeline = pipeline(FakeDetector::returning(vec![]), AnnotationTarget::Preprocessed);

        pipeline.process(&path, "en", true).unwrap();

        let calls = pipeline.detector().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].dimensions, (64, 32));
        assert_eq!(calls[0].language, "en");
        assert!(calls[0].use_acceleration);
        // Binarized and blurred: far from edges only 0 or 255 remain
        assert!(calls[0].sample == 0 || calls[0].sample == 255);
    }

    #[test]
    fn test_no_detections_gives_empty_text_and_thumbnail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, 50, 40);
        let mut pipeline = pipeline(FakeDetector::returning(vec![]), AnnotationTarget::Preprocessed);

        let output = pipeline.process(&path, "ru", false).unwrap();

        assert_eq!(output.text, "");
        assert_eq!(output.detections, 0);
        let thumb = decode(&output.thumbnail);
        assert_eq!((thumb.width(), thumb.height()), (50, 40));
    }

    #[test]
    fn test_large_image_thumbnail_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, 1000, 500);
        let detector = FakeDetector::returning(vec![result(100.0, 100.0, 600.0, 300.0, "text", 0.7)]);
        let mut pipeline = pipeline(detector, AnnotationTarget::Original);

        let output = pipeline.process(&path, "en", false).unwrap();

        let thumb = decode(&output.thumbnail);
        assert_eq!((thumb.width(), thumb.height()), (400, 200));
    }

    #[test]
    fn test_boxes_are_drawn_on_display_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, 100, 100);
        let detector = FakeDetector::returning(vec![result(20.0, 20.0, 80.0, 80.0, "x", 0.9)]);
        let mut pipeline = pipeline(detector, AnnotationTarget::Preprocessed);

        let output = pipeline.process(&path, "en", false).unwrap();

        let thumb = decode(&output.thumbnail).to_rgb8();
        assert_eq!(*thumb.get_pixel(20, 50), Rgb([0, 255, 0]));
    }

    #[test]
    fn test_detection_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image(&dir, 30, 30);
        let detector = FakeDetector::failing(DetectionError::UnsupportedLanguage("xx".to_string()));
        let mut pipeline = pipeline(detector, AnnotationTarget::Preprocessed);

        let err = pipeline.process(&path, "xx", false).unwrap_err();
        assert!(matches!(err, ProcessingError::Detection(DetectionError::UnsupportedLanguage(_))));
    }

    #[test]
    fn test_load_failure_propagates_before_detection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image").unwrap();
        let mut pipeline = pipeline(FakeDetector::returning(vec![]), AnnotationTarget::Preprocessed);

        let err = pipeline.process(&path, "ru", false).unwrap_err();

        assert!(matches!(err, ProcessingError::Load(_)));
        assert!(pipeline.detector().calls().is_empty());
    }

    #[test]
    fn test_refine_corrects_then_translates() {
        let refiner = TextRefiner::new(
            Some(Box::new(FakeGrammar::replacing("Helo", "Hello"))),
            "ru",
            Box::new(FakeTranslator),
        );

        let refined = refiner.refine("Helo\nМир", "en");

        assert_eq!(refined.corrected, "Hello\nМир");
        assert_eq!(refined.translated, "[auto->en] Hello\nМир");
    }

    #[test]
    fn test_refine_passes_grammar_language() {
        let grammar = FakeGrammar::replacing("a", "b");
        let seen = grammar.languages();
        let refiner = TextRefiner::new(Some(Box::new(grammar)), "ru", Box::new(FakeTranslator));

        refiner.refine("a", "de");
        assert_eq!(*seen.borrow(), vec!["ru".to_string()]);
    }

    #[test]
    fn test_translation_failure_degrades_to_message() {
        let refiner = TextRefiner::new(None, "ru", Box::new(FailingTranslator));

        let refined = refiner.refine("Привет", "en");

        assert_eq!(refined.corrected, "Привет");
        assert!(!refined.translated.is_empty());
        assert!(refined.translated.starts_with(TRANSLATION_ERROR_PREFIX));
    }

    #[test]
    fn test_translation_failure_on_empty_text() {
        let refiner = TextRefiner::new(None, "ru", Box::new(FailingTranslator));
        assert!(refiner.refine("", "en").translated.starts_with(TRANSLATION_ERROR_PREFIX));
    }

    #[test]
    fn test_grammar_failure_keeps_original_text() {
        let refiner = TextRefiner::new(Some(Box::new(FakeGrammar::failing())), "ru", Box::new(FakeTranslator));

        let refined = refiner.refine("Helo", "fr");

        assert_eq!(refined.corrected, "Helo");
        assert_eq!(refined.translated, "[auto->fr] Helo");
    }
}
