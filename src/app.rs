//! Application Coordinator
//!
//! Owns the OCR pipeline and the text refiner, validates requests and runs
//! them end to end.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::RunError;
use crate::language::Language;
use crate::pipeline::{OcrPipeline, TextRefiner};
use crate::text::{GoogleTranslator, GrammarCorrector, LanguageToolClient};
use crate::validation::validate_request;
use crate::vision::{PaddleDetector, TextDetector};

/// One image to read and translate
#[derive(Debug, Clone)]
pub struct OcrRequest {
    pub image_path: PathBuf,
    pub source: Language,
    pub target: Language,
    pub use_gpu: bool,
}

impl OcrRequest {
    /// Request using the configured languages and acceleration
    pub fn from_config(image_path: impl Into<PathBuf>, config: &AppConfig) -> Self {
        Self {
            image_path: image_path.into(),
            source: config.general.source_language,
            target: config.general.target_language,
            use_gpu: config.general.use_gpu,
        }
    }
}

/// Everything a finished request produces
#[derive(Debug, Clone)]
pub struct Outcome {
    /// Annotated PNG thumbnail
    pub thumbnail: Vec<u8>,
    pub recognized: String,
    pub corrected: String,
    pub translated: String,
}

/// Main application coordinator
pub struct ScribeLensApp<D: TextDetector = PaddleDetector> {
    pipeline: OcrPipeline<D>,
    refiner: TextRefiner,
}

impl ScribeLensApp<PaddleDetector> {
    /// Create the application with the production detector and web services
    pub fn new(config: &AppConfig) -> Result<Self> {
        let detector = PaddleDetector::new(config.detection.clone())
            .context("Failed to set up the text detector")?;

        let grammar: Option<Box<dyn GrammarCorrector>> = if config.grammar.enabled {
            let client = LanguageToolClient::new(&config.grammar)
                .context("Failed to set up the grammar client")?;
            Some(Box::new(client))
        } else {
            info!("Grammar correction disabled");
            None
        };
        let translator = GoogleTranslator::new(&config.translation)
            .context("Failed to set up the translation client")?;

        let refiner = TextRefiner::new(grammar, config.grammar.language.clone(), Box::new(translator));
        Ok(Self::with_parts(OcrPipeline::new(config, detector), refiner))
    }
}

impl<D: TextDetector> ScribeLensApp<D> {
    pub fn with_parts(pipeline: OcrPipeline<D>, refiner: TextRefiner) -> Self {
        Self { pipeline, refiner }
    }

    /// Validate and run one request
    ///
    /// Validation and pipeline failures abort the request. Refinement never
    /// does; a failed translation is reported in `Outcome::translated`.
    pub fn run(&mut self, request: &OcrRequest) -> Result<Outcome, RunError> {
        validate_request(&request.image_path, request.source, request.target).inspect_err(|e| {
            warn!("Rejected request for {:?}: {}", request.image_path, e);
        })?;

        let output = self.pipeline.process(
            &request.image_path,
            request.source.code(),
            request.use_gpu,
        )?;
        info!("Recognized {} text fragments", output.detections);

        let refined = self
            .refiner
            .refine(&output.text, request.target.translation_code());

        Ok(Outcome {
            thumbnail: output.thumbnail,
            recognized: output.text,
            corrected: refined.corrected,
            translated: refined.translated,
        })
    }
}
