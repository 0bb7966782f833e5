//! Error types shared across the OCR pipeline and text refinement
//!
//! Load and detection failures abort a run and reach the caller as a single
//! `ProcessingError`. Grammar and translation failures are recovered locally.

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationError;

/// The source image could not be read or decoded
#[derive(Debug, Error)]
#[error("Failed to load image {path:?}: {source}")]
pub struct LoadError {
    pub path: PathBuf,
    #[source]
    pub source: image::ImageError,
}

/// Text detection capability errors
#[derive(Debug, Clone, Error)]
pub enum DetectionError {
    #[error("Unsupported detection language: {0}")]
    UnsupportedLanguage(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },
}

/// Pipeline failure surfaced to the caller
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Text detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("Failed to encode thumbnail: {0}")]
    Encode(#[source] image::ImageError),
}

/// Why an OCR request produced no result
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

/// Grammar correction errors
#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("Grammar service request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Grammar service returned status {0}")]
    BadStatus(u16),

    #[error("Failed to start HTTP runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Translation errors
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Nothing to translate")]
    EmptyInput,

    #[error("Text is too long to translate ({len} characters, limit {limit})")]
    TooLong { len: usize, limit: usize },

    #[error("Translation request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Translation service returned status {0}")]
    BadStatus(u16),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Failed to start HTTP runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
