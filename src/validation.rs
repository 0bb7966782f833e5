//! Request validation
//!
//! Checks run before any image work starts, in the order a user would fix
//! them: pick a file, pick a format, pick two different languages, then
//! mind the file size.

use std::path::Path;
use thiserror::Error;

use crate::language::Language;

/// Largest accepted image file
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

/// Accepted image file extensions
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please choose an image")]
    MissingPath,

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported file format, please choose a JPG or PNG image")]
    UnsupportedFormat,

    #[error("Text language and translation language must differ")]
    SameLanguage,

    #[error("File is too large ({size} bytes), the limit is 5 MB")]
    TooLarge { size: u64 },

    #[error("File is empty")]
    Empty,
}

/// Validate an OCR request
pub fn validate_request(path: &Path, source: Language, target: Language) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::MissingPath);
    }

    if !path.is_file() {
        return Err(ValidationError::NotFound(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension {
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => {}
        _ => return Err(ValidationError::UnsupportedFormat),
    }

    if source == target {
        return Err(ValidationError::SameLanguage);
    }

    let size = std::fs::metadata(path)
        .map_err(|_| ValidationError::NotFound(path.display().to_string()))?
        .len();
    if size > MAX_IMAGE_BYTES {
        return Err(ValidationError::TooLarge { size });
    }
    if size == 0 {
        return Err(ValidationError::Empty);
    }

    Ok(())
}
