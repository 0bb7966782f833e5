//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::language::Language;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Image preprocessing settings
    pub preprocessing: PreprocessingConfig,
    /// Text detection settings
    pub detection: DetectionConfig,
    /// Annotation drawing settings
    pub annotation: AnnotationConfig,
    /// Thumbnail encoding settings
    pub thumbnail: ThumbnailConfig,
    /// Grammar correction settings
    pub grammar: GrammarConfig,
    /// Translation settings
    pub translation: TranslationConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Language the text in the image is written in
    pub source_language: Language,
    /// Language to translate into
    pub target_language: Language,
    /// Use GPU acceleration for detection when available
    pub use_gpu: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            source_language: Language::Russian,
            target_language: Language::English,
            use_gpu: false,
        }
    }
}

/// Binarization and blur settings applied before detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Pixels at or above this gray level become white
    pub threshold: u8,
    /// Gaussian kernel size (odd; 1 disables blurring)
    pub blur_kernel: u32,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            threshold: 150,
            blur_kernel: 5,
        }
    }
}

/// PaddleOCR detection and recognition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Base URL of the ONNX model repository
    pub model_base_url: String,
    /// Override for the model cache directory
    pub models_dir: Option<PathBuf>,
    /// Never download models, fail if they are missing
    pub offline: bool,
    /// Longest side of the image fed to the detection model
    pub det_limit_side: u32,
    /// Probability above which a pixel belongs to text
    pub det_pixel_threshold: f32,
    /// Minimum mean probability for a detected box
    pub det_box_threshold: f32,
    /// Box expansion ratio applied to the shrunk text kernels
    pub det_unclip_ratio: f32,
    /// Minimum box side in pixels
    pub det_min_box_size: u32,
    /// Input height of the recognition model
    pub rec_height: u32,
    /// Maximum input width of the recognition model
    pub rec_max_width: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_base_url: "https://huggingface.co/monkt/paddleocr-onnx/resolve/main".to_string(),
            models_dir: None,
            offline: false,
            det_limit_side: 960,
            det_pixel_threshold: 0.3,
            det_box_threshold: 0.6,
            det_unclip_ratio: 1.5,
            det_min_box_size: 3,
            rec_height: 48,
            rec_max_width: 640,
        }
    }
}

/// Which buffer the detection boxes are drawn onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationTarget {
    /// The binarized, blurred image the detector saw
    #[default]
    Preprocessed,
    /// The source image as loaded from disk
    Original,
}

/// Box and label drawing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub target: AnnotationTarget,
    /// TrueType font for labels; the bundled DejaVu Sans is used if unset
    pub font_path: Option<PathBuf>,
    /// RGB colour of boxes and labels
    pub color: [u8; 3],
    /// Rectangle line thickness in pixels
    pub thickness: u32,
    /// Label glyph height in pixels
    pub label_scale: f32,
    /// Gap between the label baseline and the box top
    pub label_offset: i32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            target: AnnotationTarget::Preprocessed,
            font_path: None,
            color: [0, 255, 0],
            thickness: 2,
            label_scale: 20.0,
            label_offset: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Longest side of the encoded thumbnail
    pub max_side: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self { max_side: 400 }
    }
}

/// LanguageTool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    pub enabled: bool,
    /// LanguageTool server root (the `/v2/check` path is appended)
    pub endpoint: String,
    /// Language the corrector checks against
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.languagetool.org".to_string(),
            language: "ru".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Translation service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.googleapis.com/translate_a/single".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert_eq!(config.general.source_language, Language::Russian);
        assert_eq!(config.general.target_language, Language::English);
        assert!(!config.general.use_gpu);

        assert_eq!(config.preprocessing.threshold, 150);
        assert_eq!(config.preprocessing.blur_kernel, 5);

        assert!(!config.detection.offline);
        assert!(config.detection.models_dir.is_none());

        assert_eq!(config.annotation.target, AnnotationTarget::Preprocessed);
        assert_eq!(config.annotation.thickness, 2);
        assert_eq!(config.annotation.color, [0, 255, 0]);

        assert_eq!(config.thumbnail.max_side, 400);

        assert!(config.grammar.enabled);
        assert_eq!(config.grammar.language, "ru");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.general.source_language, parsed.general.source_language);
        assert_eq!(config.preprocessing.threshold, parsed.preprocessing.threshold);
        assert_eq!(config.detection.model_base_url, parsed.detection.model_base_url);
        assert_eq!(config.translation.endpoint, parsed.translation.endpoint);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let toml_str = r#"
            [general]
            target_language = "de"

            [annotation]
            target = "original"
        "#;
        let parsed: AppConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(parsed.general.target_language, Language::German);
        assert_eq!(parsed.general.source_language, Language::Russian);
        assert_eq!(parsed.annotation.target, AnnotationTarget::Original);
        assert_eq!(parsed.thumbnail.max_side, 400);
    }

    #[test]
    fn test_unknown_language_in_config_is_rejected() {
        let toml_str = r#"
            [general]
            source_language = "klingon"
        "#;
        let parsed: std::result::Result<AppConfig, _> = toml::from_str(toml_str);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_save_and_load_config() {
        let mut config = AppConfig::default();
        config.general.target_language = Language::Japanese;
        config.grammar.enabled = false;

        let temp_file = NamedTempFile::new().unwrap();
        save_config(&config, temp_file.path()).unwrap();
        let loaded = load_config(temp_file.path()).unwrap();

        assert_eq!(loaded.general.target_language, Language::Japanese);
        assert!(!loaded.grammar.enabled);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
