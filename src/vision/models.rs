//! Model management for ONNX Runtime
//!
//! Handles downloading, caching, and loading of the PaddleOCR models.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::config::DetectionConfig;
use crate::language::ScriptFamily;

/// Environment variable forcing offline mode
pub const OFFLINE_ENV: &str = "SCRIBE_LENS_OFFLINE";

/// Model file identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Text detection model (DBNet), shared by all languages
    Detection,
    /// Text recognition model (CRNN) for one script family
    Recognition(ScriptFamily),
    /// Character dictionary matching a recognition model
    Dictionary(ScriptFamily),
}

impl ModelKind {
    /// File name inside the models directory
    pub fn filename(&self) -> String {
        match self {
            ModelKind::Detection => "det.onnx".to_string(),
            ModelKind::Recognition(family) => format!("rec_{}.onnx", family.model_dir()),
            ModelKind::Dictionary(family) => format!("dict_{}.txt", family.model_dir()),
        }
    }

    /// Path of this model relative to the repository base URL
    pub fn remote_path(&self) -> String {
        match self {
            ModelKind::Detection => "detection/v3/det.onnx".to_string(),
            ModelKind::Recognition(family) => format!("languages/{}/rec.onnx", family.model_dir()),
            ModelKind::Dictionary(family) => format!("languages/{}/dict.txt", family.model_dir()),
        }
    }

    /// Smallest plausible file size, anything below is a truncated download
    pub fn min_size(&self) -> u64 {
        match self {
            ModelKind::Detection | ModelKind::Recognition(_) => 100_000,
            ModelKind::Dictionary(_) => 16,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            ModelKind::Detection => "Text Detection".to_string(),
            ModelKind::Recognition(family) => format!("Text Recognition ({})", family.model_dir()),
            ModelKind::Dictionary(family) => format!("Character Dictionary ({})", family.model_dir()),
        }
    }
}

/// Model manifest tracking downloaded models
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    pub version: String,
    pub models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelInfo {
    pub filename: String,
    pub source_url: String,
    pub size_bytes: u64,
    pub sha256: String,
    pub downloaded_at: u64,
}

impl Default for ModelManifest {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            models: Vec::new(),
        }
    }
}

/// Downloads and caches ONNX models and dictionaries
pub struct ModelManager {
    models_dir: PathBuf,
    base_url: String,
    offline: bool,
}

impl ModelManager {
    /// Create a model manager from detection settings
    pub fn new(settings: &DetectionConfig) -> Result<Self> {
        let models_dir = match &settings.models_dir {
            Some(dir) => dir.clone(),
            None => crate::storage::get_data_dir()?.join("models"),
        };
        let offline = settings.offline || std::env::var_os(OFFLINE_ENV).is_some();

        Self::with_dir(models_dir, &settings.model_base_url, offline)
    }

    /// Create model manager with custom directory
    pub fn with_dir(models_dir: PathBuf, base_url: &str, offline: bool) -> Result<Self> {
        std::fs::create_dir_all(&models_dir)
            .with_context(|| format!("Failed to create models directory {:?}", models_dir))?;

        Ok(Self {
            models_dir,
            base_url: base_url.trim_end_matches('/').to_string(),
            offline,
        })
    }

    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        self.models_dir.join(kind.filename())
    }

    pub fn model_url(&self, kind: ModelKind) -> String {
        format!("{}/{}", self.base_url, kind.remote_path())
    }

    /// Check if a model is already downloaded
    pub fn is_model_available(&self, kind: ModelKind) -> bool {
        std::fs::metadata(self.model_path(kind))
            .map(|m| m.is_file() && m.len() >= kind.min_size())
            .unwrap_or(false)
    }

    /// Download a model if not already available and return its path
    pub fn ensure_model(&self, kind: ModelKind) -> Result<PathBuf> {
        let path = self.model_path(kind);

        if self.is_model_available(kind) {
            debug!("Model {:?} already available at {:?}", kind, path);
            return Ok(path);
        }

        let url = self.model_url(kind);
        if self.offline {
            anyhow::bail!(
                "Offline mode: cannot download {}. Download it from {} and place it at {:?}",
                kind.display_name(),
                url,
                path
            );
        }

        info!("Downloading {} from {}", kind.display_name(), url);

        let rt = Runtime::new().context("Failed to create tokio runtime")?;
        let sha256 = rt.block_on(download_file(&url, &path))?;

        if !self.is_model_available(kind) {
            anyhow::bail!("Downloaded {} failed verification", kind.display_name());
        }

        if let Err(e) = self.record_download(kind, &url, &sha256) {
            warn!("Failed to update model manifest: {:#}", e);
        }

        info!("Downloaded {}", kind.display_name());
        Ok(path)
    }

    /// Make sure detection, recognition and dictionary for a family are present
    pub fn ensure_family(&self, family: ScriptFamily) -> Result<(PathBuf, PathBuf, PathBuf)> {
        Ok((
            self.ensure_model(ModelKind::Detection)?,
            self.ensure_model(ModelKind::Recognition(family))?,
            self.ensure_model(ModelKind::Dictionary(family))?,
        ))
    }

    fn record_download(&self, kind: ModelKind, url: &str, sha256: &str) -> Result<()> {
        let mut manifest = self.load_manifest().unwrap_or_default();
        let size_bytes = std::fs::metadata(self.model_path(kind))?.len();

        let info = ModelInfo {
            filename: kind.filename(),
            source_url: url.to_string(),
            size_bytes,
            sha256: sha256.to_string(),
            downloaded_at: unix_timestamp(),
        };

        match manifest.models.iter_mut().find(|m| m.filename == info.filename) {
            Some(existing) => *existing = info,
            None => manifest.models.push(info),
        }

        self.save_manifest(&manifest)
    }

    /// Load the model manifest
    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let manifest_path = self.models_dir.join("manifest.json");
        if !manifest_path.exists() {
            return Ok(ModelManifest::default());
        }
        let content = std::fs::read_to_string(&manifest_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the model manifest
    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        let manifest_path = self.models_dir.join("manifest.json");
        let content = serde_json::to_string_pretty(manifest)?;
        std::fs::write(manifest_path, content)?;
        Ok(())
    }
}

/// Stream a file to disk through a temp file, returning its SHA-256
async fn download_file(url: &str, path: &Path) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()
        .context("Failed to create HTTP client")?;

    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to send download request")?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    debug!("Download size: {:?} bytes", response.content_length());

    let temp_path = path.with_extension("part");
    let mut file = std::fs::File::create(&temp_path).context("Failed to create temp file")?;

    let mut hasher = Sha256::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Error reading download stream")?;
        file.write_all(&chunk).context("Failed to write to temp file")?;
        hasher.update(&chunk);
    }

    file.flush().context("Failed to flush temp file")?;
    drop(file);

    std::fs::rename(&temp_path, path)
        .context("Failed to move downloaded file to final location")?;

    Ok(format!("{:x}", hasher.finalize()))
}

fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// ONNX Runtime session wrapper
pub struct OnnxSession {
    session: Session,
}

impl OnnxSession {
    /// Load a model, optionally asking for GPU execution
    pub fn new(model_path: &Path, use_gpu: bool) -> Result<Self> {
        info!("Loading ONNX model from {:?} (gpu: {})", model_path, use_gpu);

        let builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        // DirectML on Windows, CPU elsewhere
        #[cfg(target_os = "windows")]
        let builder = if use_gpu {
            use ort::execution_providers::DirectMLExecutionProvider;
            match builder.with_execution_providers([DirectMLExecutionProvider::default().build()]) {
                Ok(builder) => {
                    info!("DirectML GPU acceleration enabled");
                    builder
                }
                Err(e) => {
                    warn!("DirectML not available, using CPU: {}", e);
                    Session::builder()?
                        .with_optimization_level(GraphOptimizationLevel::Level3)?
                        .with_intra_threads(4)?
                }
            }
        } else {
            builder
        };

        #[cfg(not(target_os = "windows"))]
        {
            if use_gpu {
                warn!("GPU acceleration is only wired up for DirectML, using CPU");
            }
        }

        let session = builder
            .commit_from_file(model_path)
            .context("Failed to load ONNX model")?;

        let input_names: Vec<String> = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        debug!("Model loaded. Inputs: {:?}, Outputs: {:?}", input_names, output_names);

        Ok(Self { session })
    }

    /// Run the model on a single input tensor and return the first output
    /// as (shape, flat data)
    pub fn run(&mut self, input: Array4<f32>) -> Result<(Vec<usize>, Vec<f32>)> {
        let tensor = Tensor::from_array(input)?;
        let outputs = self.session.run(ort::inputs![tensor])?;
        let (shape, data) = outputs[0].try_extract_tensor::<f32>()?;

        let shape = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((shape, data.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &Path, offline: bool) -> ModelManager {
        ModelManager::with_dir(dir.join("models"), "https://example.com/repo/", offline).unwrap()
    }

    #[test]
    fn test_model_filenames() {
        assert_eq!(ModelKind::Detection.filename(), "det.onnx");
        assert_eq!(ModelKind::Recognition(ScriptFamily::EastSlavic).filename(), "rec_eslav.onnx");
        assert_eq!(ModelKind::Dictionary(ScriptFamily::Latin).filename(), "dict_latin.txt");
    }

    #[test]
    fn test_model_urls_trim_trailing_slash() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), true);

        assert_eq!(
            manager.model_url(ModelKind::Recognition(ScriptFamily::English)),
            "https://example.com/repo/languages/english/rec.onnx"
        );
        assert_eq!(
            manager.model_url(ModelKind::Detection),
            "https://example.com/repo/detection/v3/det.onnx"
        );
    }

    #[test]
    fn test_truncated_model_is_not_available() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), true);

        std::fs::write(manager.model_path(ModelKind::Detection), b"tiny").unwrap();
        assert!(!manager.is_model_available(ModelKind::Detection));

        let dict = ModelKind::Dictionary(ScriptFamily::English);
        std::fs::write(manager.model_path(dict), "a\nb\nc\nd\ne\nf\ng\nh\ni\n").unwrap();
        assert!(manager.is_model_available(dict));
    }

    #[test]
    fn test_offline_mode_refuses_download() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), true);

        let err = manager.ensure_model(ModelKind::Detection).unwrap_err();
        assert!(err.to_string().contains("Offline mode"));
    }

    #[test]
    fn test_available_model_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), true);
        let kind = ModelKind::Dictionary(ScriptFamily::Korean);
        std::fs::write(manager.model_path(kind), "0123456789abcdefghij").unwrap();

        assert_eq!(manager.ensure_model(kind).unwrap(), manager.model_path(kind));
    }

    #[test]
    fn test_manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path(), true);
        assert!(manager.load_manifest().unwrap().models.is_empty());

        let kind = ModelKind::Dictionary(ScriptFamily::Arabic);
        std::fs::write(manager.model_path(kind), "0123456789abcdefghij").unwrap();
        manager.record_download(kind, "https://example.com/dict.txt", "abc").unwrap();
        manager.record_download(kind, "https://example.com/dict.txt", "def").unwrap();

        let manifest = manager.load_manifest().unwrap();
        assert_eq!(manifest.models.len(), 1);
        assert_eq!(manifest.models[0].sha256, "def");
        assert_eq!(manifest.models[0].size_bytes, 20);
    }
}
