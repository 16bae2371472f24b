use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use rollcall_vision::{model, DetectorOptions, ExtractorOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::matcher::MatchPolicy;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("ROLLCALL_CONFIG_PATH").unwrap_or("/usr/local/etc/rollcall/config.toml"))
});

pub static MODEL_PREFIX: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("ROLLCALL_MODEL_PREFIX").unwrap_or("/usr/local/share/rollcall/models"))
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub matching: MatchingConfig,
    pub gallery: GalleryConfig,
    pub cache: CacheConfig,
    pub detector: DetectorConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Maximum Euclidean distance for two faces to count as the same person.
    /// Tuned for raw SFace embeddings; retune when changing model or normalisation.
    pub threshold: f32,
    pub policy: MatchPolicy,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: 22.0,
            policy: MatchPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub references_dir: PathBuf,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            references_dir: PathBuf::from("students"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub snapshot_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub detector_model: PathBuf,
    pub recognizer_model: PathBuf,
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub normalize_embeddings: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let detector = DetectorOptions::default();
        Self {
            detector_model: MODEL_PREFIX.join(model::DETECTOR_MODEL_FILE),
            recognizer_model: MODEL_PREFIX.join(model::RECOGNIZER_MODEL_FILE),
            score_threshold: detector.score_threshold,
            nms_threshold: detector.nms_threshold,
            normalize_embeddings: false,
        }
    }
}

impl DetectorConfig {
    pub fn extractor_options(&self) -> ExtractorOptions {
        ExtractorOptions {
            detector_model: self.detector_model.clone(),
            recognizer_model: self.recognizer_model.clone(),
            detector: DetectorOptions {
                score_threshold: self.score_threshold,
                nms_threshold: self.nms_threshold,
            },
            normalize_embeddings: self.normalize_embeddings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5001,
            max_upload_mb: 16,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let threshold = self.matching.threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            anyhow::bail!("matching.threshold must be a positive number, got {}", threshold);
        }
        if self.server.max_upload_mb == 0 {
            anyhow::bail!("server.max_upload_mb must be at least 1");
        }
        Ok(())
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        log::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
