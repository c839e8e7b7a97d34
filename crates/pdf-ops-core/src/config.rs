use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;

/// Which storage adapter serves sources and results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Supabase-style HTTP object store
    #[default]
    Http,
    /// Local directory, identifiers are relative paths
    Directory,
    /// In-process map, mostly for tests and dry runs
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Directory => "directory",
            Self::Memory => "memory",
        })
    }
}

/// Storage backend configuration.
///
/// `base_url` and `api_key` only matter for the HTTP backend, `root_dir`
/// only for the directory backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    pub root_dir: Option<PathBuf>,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_bucket() -> String {
    "pdfs".to_string()
}

const fn default_retry_count() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_timeout_secs() -> u64 {
    60
}

impl StorageConfig {
    /// HTTP storage at `base_url` with the default bucket
    pub fn http(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            backend: StorageBackend::Http,
            base_url: Some(base_url.into()),
            api_key,
            ..Self::default()
        }
    }

    /// Directory storage rooted at `root`
    pub fn directory(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Directory,
            root_dir: Some(root.into()),
            ..Self::default()
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            base_url: None,
            api_key: None,
            bucket: default_bucket(),
            root_dir: None,
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Request pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Prefix under which results are stored
    #[serde(default = "default_result_prefix")]
    pub result_prefix: String,

    /// Parent directory for per-request temporary files (system temp if unset)
    pub temp_dir: Option<PathBuf>,

    /// Sources fetched at once; results keep source order
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

fn default_result_prefix() -> String {
    "results".to_string()
}

const fn default_fetch_concurrency() -> usize {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            result_prefix: default_result_prefix(),
            temp_dir: None,
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

/// Appearance of the watermark overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WatermarkStyle {
    /// Starting font size in points; shrunk when the text would not fit
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    /// Fill opacity, 0.0 to 1.0
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Fill gray level, 0.0 (black) to 1.0 (white)
    #[serde(default = "default_gray")]
    pub gray: f32,
    /// Counter-clockwise baseline angle
    #[serde(default = "default_angle_degrees")]
    pub angle_degrees: f32,
}

const fn default_font_size() -> f32 {
    50.0
}

const fn default_opacity() -> f32 {
    0.3
}

const fn default_gray() -> f32 {
    0.5
}

const fn default_angle_degrees() -> f32 {
    45.0
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            font_size: default_font_size(),
            opacity: default_opacity(),
            gray: default_gray(),
            angle_degrees: default_angle_degrees(),
        }
    }
}

impl WatermarkStyle {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(invalid("watermark.font_size", "must be a positive number"));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(invalid("watermark.opacity", "must be between 0.0 and 1.0"));
        }
        if !(0.0..=1.0).contains(&self.gray) {
            return Err(invalid("watermark.gray", "must be between 0.0 and 1.0"));
        }
        if !self.angle_degrees.is_finite() {
            return Err(invalid("watermark.angle_degrees", "must be finite"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> Error {
    Error::ConfigInvalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Watermark appearance
    #[serde(default)]
    pub watermark: WatermarkStyle,
}

impl AppConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Load from default locations (~/.config/pdf-ops/config.toml, ./config.toml)
    pub fn load() -> Self {
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pdf-ops").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.watermark.validate()?;
        if self.pipeline.fetch_concurrency == 0 {
            return Err(invalid("pipeline.fetch_concurrency", "must be at least 1"));
        }
        if self.pipeline.result_prefix.trim_matches('/').is_empty() {
            return Err(invalid("pipeline.result_prefix", "must not be empty"));
        }
        Ok(())
    }
}
