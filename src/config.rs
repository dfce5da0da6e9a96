//! YAML configuration for the `qwen3-onnx` binary.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. A handful of environment variables override the file.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//!
//! log: "info,ort=warn"
//! log_format: "text"        # or "json"
//! provider: "cpu"           # cpu | cuda[:N] | dml[:N]
//! models_dir: "/data/models"
//!
//! embedding:
//!   normalize: true
//!   max_sequence_length: 8192
//!   gpu_threshold: 0.999
//!   reference_path: "crates/embedding/tests/data/reference_embeddings.json"
//!
//! generation:
//!   max_length: 2048
//!   temperature: 0.6
//!   top_k: 20
//!   top_p: 0.95
//!   output: "streaming"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use embedding::{
    CPU_MATCH_THRESHOLD, EmbeddingConfig, GPU_MATCH_THRESHOLD, ReferenceStore,
    reference::{REFERENCE_PATH_ENV, default_fixture_path},
};
use llm::{GenerationConfig, OutputMode, SearchOptions};
use runtime::{ExecutionProvider, ModelPaths};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overrides [`AppConfig::log`].
pub const ENV_LOG: &str = "QWEN3_LOG";
/// Overrides [`AppConfig::provider`].
pub const ENV_PROVIDER: &str = "QWEN3_PROVIDER";
/// Overrides [`AppConfig::models_dir`].
pub const ENV_MODELS_DIR: &str = "QWEN3_MODELS_DIR";

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    /// Configuration format version
    #[serde(default = "default_version")]
    pub version: String,

    /// `tracing` filter directive, e.g. `info` or `debug,ort=warn`.
    #[serde(default = "default_log")]
    pub log: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Provider label parsed by [`ExecutionProvider::from_str`](std::str::FromStr).
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Explicit models directory. When unset the binary walks upward from the
    /// working directory looking for `models/`.
    #[serde(default)]
    pub models_dir: Option<PathBuf>,

    #[serde(default)]
    pub embedding: EmbeddingYamlConfig,

    #[serde(default)]
    pub generation: GenerationYamlConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            log: default_log(),
            log_format: LogFormat::default(),
            provider: default_provider(),
            models_dir: None,
            embedding: EmbeddingYamlConfig::default(),
            generation: GenerationYamlConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// File (or defaults) with process environment overrides applied.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies `QWEN3_*` overrides read through `lookup`. Empty values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(log) = lookup(ENV_LOG) {
            self.log = log;
        }
        if let Some(provider) = lookup(ENV_PROVIDER) {
            self.provider = provider;
        }
        if let Some(dir) = lookup(ENV_MODELS_DIR) {
            self.models_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = lookup(REFERENCE_PATH_ENV) {
            self.embedding.reference_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.execution_provider()?;
        self.embedding.validate()?;
        self.generation.validate()?;
        Ok(())
    }

    pub fn execution_provider(&self) -> Result<ExecutionProvider, ConfigLoadError> {
        self.provider
            .parse()
            .map_err(|e: runtime::RuntimeError| ConfigLoadError::Validation(e.to_string()))
    }

    /// Explicit `models_dir`, else the repository found above the working directory.
    pub fn model_paths(&self) -> Result<ModelPaths, runtime::RuntimeError> {
        match &self.models_dir {
            Some(dir) => Ok(ModelPaths::from_models_dir(dir)),
            None => ModelPaths::discover(),
        }
    }

    /// Embedding pipeline settings for `provider`.
    pub fn embedding_config(
        &self,
        paths: &ModelPaths,
        provider: ExecutionProvider,
    ) -> EmbeddingConfig {
        let base = EmbeddingConfig::from_paths(paths).with_provider(provider);
        EmbeddingConfig {
            normalize: self.embedding.normalize,
            max_sequence_length: self.embedding.max_sequence_length,
            tokenizer_url: self.embedding.tokenizer_url.clone().or(base.tokenizer_url.clone()),
            ..base
        }
    }

    pub fn generation_config(
        &self,
        paths: &ModelPaths,
        provider: ExecutionProvider,
    ) -> GenerationConfig {
        GenerationConfig::from_paths(paths).with_provider(provider)
    }

    /// Similarity a vector must reach to match its reference on `provider`.
    pub fn match_threshold(&self, provider: ExecutionProvider) -> f64 {
        if provider.is_accelerator() {
            self.embedding.gpu_threshold
        } else {
            CPU_MATCH_THRESHOLD
        }
    }

    pub fn reference_store(&self) -> ReferenceStore {
        ReferenceStore::new(
            self.embedding
                .reference_path
                .clone()
                .unwrap_or_else(default_fixture_path),
        )
    }
}

/// Embedding section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingYamlConfig {
    #[serde(default = "true_value")]
    pub normalize: bool,

    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,

    /// Where to fetch `tokenizer.json` if the local copy is missing.
    #[serde(default)]
    pub tokenizer_url: Option<String>,

    /// Cosine similarity required on accelerators. CPU always uses 0.9999.
    #[serde(default = "default_gpu_threshold")]
    pub gpu_threshold: f64,

    /// Reference fixture; `$QWEN3_REFERENCE_EMBEDDINGS` wins over this, the bundled path is the fallback.
    #[serde(default)]
    pub reference_path: Option<PathBuf>,
}

impl Default for EmbeddingYamlConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            max_sequence_length: default_max_sequence_length(),
            tokenizer_url: None,
            gpu_threshold: default_gpu_threshold(),
            reference_path: None,
        }
    }
}

impl EmbeddingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.max_sequence_length == 0 {
            return Err(ConfigLoadError::Validation(
                "embedding.max_sequence_length must be >= 1".into(),
            ));
        }
        if !(self.gpu_threshold > 0.0 && self.gpu_threshold <= 1.0) {
            return Err(ConfigLoadError::Validation(format!(
                "embedding.gpu_threshold must be in (0, 1], got {}",
                self.gpu_threshold
            )));
        }
        Ok(())
    }
}

/// Generation section; defaults are the chat console's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationYamlConfig {
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_output")]
    pub output: OutputMode,
}

impl Default for GenerationYamlConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            temperature: default_temperature(),
            top_k: default_top_k(),
            top_p: default_top_p(),
            seed: None,
            output: default_output(),
        }
    }
}

impl GenerationYamlConfig {
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            max_length: self.max_length,
            temperature: self.temperature,
            top_k: self.top_k,
            top_p: self.top_p,
            seed: self.seed,
        }
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.search_options()
            .validate()
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))
    }
}

fn default_version() -> String {
    "1.0".to_string()
}
fn default_log() -> String {
    "info".to_string()
}
fn default_provider() -> String {
    "cpu".to_string()
}
fn true_value() -> bool {
    true
}
fn default_max_sequence_length() -> usize {
    embedding::config::QWEN3_EMBEDDING_MAX_TOKENS
}
fn default_gpu_threshold() -> f64 {
    GPU_MATCH_THRESHOLD
}
fn default_max_length() -> usize {
    SearchOptions::chat().max_length
}
fn default_temperature() -> f32 {
    SearchOptions::chat().temperature
}
fn default_top_k() -> usize {
    SearchOptions::chat().top_k
}
fn default_top_p() -> f32 {
    SearchOptions::chat().top_p
}
fn default_output() -> OutputMode {
    OutputMode::Streaming
}
