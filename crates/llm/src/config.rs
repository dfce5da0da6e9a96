//! Generation configuration.
//!
//! A causal model directory carries a `genai_config.json` describing the
//! decoder graph (file name, layer geometry, tensor names) and default search
//! options. [`GenaiConfig`] parses that file; [`GenerationConfig`] bundles it
//! with the runtime choices a caller makes (provider, session knobs).

use runtime::{ExecutionProvider, ModelPaths, SessionSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::LlmError;

pub const GENAI_CONFIG_FILE: &str = "genai_config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Placeholder in tensor name templates that is replaced by the layer index.
const LAYER_PLACEHOLDER: &str = "%d";

/// Search knobs consumed by the decode loop and the sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Hard cap on prompt plus generated tokens.
    pub max_length: usize,
    /// `0.0` selects greedy decoding; larger values flatten the distribution.
    pub temperature: f32,
    /// Keep only the `top_k` most likely tokens; `1` is greedy, `0` disables the cut.
    pub top_k: usize,
    /// Nucleus cutoff in `(0, 1]`.
    pub top_p: f32,
    /// Seed for reproducible sampling; `None` draws one from the OS.
    pub seed: Option<u64>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_length: 2048,
            temperature: 1.0,
            top_k: 50,
            top_p: 1.0,
            seed: None,
        }
    }
}

impl SearchOptions {
    /// Settings of the interactive chat console.
    pub fn chat() -> Self {
        Self {
            max_length: 2048,
            temperature: 0.6,
            top_k: 20,
            top_p: 0.95,
            seed: None,
        }
    }

    /// Deterministic argmax decoding.
    pub fn greedy() -> Self {
        Self {
            temperature: 0.0,
            top_k: 1,
            ..Self::default()
        }
    }

    /// Same length cap and seed, argmax decoding.
    pub fn into_greedy(self) -> Self {
        Self {
            temperature: 0.0,
            top_k: 1,
            ..self
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn is_greedy(&self) -> bool {
        self.temperature <= 0.0 || self.top_k == 1
    }

    pub fn validate(&self) -> Result<(), LlmError> {
        if self.max_length == 0 {
            return Err(LlmError::InvalidConfig("max_length must be at least 1".into()));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(LlmError::InvalidConfig(format!(
                "temperature must be a finite value >= 0, got {}",
                self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(LlmError::InvalidConfig(format!(
                "top_p must be in (0, 1], got {}",
                self.top_p
            )));
        }
        Ok(())
    }
}

/// `eos_token_id` is written either as a single id or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenIds {
    One(u32),
    Many(Vec<u32>),
}

impl TokenIds {
    pub fn to_vec(&self) -> Vec<u32> {
        match self {
            TokenIds::One(id) => vec![*id],
            TokenIds::Many(ids) => ids.clone(),
        }
    }
}

/// Contents of `genai_config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenaiConfig {
    pub model: ModelSection,
    #[serde(default)]
    pub search: SearchOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSection {
    #[serde(rename = "type", default)]
    pub model_type: String,
    pub context_length: usize,
    pub eos_token_id: TokenIds,
    #[serde(default)]
    pub bos_token_id: Option<u32>,
    #[serde(default)]
    pub pad_token_id: Option<u32>,
    #[serde(default)]
    pub vocab_size: Option<usize>,
    pub decoder: DecoderSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderSection {
    pub filename: String,
    pub head_size: usize,
    #[serde(default)]
    pub hidden_size: usize,
    #[serde(default)]
    pub num_attention_heads: usize,
    pub num_hidden_layers: usize,
    pub num_key_value_heads: usize,
    #[serde(default)]
    pub inputs: DecoderInputs,
    #[serde(default)]
    pub outputs: DecoderOutputs,
}

/// Input tensor names; `%d` in the past-key templates is the layer index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderInputs {
    pub input_ids: String,
    pub attention_mask: String,
    /// Only fed when the graph actually declares it.
    pub position_ids: String,
    pub past_key_names: String,
    pub past_value_names: String,
}

impl Default for DecoderInputs {
    fn default() -> Self {
        Self {
            input_ids: "input_ids".into(),
            attention_mask: "attention_mask".into(),
            position_ids: "position_ids".into(),
            past_key_names: "past_key_values.%d.key".into(),
            past_value_names: "past_key_values.%d.value".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderOutputs {
    pub logits: String,
    pub present_key_names: String,
    pub present_value_names: String,
}

impl Default for DecoderOutputs {
    fn default() -> Self {
        Self {
            logits: "logits".into(),
            present_key_names: "present.%d.key".into(),
            present_value_names: "present.%d.value".into(),
        }
    }
}

/// Expands a `%d` tensor name template for one layer.
pub fn layer_name(template: &str, layer: usize) -> String {
    template.replace(LAYER_PLACEHOLDER, &layer.to_string())
}

impl GenaiConfig {
    /// Reads `genai_config.json` from a model directory.
    pub fn from_dir(model_dir: &Path) -> Result<Self, LlmError> {
        let path = model_dir.join(GENAI_CONFIG_FILE);
        if !path.is_file() {
            return Err(LlmError::ResourceNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(&path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, LlmError> {
        let cfg: GenaiConfig = serde_json::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), LlmError> {
        let decoder = &self.model.decoder;
        if decoder.filename.trim().is_empty() {
            return Err(LlmError::InvalidConfig("decoder filename is empty".into()));
        }
        if decoder.num_hidden_layers == 0
            || decoder.num_key_value_heads == 0
            || decoder.head_size == 0
        {
            return Err(LlmError::InvalidConfig(
                "decoder geometry (layers, kv heads, head size) must be non-zero".into(),
            ));
        }
        if self.model.eos_token_id.to_vec().is_empty() {
            return Err(LlmError::InvalidConfig("eos_token_id list is empty".into()));
        }
        let templates = [
            &decoder.inputs.past_key_names,
            &decoder.inputs.past_value_names,
            &decoder.outputs.present_key_names,
            &decoder.outputs.present_value_names,
        ];
        if let Some(bad) = templates.iter().find(|t| !t.contains(LAYER_PLACEHOLDER)) {
            return Err(LlmError::InvalidConfig(format!(
                "tensor name template {bad:?} has no {LAYER_PLACEHOLDER} placeholder"
            )));
        }
        self.search.validate()
    }

    pub fn eos_token_ids(&self) -> Vec<u32> {
        self.model.eos_token_id.to_vec()
    }
}

/// Everything needed to open a causal model and generate with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Directory holding `genai_config.json`, `tokenizer.json` and the decoder graph.
    pub model_dir: PathBuf,
    pub provider: ExecutionProvider,
    pub session: SessionSettings,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from_paths(&ModelPaths::from_root("."))
    }
}

impl GenerationConfig {
    /// Default configuration rooted at the repository found above the working directory.
    pub fn discover() -> Result<Self, runtime::RuntimeError> {
        Ok(Self::from_paths(&ModelPaths::discover()?))
    }

    pub fn from_paths(paths: &ModelPaths) -> Self {
        Self::from_dir(paths.llm_model_dir())
    }

    pub fn from_dir(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            provider: ExecutionProvider::Cpu,
            session: SessionSettings::default(),
        }
    }

    /// Same files, different provider, with session settings to match.
    pub fn with_provider(&self, provider: ExecutionProvider) -> Self {
        Self {
            model_dir: self.model_dir.clone(),
            provider,
            session: SessionSettings::for_provider(provider),
        }
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_dir.join(TOKENIZER_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QWEN3_GENAI_CONFIG: &str = r#"{
        "model": {
            "bos_token_id": 151643,
            "context_length": 40960,
            "decoder": {
                "session_options": { "log_id": "onnxruntime-genai", "provider_options": [] },
                "filename": "model.onnx",
                "head_size": 128,
                "hidden_size": 1024,
                "inputs": {
                    "input_ids": "input_ids",
                    "attention_mask": "attention_mask",
                    "past_key_names": "past_key_values.%d.key",
                    "past_value_names": "past_key_values.%d.value"
                },
                "outputs": {
                    "logits": "logits",
                    "present_key_names": "present.%d.key",
                    "present_value_names": "present.%d.value"
                },
                "num_attention_heads": 16,
                "num_hidden_layers": 28,
                "num_key_value_heads": 8
            },
            "eos_token_id": [151645, 151643],
            "pad_token_id": 151643,
            "type": "qwen3",
            "vocab_size": 151936
        },
        "search": {
            "do_sample": true,
            "max_length": 40960,
            "num_beams": 1,
            "temperature": 0.6,
            "top_k": 20,
            "top_p": 0.95
        }
    }"#;

    #[test]
    fn parses_qwen3_genai_config() {
        let cfg = GenaiConfig::from_json_str(QWEN3_GENAI_CONFIG).unwrap();
        assert_eq!(cfg.model.model_type, "qwen3");
        assert_eq!(cfg.model.decoder.num_hidden_layers, 28);
        assert_eq!(cfg.model.decoder.num_key_value_heads, 8);
        assert_eq!(cfg.eos_token_ids(), vec![151645, 151643]);
        assert_eq!(cfg.search.top_k, 20);
        assert_eq!(cfg.search.max_length, 40960);
        // Omitted names fall back to the conventional ones.
        assert_eq!(cfg.model.decoder.inputs.position_ids, "position_ids");
    }

    #[test]
    fn single_eos_id_is_accepted() {
        let raw = QWEN3_GENAI_CONFIG.replace("[151645, 151643]", "151645");
        let cfg = GenaiConfig::from_json_str(&raw).unwrap();
        assert_eq!(cfg.eos_token_ids(), vec![151645]);
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let raw = QWEN3_GENAI_CONFIG.replace("present.%d.key", "present.key");
        let err = GenaiConfig::from_json_str(&raw).unwrap_err();
        assert!(matches!(err, LlmError::InvalidConfig(msg) if msg.contains("present.key")));
    }

    #[test]
    fn zero_layers_is_rejected() {
        let raw = QWEN3_GENAI_CONFIG.replace("\"num_hidden_layers\": 28", "\"num_hidden_layers\": 0");
        assert!(matches!(
            GenaiConfig::from_json_str(&raw),
            Err(LlmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn missing_config_file_is_resource_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = GenaiConfig::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, LlmError::ResourceNotFound(p) if p.ends_with(GENAI_CONFIG_FILE)));
    }

    #[test]
    fn reads_config_from_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(GENAI_CONFIG_FILE), QWEN3_GENAI_CONFIG).unwrap();
        let cfg = GenaiConfig::from_dir(dir.path()).unwrap();
        assert_eq!(cfg.model.decoder.filename, "model.onnx");
    }

    #[test]
    fn layer_names_expand() {
        assert_eq!(layer_name("past_key_values.%d.key", 3), "past_key_values.3.key");
        assert_eq!(layer_name("present.%d.value", 27), "present.27.value");
    }

    #[test]
    fn search_presets() {
        let chat = SearchOptions::chat();
        assert_eq!(chat.max_length, 2048);
        assert_eq!(chat.top_k, 20);
        assert!(!chat.is_greedy());
        assert!(SearchOptions::greedy().is_greedy());
        assert!(SearchOptions {
            top_k: 1,
            ..SearchOptions::chat()
        }
        .is_greedy());
    }

    #[test]
    fn greedy_over_model_defaults_keeps_length_cap() {
        let cfg = GenaiConfig::from_json_str(QWEN3_GENAI_CONFIG).unwrap();
        let greedy = cfg.search.clone().into_greedy();
        assert!(greedy.is_greedy());
        assert_eq!(greedy.max_length, 40960);
        assert_eq!(greedy.top_p, 0.95);
        assert_eq!(greedy.temperature, 0.0);
    }

    #[test]
    fn search_validation() {
        assert!(SearchOptions::default().validate().is_ok());
        assert!(SearchOptions::default().with_max_length(0).validate().is_err());
        assert!(SearchOptions {
            top_p: 0.0,
            ..SearchOptions::default()
        }
        .validate()
        .is_err());
        assert!(SearchOptions {
            temperature: f32::NAN,
            ..SearchOptions::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn generation_config_paths() {
        let cfg = GenerationConfig::from_paths(&ModelPaths::from_root("/repo"));
        assert_eq!(cfg.model_dir, PathBuf::from("/repo/models/qwen3-llm/model"));
        assert_eq!(cfg.tokenizer_path(), PathBuf::from("/repo/models/qwen3-llm/model/tokenizer.json"));

        let gpu = cfg.with_provider(ExecutionProvider::CUDA_DEFAULT);
        assert!(!gpu.session.cpu_arena);
        assert_eq!(gpu.model_dir, cfg.model_dir);
    }
}
