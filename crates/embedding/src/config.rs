use runtime::{ExecutionProvider, ModelPaths, SessionSettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Hidden size of Qwen3-Embedding-0.6B; every pooled vector has this length.
pub const QWEN3_EMBEDDING_HIDDEN_SIZE: usize = 1024;

/// Longest input the reference run accepts before truncating.
pub const QWEN3_EMBEDDING_MAX_TOKENS: usize = 8192;

/// Hugging Face tokenizer used when the local copy is missing.
pub const QWEN3_EMBEDDING_TOKENIZER_URL: &str =
    "https://huggingface.co/Qwen/Qwen3-Embedding-0.6B/resolve/main/tokenizer.json";

/// Runtime configuration for the embedding pipeline.
///
/// # Example
/// ```no_run
/// use embedding::{EmbeddingConfig, ExecutionProvider};
///
/// let cfg = EmbeddingConfig {
///     provider: ExecutionProvider::CUDA_DEFAULT,
///     ..EmbeddingConfig::discover().unwrap()
/// };
/// assert_eq!(cfg.hidden_size, 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Friendly label surfaced on every [`TextEmbedding`](crate::TextEmbedding).
    pub model_name: String,
    /// ONNX graph that emits `last_hidden_state`.
    pub model_path: PathBuf,
    /// Path to `tokenizer.json`; downloaded from [`tokenizer_url`](Self::tokenizer_url) when missing.
    pub tokenizer_path: PathBuf,
    /// Optional HTTPS URL for fetching the tokenizer on demand.
    pub tokenizer_url: Option<String>,
    /// Width of one hidden-state row.
    pub hidden_size: usize,
    /// Inputs are truncated to this many tokens, including the end-of-sequence marker.
    pub max_sequence_length: usize,
    /// Token appended to every input; the pooled row is the one at this token.
    pub eos_token: String,
    /// L2-normalize pooled vectors (required for the reference comparison).
    pub normalize: bool,
    /// Where the session runs.
    pub provider: ExecutionProvider,
    /// Session knobs forwarded to ONNX Runtime.
    pub session: SessionSettings,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::from_paths(&ModelPaths::from_root("."))
    }
}

impl EmbeddingConfig {
    /// Default configuration rooted at the repository found above the working directory.
    pub fn discover() -> Result<Self, runtime::RuntimeError> {
        Ok(Self::from_paths(&ModelPaths::discover()?))
    }

    pub fn from_paths(paths: &ModelPaths) -> Self {
        Self {
            model_name: "Qwen/Qwen3-Embedding-0.6B".into(),
            model_path: paths.embedding_model(),
            tokenizer_path: paths.embedding_tokenizer(),
            tokenizer_url: Some(QWEN3_EMBEDDING_TOKENIZER_URL.into()),
            hidden_size: QWEN3_EMBEDDING_HIDDEN_SIZE,
            max_sequence_length: QWEN3_EMBEDDING_MAX_TOKENS,
            eos_token: "<|endoftext|>".into(),
            normalize: true,
            provider: ExecutionProvider::Cpu,
            session: SessionSettings::default(),
        }
    }

    /// Same files, different provider, with session settings to match.
    pub fn with_provider(&self, provider: ExecutionProvider) -> Self {
        Self {
            provider,
            session: SessionSettings::for_provider(provider),
            ..self.clone()
        }
    }
}
