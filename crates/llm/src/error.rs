use runtime::{AsRuntimeError, RuntimeError};
use std::io;
use thiserror::Error;

/// Errors surfaced while loading a causal model or generating with it.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Model directory, `genai_config.json`, decoder or tokenizer is missing.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// Empty prompt, empty logits and other unusable inputs.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Configuration is inconsistent.
    #[error("invalid generation config: {0}")]
    InvalidConfig(String),
    /// A generator was driven out of order (e.g. stepping a finished context).
    #[error("invalid generator state: {0}")]
    InvalidState(String),
    /// The caller cancelled generation; carries whatever was produced so far.
    #[error("generation interrupted after {generated_tokens} tokens")]
    GenerationInterrupted {
        partial_text: String,
        generated_tokens: usize,
    },
    /// Tokenizer construction or encode/decode failure.
    #[error("tokenizer failure: {0}")]
    Tokenizer(String),
    /// ONNX Runtime failure or unexpected model output.
    #[error("inference failure: {0}")]
    Inference(String),
    /// Session acquisition problems bubbled up from the runtime crate.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// `genai_config.json` could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Text produced before an interruption, if this is one.
    pub fn partial_text(&self) -> Option<&str> {
        match self {
            LlmError::GenerationInterrupted { partial_text, .. } => Some(partial_text),
            _ => None,
        }
    }
}

impl AsRuntimeError for LlmError {
    fn as_runtime_error(&self) -> Option<&RuntimeError> {
        match self {
            LlmError::Runtime(err) => Some(err),
            _ => None,
        }
    }
}
