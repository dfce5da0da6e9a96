use runtime::{AsRuntimeError, RuntimeError};
use std::io;
use thiserror::Error;

/// Errors surfaced by the embedding pipeline and the reference comparator.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Model, tokenizer or fixture file is missing.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// Inputs that would otherwise cause an out-of-bounds read (empty or all-zero
    /// attention mask, tensor/mask shape disagreement).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// L2 normalization of a vector whose norm is zero or not finite.
    #[error("degenerate vector: {0}")]
    DegenerateVector(String),
    /// Two vectors that should be compared element-wise differ in length.
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
    /// Reference fixture failed validation (e.g. dimension disagrees with data).
    #[error("invalid reference fixture: {0}")]
    InvalidFixture(String),
    /// No reference vector is recorded for the given text.
    #[error("no reference embedding for text: {0:?}")]
    MissingReference(String),
    /// Configuration is inconsistent.
    #[error("invalid embedding config: {0}")]
    InvalidConfig(String),
    /// Unable to download the tokenizer.
    #[error("download failed: {0}")]
    Download(String),
    /// Tokenizer construction or encode/decode failure.
    #[error("tokenizer failure: {0}")]
    Tokenizer(String),
    /// ONNX Runtime failure or unexpected model output.
    #[error("inference failure: {0}")]
    Inference(String),
    /// Session acquisition problems bubbled up from the runtime crate.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// Low-level IO failures while touching the filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Fixture JSON could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AsRuntimeError for EmbeddingError {
    fn as_runtime_error(&self) -> Option<&RuntimeError> {
        match self {
            EmbeddingError::Runtime(err) => Some(err),
            _ => None,
        }
    }
}
