use std::io;
use thiserror::Error;

/// Errors raised while locating model files or opening ONNX Runtime sessions.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A model, tokenizer or fixture path does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),
    /// The requested accelerator could not be initialised for this session.
    #[error("accelerator unavailable ({provider}): {reason}")]
    AcceleratorUnavailable { provider: String, reason: String },
    /// The execution provider string did not name a known provider.
    #[error("unknown execution provider: {0}")]
    UnknownProvider(String),
    /// Any other ONNX Runtime failure while building or running a session.
    #[error("onnx runtime failure: {0}")]
    Session(String),
    /// Low-level IO failures while touching the filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl RuntimeError {
    /// True for failures that only mean "this accelerator cannot be used here".
    pub fn is_accelerator_unavailable(&self) -> bool {
        matches!(self, RuntimeError::AcceleratorUnavailable { .. })
    }
}
