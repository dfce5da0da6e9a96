//! Repository layout conventions.
//!
//! Model files live under a `models/` directory that sits somewhere above the
//! current working directory (tests run from crate directories, the CLI from
//! the repository root). We walk upward a bounded number of levels and take
//! the first directory that has a `models` child.

use std::env;
use std::path::{Path, PathBuf};

use crate::RuntimeError;

/// Upper bound on how many directories we climb looking for `models/`.
pub const MAX_SEARCH_DEPTH: usize = 10;

/// Name of the directory that marks the repository root.
pub const MODELS_DIR: &str = "models";

/// Finds the repository root starting from the current working directory.
pub fn find_repository_root() -> Result<PathBuf, RuntimeError> {
    let cwd = env::current_dir()?;
    find_repository_root_from(&cwd)
}

/// Finds the first ancestor of `start` (including `start`) that contains a
/// `models` directory, looking at most [`MAX_SEARCH_DEPTH`] levels.
pub fn find_repository_root_from(start: &Path) -> Result<PathBuf, RuntimeError> {
    let mut current = Some(start);

    for _ in 0..MAX_SEARCH_DEPTH {
        let Some(dir) = current else { break };
        if dir.join(MODELS_DIR).is_dir() {
            return Ok(dir.to_path_buf());
        }
        current = dir.parent();
    }

    Err(RuntimeError::ResourceNotFound(format!(
        "could not locate repository root with '{MODELS_DIR}' directory above {}",
        start.display()
    )))
}

/// Resolved locations of both models below a `models` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    models: PathBuf,
}

impl ModelPaths {
    /// Resolves the repository root from the working directory.
    pub fn discover() -> Result<Self, RuntimeError> {
        Ok(Self::from_root(find_repository_root()?))
    }

    /// Expects `root` to contain `models/`.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        Self {
            models: root.join(MODELS_DIR),
        }
    }

    /// Points straight at a models directory, whatever it is called.
    pub fn from_models_dir(models: impl Into<PathBuf>) -> Self {
        Self {
            models: models.into(),
        }
    }

    pub fn models_dir(&self) -> PathBuf {
        self.models.clone()
    }

    /// `models/qwen3-embedding/model/model.onnx`
    pub fn embedding_model(&self) -> PathBuf {
        self.models_dir()
            .join("qwen3-embedding")
            .join("model")
            .join("model.onnx")
    }

    /// `models/qwen3-embedding/tokenizer.json`
    pub fn embedding_tokenizer(&self) -> PathBuf {
        self.models_dir()
            .join("qwen3-embedding")
            .join("tokenizer.json")
    }

    /// `models/qwen3-llm/model`, the directory holding `genai_config.json`,
    /// `tokenizer.json` and the decoder graph.
    pub fn llm_model_dir(&self) -> PathBuf {
        self.models_dir().join("qwen3-llm").join("model")
    }
}

/// Returns `path` when it exists, otherwise a [`RuntimeError::ResourceNotFound`].
pub fn require_existing(path: &Path) -> Result<&Path, RuntimeError> {
    if path.exists() {
        Ok(path)
    } else {
        Err(RuntimeError::ResourceNotFound(path.display().to_string()))
    }
}
