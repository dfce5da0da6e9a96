//! Reference vectors produced by an independent Python/transformers run.
//!
//! The fixture is a JSON object keyed by the exact input text:
//!
//! ```json
//! { "Hola mundo": { "embedding": [0.012, -0.034, ...], "dimension": 1024 } }
//! ```
//!
//! A [`ReferenceStore`] reads it at most once, on first use, behind a lock so
//! concurrent first callers wait for one load instead of racing.

use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::similarity::cosine_similarity;
use crate::EmbeddingError;

/// Minimum cosine similarity accepted for CPU inference.
pub const CPU_MATCH_THRESHOLD: f64 = 0.9999;

/// Minimum cosine similarity accepted for GPU inference; kernels reorder
/// floating-point reductions so results drift slightly further.
pub const GPU_MATCH_THRESHOLD: f64 = 0.999;

/// Overrides the fixture location used by [`ReferenceStore::shared`].
pub const REFERENCE_PATH_ENV: &str = "QWEN3_REFERENCE_EMBEDDINGS";

/// One recorded vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEmbedding {
    pub embedding: Vec<f32>,
    pub dimension: usize,
}

/// Validated fixture contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSet {
    entries: BTreeMap<String, ReferenceEmbedding>,
}

impl ReferenceSet {
    /// Parses and validates fixture JSON.
    pub fn from_json_str(json: &str) -> Result<Self, EmbeddingError> {
        let entries: BTreeMap<String, ReferenceEmbedding> = serde_json::from_str(json)?;
        Self::from_entries(entries)
    }

    pub fn from_path(path: &Path) -> Result<Self, EmbeddingError> {
        if !path.exists() {
            return Err(EmbeddingError::ResourceNotFound(path.display().to_string()));
        }
        let json = fs::read_to_string(path)?;
        let set = Self::from_json_str(&json)?;
        info!(path = %path.display(), texts = set.len(), "reference_fixture_loaded");
        Ok(set)
    }

    pub fn from_entries(
        entries: BTreeMap<String, ReferenceEmbedding>,
    ) -> Result<Self, EmbeddingError> {
        for (text, reference) in &entries {
            if reference.dimension != reference.embedding.len() {
                return Err(EmbeddingError::InvalidFixture(format!(
                    "{text:?} declares dimension {} but holds {} values",
                    reference.dimension,
                    reference.embedding.len()
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, text: &str) -> Option<&ReferenceEmbedding> {
        self.entries.get(text)
    }

    /// Texts in the fixture, in stable (sorted) order.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compares `actual` against the vector recorded for `text`.
    pub fn compare(
        &self,
        text: &str,
        actual: &[f32],
        threshold: f64,
    ) -> Result<Comparison, EmbeddingError> {
        let reference = self
            .get(text)
            .ok_or_else(|| EmbeddingError::MissingReference(text.to_string()))?;
        if reference.dimension != actual.len() {
            return Err(EmbeddingError::LengthMismatch {
                left: actual.len(),
                right: reference.dimension,
            });
        }
        let similarity = cosine_similarity(actual, &reference.embedding)?;
        Ok(Comparison {
            text: text.to_string(),
            similarity,
            threshold,
            dimension: reference.dimension,
        })
    }
}

/// Result of checking one pipeline vector against its reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub text: String,
    pub similarity: f64,
    pub threshold: f64,
    pub dimension: usize,
}

impl Comparison {
    pub fn passed(&self) -> bool {
        self.similarity >= self.threshold
    }
}

/// Lazily loaded, read-only fixture.
#[derive(Debug)]
pub struct ReferenceStore {
    path: PathBuf,
    cell: OnceCell<ReferenceSet>,
}

static SHARED: Lazy<ReferenceStore> = Lazy::new(|| ReferenceStore::new(default_fixture_path()));

impl ReferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceCell::new(),
        }
    }

    /// Process-wide store at [`default_fixture_path`].
    ///
    /// Prefer passing an explicit [`ReferenceStore`]; this exists for test
    /// harnesses that have no natural owner for one.
    pub fn shared() -> &'static ReferenceStore {
        &SHARED
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the fixture on first call; later calls return the cached set.
    /// A failed load is not cached, so a missing file can be added and retried.
    pub fn get(&self) -> Result<&ReferenceSet, EmbeddingError> {
        self.cell.get_or_try_init(|| ReferenceSet::from_path(&self.path))
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// `$QWEN3_REFERENCE_EMBEDDINGS`, else `tests/data/reference_embeddings.json` in this crate.
pub fn default_fixture_path() -> PathBuf {
    match env::var_os(REFERENCE_PATH_ENV) {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("data")
            .join("reference_embeddings.json"),
    }
}
