//! Qwen3 text embeddings over ONNX Runtime.
//!
//! The model itself is an opaque oracle: it maps token ids to a
//! `(1, seq, 1024)` block of hidden states. What this crate owns is everything
//! around it:
//!
//! - **Tokenization** - encode the text and append `<|endoftext|>`, the position
//!   the model summarises the input at.
//! - **Last-token pooling** - copy the hidden-state row of the last real token.
//!   An attention mask with no real tokens is an error, never an out-of-bounds read.
//! - **L2 normalization** - `f64` accumulation; zero vectors are rejected.
//! - **Reference comparison** - cosine similarity against vectors recorded by an
//!   independent Python run, loaded once from a JSON fixture.
//!
//! ## Quick example
//!
//! ```no_run
//! use embedding::{Embedder, EmbeddingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), embedding::EmbeddingError> {
//!     let cfg = EmbeddingConfig::discover()?;
//!     let mut embedder = Embedder::load(&cfg).await?;
//!     let out = embedder.embed("What is the capital of France?")?;
//!     println!("{} dims, first = {:.4}", out.embedding_dim, out.vector[0]);
//!     Ok(())
//! }
//! ```
//!
//! ## GPU, when there is one
//!
//! [`Embedder::acquire`] never fails just because CUDA is missing; it returns
//! [`Availability::Unavailable`] and the CPU pipeline carries on untouched.
//!
//! Algorithms are written against [`EmbeddingOracle`] and [`EmbeddingTokenize`],
//! so tests drive them with fixed tensors instead of a real model.

pub mod config;
pub mod error;
pub mod types;

pub mod normalize;
pub mod oracle;
pub mod pooling;
pub mod reference;
pub mod similarity;
pub mod tokenizer;

mod assets;
mod pipeline;

pub use crate::config::{EmbeddingConfig, QWEN3_EMBEDDING_HIDDEN_SIZE};
pub use crate::error::EmbeddingError;
pub use crate::normalize::{l2_norm, l2_normalize, l2_normalize_in_place};
pub use crate::oracle::{EmbeddingOracle, OnnxEmbeddingModel};
pub use crate::pipeline::{load_tokenizer, Embedder};
pub use crate::pooling::{last_token_index, last_token_pool};
pub use crate::reference::{
    Comparison, ReferenceEmbedding, ReferenceSet, ReferenceStore, CPU_MATCH_THRESHOLD,
    GPU_MATCH_THRESHOLD,
};
pub use crate::similarity::cosine_similarity;
pub use crate::tokenizer::{EmbeddingTokenize, EmbeddingTokenizer};
pub use crate::types::{HiddenStates, TextEmbedding, TokenSequence};

pub use runtime::{Availability, ExecutionProvider};
