//! Autoregressive Qwen3 text generation over ONNX Runtime.
//!
//! The decoder graph is an opaque oracle that turns tokens into logits. This
//! crate owns the loop around it: KV-cached stepping, sampling, incremental
//! detokenization and cooperative cancellation.
//!
//! ```no_run
//! use llm::{CancelFlag, GenerationConfig, LanguageModel, OutputMode, SearchOptions};
//!
//! # fn main() -> Result<(), llm::LlmError> {
//! let cfg = GenerationConfig::discover()?;
//! let mut lm = LanguageModel::load(&cfg)?;
//! let reply = lm.chat(
//!     "What is the capital of France?",
//!     &SearchOptions::greedy(),
//!     OutputMode::Streaming,
//!     &CancelFlag::new(),
//!     |delta| print!("{delta}"),
//! )?;
//! assert!(reply.text.to_lowercase().contains("paris"));
//! # Ok(())
//! # }
//! ```
//!
//! The decode loop is written against [`GenerativeOracle`] and [`TokenCodec`],
//! so it is tested with scripted oracles instead of a real model.

pub mod cancel;
pub mod chat;
pub mod config;
pub mod decode;
pub mod error;
pub mod oracle;
pub mod sampler;
pub mod tokenizer;

mod pipeline;

pub use crate::cancel::CancelFlag;
pub use crate::chat::{
    format_user_turn, ConsoleInput, ABORT_MESSAGE, EMPTY_INPUT_MESSAGE, PROMPT_LABEL,
};
pub use crate::config::{GenaiConfig, GenerationConfig, SearchOptions};
pub use crate::decode::{DecodeLoop, Generation, GenerationState, OutputMode};
pub use crate::error::LlmError;
pub use crate::oracle::{CausalLm, GenerativeOracle, OnnxGenerator, SequenceTracker};
pub use crate::pipeline::LanguageModel;
pub use crate::sampler::Sampler;
pub use crate::tokenizer::{ChatTokenizer, StreamDecoder, TokenCodec};

pub use runtime::{Availability, ExecutionProvider};
