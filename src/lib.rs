//! Qwen3 embedding and text generation over ONNX Runtime.
//!
//! This umbrella crate re-exports the three workspace crates so callers can
//! depend on one package:
//!
//! - [`runtime`]: model path discovery, execution providers, session acquisition.
//! - [`embedding`]: tokenizer → hidden states → last-token pool → L2 normalize,
//!   plus cosine comparison against a reference fixture.
//! - [`llm`]: KV-cached autoregressive decoding with streaming or buffered output.
//!
//! It also owns the YAML [`config`] used by the `qwen3-onnx` binary and the
//! [`console`] loop behind its `chat` command.

pub mod config;
pub mod console;

pub use embedding;
pub use llm;
pub use runtime;

pub use crate::config::{AppConfig, ConfigLoadError, LogFormat};
pub use crate::console::{ConsoleSummary, run_console};

pub use embedding::{
    Comparison, Embedder, EmbeddingConfig, EmbeddingError, ReferenceSet, ReferenceStore,
    TextEmbedding, cosine_similarity, l2_normalize, last_token_pool,
};
pub use llm::{
    CancelFlag, Generation, GenerationConfig, LanguageModel, LlmError, OutputMode, SearchOptions,
};
pub use runtime::{Availability, ExecutionProvider, ModelPaths, RuntimeError};

/// Inputs embedded by the `embed` command.
pub const DEMO_TEXTS: [&str; 3] = [
    "What is the capital of France?",
    "The quick brown fox jumps over the lazy dog.",
    "Machine learning is a subset of artificial intelligence.",
];

/// `[v0, v1, ...]` for the first `count` values, four decimals each.
pub fn format_preview(values: &[f32], count: usize) -> String {
    let shown: Vec<String> = values.iter().take(count).map(|v| format!("{v:.4}")).collect();
    format!("[{}]", shown.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_rounds_to_four_decimals() {
        assert_eq!(format_preview(&[0.123456, -1.0, 2.5], 10), "[0.1235, -1.0000, 2.5000]");
    }

    #[test]
    fn preview_truncates() {
        let values = vec![0.5f32; 1024];
        assert_eq!(format_preview(&values, 2), "[0.5000, 0.5000]");
        assert_eq!(format_preview(&[], 10), "[]");
    }
}
