use runtime::{acquire, Availability, ExecutionProvider};
use std::time::Instant;
use tracing::{info, warn};

use crate::assets::resolve_tokenizer_path;
use crate::normalize::l2_normalize_in_place;
use crate::oracle::{EmbeddingOracle, OnnxEmbeddingModel};
use crate::pooling::last_token_pool;
use crate::tokenizer::{EmbeddingTokenize, EmbeddingTokenizer};
use crate::{EmbeddingConfig, EmbeddingError, TextEmbedding};

/// Tokenizer → oracle → last-token pool → L2 normalize.
pub struct Embedder<O = OnnxEmbeddingModel, T = EmbeddingTokenizer> {
    tokenizer: T,
    oracle: O,
    model_name: String,
    normalize: bool,
}

impl Embedder {
    /// Loads the tokenizer (downloading it if needed) and opens the ONNX session on
    /// `cfg.provider`. Every failure, accelerator included, is returned as an error.
    pub async fn load(cfg: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let tokenizer = load_tokenizer(cfg).await?;
        Self::with_tokenizer(cfg, tokenizer)
    }

    /// Like [`Embedder::load`] but an unusable accelerator yields
    /// [`Availability::Unavailable`] instead of an error.
    pub async fn acquire(cfg: &EmbeddingConfig) -> Result<Availability<Self>, EmbeddingError> {
        let tokenizer = load_tokenizer(cfg).await?;
        Self::acquire_with_tokenizer(cfg, tokenizer)
    }

    /// Opens a session for an already-loaded tokenizer; lets CPU and GPU
    /// pipelines share one tokenizer load.
    pub fn with_tokenizer(
        cfg: &EmbeddingConfig,
        tokenizer: EmbeddingTokenizer,
    ) -> Result<Self, EmbeddingError> {
        let oracle = OnnxEmbeddingModel::open(
            &cfg.model_path,
            cfg.provider,
            &cfg.session,
            cfg.hidden_size,
        )?;
        Ok(Self::new(tokenizer, oracle, &cfg.model_name, cfg.normalize))
    }

    pub fn acquire_with_tokenizer(
        cfg: &EmbeddingConfig,
        tokenizer: EmbeddingTokenizer,
    ) -> Result<Availability<Self>, EmbeddingError> {
        acquire(cfg.provider, |provider: ExecutionProvider| {
            Self::with_tokenizer(&cfg.with_provider(provider), tokenizer)
        })
    }
}

/// Resolves and parses `tokenizer.json` for `cfg`.
pub async fn load_tokenizer(cfg: &EmbeddingConfig) -> Result<EmbeddingTokenizer, EmbeddingError> {
    let path = resolve_tokenizer_path(cfg).await?;
    EmbeddingTokenizer::from_file(&path, &cfg.eos_token, cfg.max_sequence_length)
}

impl<O, T> Embedder<O, T>
where
    O: EmbeddingOracle,
    T: EmbeddingTokenize,
{
    pub fn new(tokenizer: T, oracle: O, model_name: &str, normalize: bool) -> Self {
        Self {
            tokenizer,
            oracle,
            model_name: model_name.to_string(),
            normalize,
        }
    }

    /// Embeds one text.
    pub fn embed(&mut self, text: &str) -> Result<TextEmbedding, EmbeddingError> {
        let start = Instant::now();
        match self.embed_inner(text) {
            Ok(embedding) => {
                info!(
                    provider = %embedding.provider,
                    tokens = embedding.token_count,
                    dim = embedding.embedding_dim,
                    elapsed_micros = start.elapsed().as_micros(),
                    "embed_success"
                );
                Ok(embedding)
            }
            Err(err) => {
                warn!(error = %err, elapsed_micros = start.elapsed().as_micros(), "embed_failure");
                Err(err)
            }
        }
    }

    /// Embeds texts one after another, preserving order. Stops at the first failure.
    pub fn embed_batch<S: AsRef<str>>(
        &mut self,
        texts: &[S],
    ) -> Result<Vec<TextEmbedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text.as_ref())).collect()
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    fn embed_inner(&mut self, text: &str) -> Result<TextEmbedding, EmbeddingError> {
        let tokens = self.tokenizer.prepare_for_embedding(text)?;
        let hidden = self.oracle.forward(&tokens)?;
        let mut vector = last_token_pool(&hidden, &tokens.attention_mask)?;
        if self.normalize {
            l2_normalize_in_place(&mut vector)?;
        }

        Ok(TextEmbedding {
            text: text.to_string(),
            embedding_dim: vector.len(),
            vector,
            model_name: self.model_name.clone(),
            provider: self.oracle.provider(),
            token_count: tokens.len(),
            normalized: self.normalize,
        })
    }
}
