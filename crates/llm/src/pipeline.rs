use runtime::{acquire, Availability, ExecutionProvider};
use std::time::Instant;
use tracing::{info, warn};

use crate::cancel::CancelFlag;
use crate::chat::format_user_turn;
use crate::decode::{DecodeLoop, Generation, OutputMode};
use crate::oracle::CausalLm;
use crate::tokenizer::{ChatTokenizer, TokenCodec};
use crate::{GenerationConfig, LlmError, SearchOptions};

/// A causal model paired with its tokenizer.
pub struct LanguageModel {
    model: CausalLm,
    tokenizer: ChatTokenizer,
}

impl LanguageModel {
    /// Loads `tokenizer.json` and the decoder on `cfg.provider`. Every failure,
    /// accelerator included, is returned as an error.
    pub fn load(cfg: &GenerationConfig) -> Result<Self, LlmError> {
        let tokenizer = ChatTokenizer::from_file(&cfg.tokenizer_path())?;
        let model = CausalLm::open(cfg)?;
        Ok(Self { model, tokenizer })
    }

    /// Like [`LanguageModel::load`] but an unusable accelerator yields
    /// [`Availability::Unavailable`] instead of an error.
    pub fn acquire(cfg: &GenerationConfig) -> Result<Availability<Self>, LlmError> {
        acquire(cfg.provider, |provider: ExecutionProvider| {
            Self::load(&cfg.with_provider(provider))
        })
    }

    pub fn provider(&self) -> ExecutionProvider {
        self.model.provider()
    }

    /// Search options shipped in the model's `genai_config.json`.
    pub fn search_defaults(&self) -> SearchOptions {
        self.model.config().search.clone()
    }

    /// Wraps `user_text` in the chat-turn template and generates the reply.
    pub fn chat<F>(
        &mut self,
        user_text: &str,
        options: &SearchOptions,
        mode: OutputMode,
        cancel: &CancelFlag,
        on_text: F,
    ) -> Result<Generation, LlmError>
    where
        F: FnMut(&str),
    {
        self.generate(&format_user_turn(user_text), options, mode, cancel, on_text)
    }

    /// Generates a continuation of `prompt` exactly as given.
    pub fn generate<F>(
        &mut self,
        prompt: &str,
        options: &SearchOptions,
        mode: OutputMode,
        cancel: &CancelFlag,
        on_text: F,
    ) -> Result<Generation, LlmError>
    where
        F: FnMut(&str),
    {
        let start = Instant::now();
        let ids = self.tokenizer.encode(prompt)?;
        let generator = self.model.generator(options)?;
        let result = DecodeLoop::new(generator, &self.tokenizer, &ids, mode)
            .and_then(|decode| decode.run(cancel, on_text));

        match &result {
            Ok(generation) => info!(
                provider = %self.model.provider(),
                prompt_tokens = generation.prompt_tokens,
                generated = generation.tokens.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "generation_complete"
            ),
            Err(LlmError::GenerationInterrupted {
                generated_tokens, ..
            }) => info!(
                provider = %self.model.provider(),
                generated = generated_tokens,
                elapsed_ms = start.elapsed().as_millis(),
                "generation_interrupted"
            ),
            Err(err) => warn!(error = %err, "generation_failure"),
        }
        result
    }
}
