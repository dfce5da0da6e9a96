//! Autoregressive decode loop.
//!
//! `Initialized` (prompt appended) → `Generating` (one oracle step per
//! iteration) → `Done`. The oracle's done-condition is checked before every
//! step, never after, so a finished context is never stepped. A raised
//! [`CancelFlag`] ends the loop with [`LlmError::GenerationInterrupted`]
//! carrying the partial text; the oracle is dropped with the loop.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::cancel::CancelFlag;
use crate::oracle::GenerativeOracle;
use crate::tokenizer::{StreamDecoder, TokenCodec};
use crate::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Initialized,
    Generating,
    Done,
}

/// How the final text is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Decode the full list of generated ids once, at the end.
    #[default]
    Buffered,
    /// Decode each id as it arrives and concatenate the deltas.
    Streaming,
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Buffered => f.write_str("buffered"),
            OutputMode::Streaming => f.write_str("streaming"),
        }
    }
}

/// Result of a completed generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    /// Generated ids only, prompt excluded.
    pub tokens: Vec<u32>,
    pub prompt_tokens: usize,
    pub mode: OutputMode,
}

/// Drives a [`GenerativeOracle`] to completion for one prompt.
pub struct DecodeLoop<'c, O, C: ?Sized> {
    oracle: O,
    codec: &'c C,
    mode: OutputMode,
    state: GenerationState,
    prompt_tokens: usize,
    generated: Vec<u32>,
    stream: Option<Box<dyn StreamDecoder + 'c>>,
    streamed: String,
}

impl<'c, O, C> DecodeLoop<'c, O, C>
where
    O: GenerativeOracle,
    C: TokenCodec + ?Sized,
{
    /// Appends `prompt` to `oracle`; the loop starts `Initialized`.
    pub fn new(
        mut oracle: O,
        codec: &'c C,
        prompt: &[u32],
        mode: OutputMode,
    ) -> Result<Self, LlmError> {
        if prompt.is_empty() {
            return Err(LlmError::InvalidInput("prompt encodes to no tokens".into()));
        }
        oracle.append_tokens(prompt)?;
        let stream = match mode {
            OutputMode::Streaming => Some(codec.stream()),
            OutputMode::Buffered => None,
        };
        Ok(Self {
            oracle,
            codec,
            mode,
            state: GenerationState::Initialized,
            prompt_tokens: prompt.len(),
            generated: Vec::new(),
            stream,
            streamed: String::new(),
        })
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn generated(&self) -> &[u32] {
        &self.generated
    }

    /// One iteration. Returns the text delta of the new token (always empty
    /// in buffered mode), or `None` once the oracle reports done.
    pub fn advance(&mut self) -> Result<Option<String>, LlmError> {
        if self.state == GenerationState::Done {
            return Ok(None);
        }
        if self.oracle.is_done() {
            self.state = GenerationState::Done;
            return Ok(None);
        }
        self.state = GenerationState::Generating;

        self.oracle.step()?;
        let token = self.oracle.newest_token().ok_or_else(|| {
            LlmError::InvalidState("oracle produced an empty sequence".into())
        })?;
        self.generated.push(token);

        let delta = match self.stream.as_mut() {
            Some(stream) => stream.step(token)?,
            None => String::new(),
        };
        self.streamed.push_str(&delta);
        Ok(Some(delta))
    }

    /// Runs until done, handing every non-empty streaming delta to `on_text`.
    pub fn run<F>(mut self, cancel: &CancelFlag, mut on_text: F) -> Result<Generation, LlmError>
    where
        F: FnMut(&str),
    {
        loop {
            if cancel.is_cancelled() {
                return Err(self.interrupt());
            }
            match self.advance()? {
                Some(delta) if !delta.is_empty() => on_text(&delta),
                Some(_) => {}
                None => break,
            }
        }
        self.finish()
    }

    /// Final text of a loop that has reached `Done`.
    pub fn finish(self) -> Result<Generation, LlmError> {
        if self.state != GenerationState::Done {
            return Err(LlmError::InvalidState(format!(
                "cannot finish a generation in state {:?}",
                self.state
            )));
        }
        let text = self.text_so_far()?;
        debug!(
            prompt_tokens = self.prompt_tokens,
            generated = self.generated.len(),
            mode = %self.mode,
            "decode_finished"
        );
        Ok(Generation {
            text,
            tokens: self.generated,
            prompt_tokens: self.prompt_tokens,
            mode: self.mode,
        })
    }

    fn text_so_far(&self) -> Result<String, LlmError> {
        match self.mode {
            OutputMode::Streaming => Ok(self.streamed.clone()),
            OutputMode::Buffered => self.codec.decode(&self.generated),
        }
    }

    fn interrupt(mut self) -> LlmError {
        self.state = GenerationState::Done;
        // A decode failure must not mask the interruption itself.
        let partial_text = self.text_so_far().unwrap_or_else(|_| self.streamed.clone());
        debug!(generated = self.generated.len(), "decode_interrupted");
        LlmError::GenerationInterrupted {
            partial_text,
            generated_tokens: self.generated.len(),
        }
    }
}
