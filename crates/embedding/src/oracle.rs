use ort::session::{Session, SessionInputValue};
use ort::value::Tensor;
use runtime::{open_session, ExecutionProvider, SessionSettings};
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

use crate::{EmbeddingError, HiddenStates, TokenSequence};

/// Anything that maps one token sequence to its `(1, seq, hidden)` activations.
pub trait EmbeddingOracle {
    fn forward(&mut self, tokens: &TokenSequence) -> Result<HiddenStates, EmbeddingError>;

    /// Provider label surfaced on results.
    fn provider(&self) -> String {
        "cpu".into()
    }
}

/// Qwen3-Embedding exported to ONNX, producing `last_hidden_state`.
pub struct OnnxEmbeddingModel {
    session: Session,
    provider: ExecutionProvider,
    input_names: Vec<String>,
    output_name: String,
    hidden_size: usize,
}

impl OnnxEmbeddingModel {
    pub fn open(
        model_path: &Path,
        provider: ExecutionProvider,
        settings: &SessionSettings,
        hidden_size: usize,
    ) -> Result<Self, EmbeddingError> {
        let session = open_session(model_path, provider, settings)?;
        let input_names = session.inputs.iter().map(|i| i.name.clone()).collect();
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| EmbeddingError::Inference("model declares no outputs".into()))?;

        Ok(Self {
            session,
            provider,
            input_names,
            output_name,
            hidden_size,
        })
    }

    pub fn execution_provider(&self) -> ExecutionProvider {
        self.provider
    }

    fn build_inputs(
        &self,
        tokens: &TokenSequence,
    ) -> Result<Vec<(Cow<'static, str>, SessionInputValue<'static>)>, EmbeddingError> {
        let seq_len = tokens.len();
        let mut inputs = Vec::with_capacity(self.input_names.len());

        for name in &self.input_names {
            let data: Vec<i64> = match name.as_str() {
                "input_ids" => tokens.ids_i64(),
                "attention_mask" => tokens.mask_i64(),
                "token_type_ids" => vec![0; seq_len],
                "position_ids" => (0..seq_len as i64).collect(),
                other => {
                    return Err(EmbeddingError::Inference(format!(
                        "unsupported model input '{other}'"
                    )))
                }
            };
            let tensor = Tensor::from_array(([1usize, seq_len], data))
                .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
            inputs.push((Cow::Owned(name.clone()), SessionInputValue::from(tensor)));
        }

        if inputs.is_empty() {
            return Err(EmbeddingError::Inference(
                "model did not declare any inputs".into(),
            ));
        }
        Ok(inputs)
    }
}

impl EmbeddingOracle for OnnxEmbeddingModel {
    fn forward(&mut self, tokens: &TokenSequence) -> Result<HiddenStates, EmbeddingError> {
        if tokens.is_empty() {
            return Err(EmbeddingError::InvalidInput("empty token sequence".into()));
        }

        let inputs = self.build_inputs(tokens)?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            EmbeddingError::Inference(format!("model returned no '{}' output", self.output_name))
        })?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        debug!(?dims, provider = %self.provider, "embedding_forward");

        match dims.as_slice() {
            [1, seq, hidden] if *seq as usize == tokens.len() && *hidden as usize == self.hidden_size => {
                HiddenStates::new(data.to_vec(), tokens.len(), self.hidden_size)
            }
            _ => Err(EmbeddingError::Inference(format!(
                "expected output shape [1, {}, {}], got {dims:?}",
                tokens.len(),
                self.hidden_size
            ))),
        }
    }

    fn provider(&self) -> String {
        self.provider.label()
    }
}
