use serde::{Deserialize, Serialize};

use crate::EmbeddingError;

/// Token ids plus the attention mask the model sees (1 = real token, 0 = padding).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSequence {
    pub ids: Vec<u32>,
    pub attention_mask: Vec<u8>,
}

impl TokenSequence {
    /// Builds a sequence with every position marked as a real token.
    pub fn unpadded(ids: Vec<u32>) -> Self {
        let attention_mask = vec![1; ids.len()];
        Self {
            ids,
            attention_mask,
        }
    }

    /// Builds a sequence from explicit ids and mask, rejecting length disagreement.
    pub fn new(ids: Vec<u32>, attention_mask: Vec<u8>) -> Result<Self, EmbeddingError> {
        if ids.len() != attention_mask.len() {
            return Err(EmbeddingError::InvalidInput(format!(
                "{} token ids but {} attention mask entries",
                ids.len(),
                attention_mask.len()
            )));
        }
        Ok(Self {
            ids,
            attention_mask,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids widened to the `int64` layout ONNX graphs expect.
    pub fn ids_i64(&self) -> Vec<i64> {
        self.ids.iter().map(|&id| i64::from(id)).collect()
    }

    pub fn mask_i64(&self) -> Vec<i64> {
        self.attention_mask.iter().map(|&bit| i64::from(bit)).collect()
    }
}

/// Row-major `(1, sequence_length, hidden_size)` activations from one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenStates {
    data: Vec<f32>,
    sequence_length: usize,
    hidden_size: usize,
}

impl HiddenStates {
    pub fn new(
        data: Vec<f32>,
        sequence_length: usize,
        hidden_size: usize,
    ) -> Result<Self, EmbeddingError> {
        let expected = sequence_length
            .checked_mul(hidden_size)
            .ok_or_else(|| EmbeddingError::InvalidInput("hidden state shape overflows".into()))?;
        if data.len() != expected {
            return Err(EmbeddingError::InvalidInput(format!(
                "hidden states hold {} values, expected {sequence_length} x {hidden_size}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            sequence_length,
            hidden_size,
        })
    }

    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// The `hidden_size` contiguous values at `position`, if in range.
    pub fn row(&self, position: usize) -> Option<&[f32]> {
        if position >= self.sequence_length {
            return None;
        }
        let start = position * self.hidden_size;
        self.data.get(start..start + self.hidden_size)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Embedding output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextEmbedding {
    /// Input text exactly as given.
    pub text: String,
    /// Pooled (and optionally normalized) vector.
    pub vector: Vec<f32>,
    /// Name of the model used to produce the vector.
    pub model_name: String,
    /// Provider the forward pass ran on (`cpu`, `cuda:0`, ...).
    pub provider: String,
    /// Number of tokens fed to the model, end-of-sequence marker included.
    pub token_count: usize,
    /// Dimension of `vector`.
    pub embedding_dim: usize,
    /// Whether [`vector`](Self::vector) was L2-normalized.
    pub normalized: bool,
}
