use crate::{EmbeddingError, HiddenStates};

/// Position of the last real token: the first `1` found scanning the mask backward.
pub fn last_token_index(attention_mask: &[u8]) -> Result<usize, EmbeddingError> {
    attention_mask
        .iter()
        .rposition(|&bit| bit == 1)
        .ok_or_else(|| {
            EmbeddingError::InvalidInput(format!(
                "attention mask of length {} has no real tokens",
                attention_mask.len()
            ))
        })
}

/// Last-token pooling: copies the hidden-state row of the last real token.
///
/// Only that one row is read. The mask must cover exactly the tensor's
/// sequence positions.
pub fn last_token_pool(
    hidden: &HiddenStates,
    attention_mask: &[u8],
) -> Result<Vec<f32>, EmbeddingError> {
    if attention_mask.len() != hidden.sequence_length() {
        return Err(EmbeddingError::InvalidInput(format!(
            "attention mask length {} does not match sequence length {}",
            attention_mask.len(),
            hidden.sequence_length()
        )));
    }

    let index = last_token_index(attention_mask)?;
    let row = hidden.row(index).ok_or_else(|| {
        EmbeddingError::InvalidInput(format!("row {index} is outside the hidden states"))
    })?;
    Ok(row.to_vec())
}
