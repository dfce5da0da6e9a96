use std::path::Path;
use tokenizers::Tokenizer;

use crate::{EmbeddingError, TokenSequence};

/// Turns text into the token sequence an embedding oracle consumes.
pub trait EmbeddingTokenize {
    /// Plain encoding, no special tokens added.
    fn encode(&self, text: &str) -> Result<TokenSequence, EmbeddingError>;

    /// Encoding with whatever markers the embedding model requires; the pooled
    /// position is the last real token of this sequence.
    fn prepare_for_embedding(&self, text: &str) -> Result<TokenSequence, EmbeddingError>;
}

/// `tokenizers`-backed adapter for Qwen3-Embedding.
///
/// The embedding model was trained to read its summary off the
/// `<|endoftext|>` marker, so every prepared sequence ends with it.
#[derive(Clone)]
pub struct EmbeddingTokenizer {
    inner: Tokenizer,
    eos_id: u32,
    max_sequence_length: usize,
}

impl EmbeddingTokenizer {
    pub fn from_file(
        path: &Path,
        eos_token: &str,
        max_sequence_length: usize,
    ) -> Result<Self, EmbeddingError> {
        if !path.exists() {
            return Err(EmbeddingError::ResourceNotFound(path.display().to_string()));
        }
        let inner =
            Tokenizer::from_file(path).map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
        Self::from_tokenizer(inner, eos_token, max_sequence_length)
    }

    pub fn from_tokenizer(
        inner: Tokenizer,
        eos_token: &str,
        max_sequence_length: usize,
    ) -> Result<Self, EmbeddingError> {
        if max_sequence_length == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "max_sequence_length must be at least 1".into(),
            ));
        }
        let eos_id = inner.token_to_id(eos_token).ok_or_else(|| {
            EmbeddingError::Tokenizer(format!("vocabulary has no {eos_token:?} token"))
        })?;
        Ok(Self {
            inner,
            eos_id,
            max_sequence_length,
        })
    }

    pub fn eos_id(&self) -> u32 {
        self.eos_id
    }

    pub fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    pub fn decode(&self, ids: &[u32]) -> Result<String, EmbeddingError> {
        self.inner
            .decode(ids, true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))
    }

    fn encode_ids(&self, text: &str) -> Result<Vec<u32>, EmbeddingError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }
}

impl EmbeddingTokenize for EmbeddingTokenizer {
    fn encode(&self, text: &str) -> Result<TokenSequence, EmbeddingError> {
        Ok(TokenSequence::unpadded(self.encode_ids(text)?))
    }

    fn prepare_for_embedding(&self, text: &str) -> Result<TokenSequence, EmbeddingError> {
        let mut ids = self.encode_ids(text)?;
        ids.truncate(self.max_sequence_length - 1);
        ids.push(self.eos_id);
        Ok(TokenSequence::unpadded(ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tiny_tokenizer_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("data")
            .join("tiny_tokenizer.json")
    }

    fn tiny(max_len: usize) -> EmbeddingTokenizer {
        EmbeddingTokenizer::from_file(&tiny_tokenizer_path(), "<|endoftext|>", max_len).unwrap()
    }

    #[test]
    fn encode_adds_nothing() {
        let tok = tiny(16);
        let seq = tok.encode("hello world").unwrap();
        assert_eq!(seq.ids, vec![2, 3]);
        assert_eq!(seq.attention_mask, vec![1, 1]);
    }

    #[test]
    fn prepare_appends_end_of_text() {
        let tok = tiny(16);
        let seq = tok.prepare_for_embedding("hello world").unwrap();
        assert_eq!(seq.ids, vec![2, 3, tok.eos_id()]);
        assert_eq!(seq.attention_mask, vec![1, 1, 1]);
    }

    #[test]
    fn prepare_appends_even_after_existing_marker() {
        let tok = tiny(16);
        let seq = tok.prepare_for_embedding("hello <|endoftext|>").unwrap();
        assert_eq!(seq.ids, vec![2, tok.eos_id(), tok.eos_id()]);
    }

    #[test]
    fn prepare_marker_only_text_pools_second_marker() {
        let tok = tiny(16);
        let seq = tok.prepare_for_embedding("<|endoftext|>").unwrap();
        assert_eq!(seq.ids, vec![tok.eos_id(), tok.eos_id()]);
        assert_eq!(seq.attention_mask, vec![1, 1]);
    }

    #[test]
    fn prepare_empty_text_is_just_the_marker() {
        let tok = tiny(16);
        let seq = tok.prepare_for_embedding("").unwrap();
        assert_eq!(seq.ids, vec![tok.eos_id()]);
    }

    #[test]
    fn prepare_truncates_and_keeps_marker_last() {
        let tok = tiny(3);
        let seq = tok
            .prepare_for_embedding("the capital of france is paris")
            .unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.ids, vec![4, 5, tok.eos_id()]);
    }

    #[test]
    fn unknown_words_map_to_unk() {
        let tok = tiny(16);
        let seq = tok.encode("hello zebra").unwrap();
        assert_eq!(seq.ids, vec![2, 1]);
    }

    #[test]
    fn decode_skips_special_tokens() {
        let tok = tiny(16);
        assert_eq!(tok.decode(&[2, 3, tok.eos_id()]).unwrap(), "hello world");
    }

    #[test]
    fn missing_file_is_resource_not_found() {
        let err = EmbeddingTokenizer::from_file(Path::new("./missing/tokenizer.json"), "<|endoftext|>", 8)
            .err()
            .unwrap();
        assert!(matches!(err, EmbeddingError::ResourceNotFound(_)));
    }

    #[test]
    fn unknown_eos_token_is_rejected() {
        let err = EmbeddingTokenizer::from_file(&tiny_tokenizer_path(), "</s>", 8)
            .err()
            .unwrap();
        assert!(matches!(err, EmbeddingError::Tokenizer(msg) if msg.contains("</s>")));
    }

    #[test]
    fn zero_max_length_is_invalid_config() {
        let err = EmbeddingTokenizer::from_file(&tiny_tokenizer_path(), "<|endoftext|>", 0)
            .err()
            .unwrap();
        assert!(matches!(err, EmbeddingError::InvalidConfig(_)));
    }
}
