use std::path::Path;
use tokenizers::decoders::DecoderWrapper;
use tokenizers::models::ModelWrapper;
use tokenizers::normalizers::NormalizerWrapper;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::processors::PostProcessorWrapper;
use tokenizers::{DecodeStream, Tokenizer};

use crate::LlmError;

/// Incremental decoder: one token id in, the text it completes out.
///
/// Byte-level vocabularies split characters across ids, so a step may yield
/// nothing until a later id completes the character.
pub trait StreamDecoder {
    fn step(&mut self, id: u32) -> Result<String, LlmError>;
}

/// Tokenizer contract of the decode loop.
pub trait TokenCodec {
    fn encode(&self, text: &str) -> Result<Vec<u32>, LlmError>;

    fn decode(&self, ids: &[u32]) -> Result<String, LlmError>;

    fn stream(&self) -> Box<dyn StreamDecoder + '_>;
}

/// `tokenizers`-backed codec for the causal model's `tokenizer.json`.
#[derive(Clone)]
pub struct ChatTokenizer {
    inner: Tokenizer,
}

impl ChatTokenizer {
    pub fn from_file(path: &Path) -> Result<Self, LlmError> {
        if !path.is_file() {
            return Err(LlmError::ResourceNotFound(path.display().to_string()));
        }
        let inner = Tokenizer::from_file(path).map_err(|e| LlmError::Tokenizer(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn from_tokenizer(inner: Tokenizer) -> Self {
        Self { inner }
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.inner.token_to_id(token)
    }
}

impl TokenCodec for ChatTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, LlmError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| LlmError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String, LlmError> {
        self.inner
            .decode(ids, true)
            .map_err(|e| LlmError::Tokenizer(e.to_string()))
    }

    fn stream(&self) -> Box<dyn StreamDecoder + '_> {
        Box::new(ChatDecodeStream {
            inner: self.inner.decode_stream(true),
        })
    }
}

struct ChatDecodeStream<'a> {
    inner: DecodeStream<
        'a,
        ModelWrapper,
        NormalizerWrapper,
        PreTokenizerWrapper,
        PostProcessorWrapper,
        DecoderWrapper,
    >,
}

impl StreamDecoder for ChatDecodeStream<'_> {
    fn step(&mut self, id: u32) -> Result<String, LlmError> {
        self.inner
            .step(id)
            .map(Option::unwrap_or_default)
            .map_err(|e| LlmError::Tokenizer(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tiny() -> ChatTokenizer {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("data")
            .join("tiny_chat_tokenizer.json");
        ChatTokenizer::from_file(&path).unwrap()
    }

    #[test]
    fn encode_recognises_chat_markers() {
        let tok = tiny();
        let ids = tok.encode("<|im_start|>user\nhello<|im_end|>").unwrap();
        let start = tok.token_to_id("<|im_start|>").unwrap();
        let end = tok.token_to_id("<|im_end|>").unwrap();
        assert_eq!(ids.first(), Some(&start));
        assert_eq!(ids.last(), Some(&end));
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn decode_drops_special_tokens() {
        let tok = tiny();
        let ids = tok.encode("<|im_start|>assistant\nparis<|im_end|>").unwrap();
        assert_eq!(tok.decode(&ids).unwrap(), "assistant paris");
    }

    #[test]
    fn stream_concatenation_matches_full_decode() {
        let tok = tiny();
        let ids = tok.encode("the capital of france is paris").unwrap();
        let mut stream = tok.stream();
        let mut streamed = String::new();
        for id in &ids {
            streamed.push_str(&stream.step(*id).unwrap());
        }
        assert_eq!(streamed, tok.decode(&ids).unwrap());
    }

    #[test]
    fn stream_yields_nothing_for_special_tokens() {
        let tok = tiny();
        let end = tok.token_to_id("<|im_end|>").unwrap();
        let mut stream = tok.stream();
        assert_eq!(stream.step(tok.token_to_id("paris").unwrap()).unwrap(), "paris");
        assert_eq!(stream.step(end).unwrap(), "");
    }

    #[test]
    fn missing_file_is_resource_not_found() {
        assert!(matches!(
            ChatTokenizer::from_file(Path::new("./missing/tokenizer.json")),
            Err(LlmError::ResourceNotFound(_))
        ));
    }
}
