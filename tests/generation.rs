use std::path::PathBuf;

use qwen3_onnx::llm::{
    ChatTokenizer, DecodeLoop, GenerationState, GenerativeOracle, Sampler, SequenceTracker,
    TokenCodec, format_user_turn,
};
use qwen3_onnx::{CancelFlag, LlmError, OutputMode, SearchOptions};

const VOCAB: usize = 19;
const IM_END: u32 = 2;
const ENDOFTEXT: u32 = 0;

fn tokenizer() -> ChatTokenizer {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("crates/llm/tests/data/tiny_chat_tokenizer.json");
    ChatTokenizer::from_file(&path).expect("tiny chat tokenizer")
}

/// Answers a couple of known questions by putting a clear peak on the next
/// answer token; everything else gets a flat floor. Sampling goes through the
/// real [`Sampler`], bookkeeping through the real [`SequenceTracker`].
struct ToyLm {
    tracker: SequenceTracker,
    sampler: Sampler,
    answer: Vec<u32>,
    peak: f32,
}

impl ToyLm {
    fn new(options: &SearchOptions) -> Self {
        Self {
            tracker: SequenceTracker::new(options.max_length, vec![IM_END, ENDOFTEXT]),
            sampler: Sampler::new(options),
            answer: Vec::new(),
            peak: 8.0,
        }
    }

    fn flat(options: &SearchOptions) -> Self {
        Self {
            peak: 0.0,
            ..Self::new(options)
        }
    }

    fn logits(&self) -> Vec<f32> {
        let mut logits = vec![0.0f32; VOCAB];
        let target = self
            .answer
            .get(self.tracker.generated())
            .copied()
            .unwrap_or(IM_END);
        logits[target as usize] += self.peak;
        logits
    }
}

impl GenerativeOracle for ToyLm {
    fn append_tokens(&mut self, ids: &[u32]) -> Result<(), LlmError> {
        self.tracker.append(ids)?;
        if self.answer.is_empty() {
            self.answer = if ids.contains(&16) {
                // "2 + 2" -> "4"
                vec![18, IM_END]
            } else if ids.contains(&9) {
                // "the capital of france is paris"
                vec![8, 9, 10, 11, 12, 13, IM_END]
            } else {
                vec![6, 7, IM_END]
            };
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), LlmError> {
        self.tracker.ensure_can_step()?;
        let next = self.sampler.sample(&self.logits())?;
        self.tracker.push_generated(next);
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.tracker.is_done()
    }

    fn sequence(&self) -> &[u32] {
        self.tracker.tokens()
    }
}

fn chat(
    question: &str,
    options: &SearchOptions,
    mode: OutputMode,
) -> Result<qwen3_onnx::Generation, LlmError> {
    let tok = tokenizer();
    let prompt = tok.encode(&format_user_turn(question))?;
    DecodeLoop::new(ToyLm::new(options), &tok, &prompt, mode)?.run(&CancelFlag::new(), |_| {})
}

#[test]
fn greedy_arithmetic_answer_contains_four() {
    let out = chat("What is 2+2?", &SearchOptions::greedy(), OutputMode::Buffered).unwrap();
    assert!(out.text.to_lowercase().contains('4'), "{:?}", out.text);
    assert_eq!(out.tokens.last(), Some(&IM_END));
}

#[test]
fn greedy_capital_answer_contains_paris() {
    for mode in [OutputMode::Buffered, OutputMode::Streaming] {
        let out = chat(
            "What is the capital of France?",
            &SearchOptions::greedy(),
            mode,
        )
        .unwrap();
        assert!(out.text.to_lowercase().contains("paris"), "{mode}: {:?}", out.text);
        assert!(!out.text.contains("<|im_end|>"));
    }
}

#[test]
fn streaming_and_buffered_agree() {
    let options = SearchOptions::greedy();
    let buffered = chat("the capital", &options, OutputMode::Buffered).unwrap();
    let streamed = chat("the capital", &options, OutputMode::Streaming).unwrap();
    assert_eq!(buffered.text, streamed.text);
    assert_eq!(buffered.tokens, streamed.tokens);
}

#[test]
fn streaming_deltas_concatenate_to_final_text() {
    let tok = tokenizer();
    let options = SearchOptions::greedy();
    let prompt = tok.encode(&format_user_turn("the capital")).unwrap();

    let mut deltas = Vec::new();
    let out = DecodeLoop::new(ToyLm::new(&options), &tok, &prompt, OutputMode::Streaming)
        .unwrap()
        .run(&CancelFlag::new(), |delta| deltas.push(delta.to_string()))
        .unwrap();

    assert!(deltas.len() > 1);
    assert_eq!(deltas.concat(), out.text);
}

#[test]
fn max_length_stops_generation() {
    let tok = tokenizer();
    let prompt = tok.encode(&format_user_turn("the capital")).unwrap();
    let options = SearchOptions::greedy().with_max_length(prompt.len() + 2);

    let mut decode =
        DecodeLoop::new(ToyLm::new(&options), &tok, &prompt, OutputMode::Buffered).unwrap();
    while decode.advance().unwrap().is_some() {}

    assert_eq!(decode.state(), GenerationState::Done);
    assert_eq!(decode.generated().len(), 2);
    assert_eq!(decode.finish().unwrap().text, "the capital");
}

#[test]
fn prompt_longer_than_max_length_is_rejected() {
    let tok = tokenizer();
    let prompt = tok.encode(&format_user_turn("hello world")).unwrap();
    let options = SearchOptions::greedy().with_max_length(prompt.len() - 1);

    let err = DecodeLoop::new(ToyLm::new(&options), &tok, &prompt, OutputMode::Buffered)
        .err()
        .expect("prompt does not fit");
    assert!(matches!(err, LlmError::InvalidInput(_)));
}

#[test]
fn cancellation_returns_partial_text() {
    let tok = tokenizer();
    let options = SearchOptions::greedy();
    let prompt = tok.encode(&format_user_turn("the capital")).unwrap();
    let cancel = CancelFlag::new();

    let err = DecodeLoop::new(ToyLm::new(&options), &tok, &prompt, OutputMode::Streaming)
        .unwrap()
        .run(&cancel, |_| cancel.cancel())
        .unwrap_err();

    match err {
        LlmError::GenerationInterrupted {
            partial_text,
            generated_tokens,
        } => {
            assert_eq!(generated_tokens, 1);
            assert_eq!(partial_text, "the");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn seeded_sampling_is_reproducible() {
    let options = SearchOptions {
        max_length: 64,
        temperature: 1.0,
        top_k: 0,
        top_p: 1.0,
        seed: Some(42),
    };
    let tok = tokenizer();
    let prompt = tok.encode("hello").unwrap();

    let run = || {
        let mut decode =
            DecodeLoop::new(ToyLm::flat(&options), &tok, &prompt, OutputMode::Buffered).unwrap();
        for _ in 0..5 {
            if decode.advance().unwrap().is_none() {
                break;
            }
        }
        decode.generated().to_vec()
    };

    let first = run();
    assert!(!first.is_empty());
    assert_eq!(first, run());
}
