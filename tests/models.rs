//! Checks against the real Qwen3 ONNX exports under `models/`.
//!
//! Run with `cargo test --test models -- --ignored` once the models and the
//! reference fixture are in place.

use qwen3_onnx::embedding::load_tokenizer;
use qwen3_onnx::{
    Availability, CancelFlag, Embedder, EmbeddingConfig, ExecutionProvider, GenerationConfig,
    LanguageModel, OutputMode, ReferenceStore, SearchOptions,
    embedding::{CPU_MATCH_THRESHOLD, GPU_MATCH_THRESHOLD, QWEN3_EMBEDDING_HIDDEN_SIZE},
};

/// Greedy decoding on top of the model's own `genai_config.json` search block.
fn greedy(lm: &LanguageModel) -> SearchOptions {
    lm.search_defaults().into_greedy()
}

fn assert_matches_reference(embedder: &mut Embedder, threshold: f64) {
    let references = ReferenceStore::shared().get().expect("reference fixture");
    assert!(!references.is_empty());
    for text in references.texts() {
        let embedding = embedder.embed(text).expect("embed");
        assert_eq!(embedding.embedding_dim, QWEN3_EMBEDDING_HIDDEN_SIZE);
        let comparison = references
            .compare(text, &embedding.vector, threshold)
            .expect("compare");
        assert!(
            comparison.passed(),
            "{text:?}: similarity {} < {threshold}",
            comparison.similarity
        );
    }
}

#[tokio::test]
#[ignore = "requires local ONNX + tokenizer assets under models/"]
async fn cpu_embeddings_match_reference() {
    let cfg = EmbeddingConfig::discover().expect("models/ directory");
    let mut embedder = Embedder::load(&cfg).await.expect("cpu embedder");
    assert_matches_reference(&mut embedder, CPU_MATCH_THRESHOLD);
}

#[tokio::test]
#[ignore = "requires local ONNX + tokenizer assets under models/"]
async fn gpu_embeddings_match_reference_when_available() {
    let cpu_cfg = EmbeddingConfig::discover().expect("models/ directory");
    let tokenizer = load_tokenizer(&cpu_cfg).await.expect("tokenizer");
    let mut cpu = Embedder::with_tokenizer(&cpu_cfg, tokenizer.clone()).expect("cpu embedder");

    let gpu_cfg = cpu_cfg.with_provider(ExecutionProvider::CUDA_DEFAULT);
    match Embedder::acquire_with_tokenizer(&gpu_cfg, tokenizer).expect("acquire") {
        Availability::Ready(mut gpu) => {
            assert_matches_reference(&mut gpu, GPU_MATCH_THRESHOLD);
            drop(gpu);
        }
        Availability::Unavailable { reason, .. } => {
            eprintln!("skipping gpu comparison: {reason}");
        }
    }

    // The CPU session is unaffected by whatever happened on the accelerator.
    assert_matches_reference(&mut cpu, CPU_MATCH_THRESHOLD);
}

#[test]
#[ignore = "requires local ONNX + tokenizer assets under models/"]
fn greedy_generation_answers_arithmetic() {
    let cfg = GenerationConfig::discover().expect("models/ directory");
    let mut lm = LanguageModel::load(&cfg).expect("cpu model");
    let options = greedy(&lm);
    let out = lm
        .chat(
            "What is 2+2?",
            &options,
            OutputMode::Buffered,
            &CancelFlag::new(),
            |_| {},
        )
        .expect("generation");
    assert!(out.text.to_lowercase().contains('4'), "{:?}", out.text);
}

#[test]
#[ignore = "requires local ONNX + tokenizer assets under models/"]
fn greedy_generation_names_paris() {
    let cfg = GenerationConfig::discover().expect("models/ directory");
    let mut lm = LanguageModel::load(&cfg).expect("cpu model");

    let options = greedy(&lm);
    let mut streamed = String::new();
    let out = lm
        .chat(
            "What is the capital of France?",
            &options,
            OutputMode::Streaming,
            &CancelFlag::new(),
            |delta| streamed.push_str(delta),
        )
        .expect("generation");
    assert!(out.text.to_lowercase().contains("paris"), "{:?}", out.text);
    assert_eq!(streamed, out.text);
}

#[test]
#[ignore = "requires local ONNX + tokenizer assets under models/"]
fn generation_degrades_when_gpu_is_missing() {
    let cfg = GenerationConfig::discover()
        .expect("models/ directory")
        .with_provider(ExecutionProvider::CUDA_DEFAULT);
    let gpu = LanguageModel::acquire(&cfg).expect("acquire never fails on the accelerator");
    if let Availability::Unavailable { reason, .. } = &gpu {
        eprintln!("gpu unavailable: {reason}");
    }

    let mut cpu = LanguageModel::load(&cfg.with_provider(ExecutionProvider::Cpu)).expect("cpu");
    assert_eq!(cpu.provider(), ExecutionProvider::Cpu);
    let options = greedy(&cpu);
    let out = cpu
        .chat(
            "What is 2+2?",
            &options,
            OutputMode::Buffered,
            &CancelFlag::new(),
            |_| {},
        )
        .expect("generation");
    assert!(out.text.contains('4'));
}
