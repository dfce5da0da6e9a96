use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use qwen3_onnx::embedding::{HiddenStates, QWEN3_EMBEDDING_HIDDEN_SIZE};
use qwen3_onnx::llm::{Sampler, SearchOptions};
use qwen3_onnx::{cosine_similarity, l2_normalize, last_token_pool};

/// Deterministic pseudo-random values in [-1, 1).
fn values(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..len).map(|_| rng.f32() * 2.0 - 1.0).collect()
}

/// Last-token pooling over increasingly long sequences.
fn bench_pooling(c: &mut Criterion) {
    let mut group = c.benchmark_group("last_token_pool");
    for &seq_len in &[16usize, 512, 8192] {
        let hidden = HiddenStates::new(
            values(seq_len * QWEN3_EMBEDDING_HIDDEN_SIZE, 7),
            seq_len,
            QWEN3_EMBEDDING_HIDDEN_SIZE,
        )
        .expect("hidden states");
        let mut mask = vec![1u8; seq_len];
        // Right padding on the last quarter.
        mask[seq_len - seq_len / 4..].fill(0);

        group.bench_with_input(BenchmarkId::from_parameter(seq_len), &seq_len, |b, _| {
            b.iter(|| last_token_pool(black_box(&hidden), black_box(&mask)).unwrap());
        });
    }
    group.finish();
}

fn bench_vector_ops(c: &mut Criterion) {
    let a = values(QWEN3_EMBEDDING_HIDDEN_SIZE, 1);
    let b = values(QWEN3_EMBEDDING_HIDDEN_SIZE, 2);

    let mut group = c.benchmark_group("vector_ops");
    group.throughput(Throughput::Elements(QWEN3_EMBEDDING_HIDDEN_SIZE as u64));
    group.bench_function("l2_normalize_1024", |bench| {
        bench.iter(|| l2_normalize(black_box(&a)).unwrap());
    });
    group.bench_function("cosine_similarity_1024", |bench| {
        bench.iter(|| cosine_similarity(black_box(&a), black_box(&b)).unwrap());
    });
    group.finish();
}

/// One sampling decision over a Qwen3-sized vocabulary.
fn bench_sampler(c: &mut Criterion) {
    let logits = values(151_936, 3);
    let mut group = c.benchmark_group("sampler");

    let mut greedy = Sampler::new(&SearchOptions::greedy());
    group.bench_function("greedy", |b| {
        b.iter(|| greedy.sample(black_box(&logits)).unwrap());
    });

    let mut chat = Sampler::new(&SearchOptions {
        seed: Some(11),
        ..SearchOptions::chat()
    });
    group.bench_function("chat_top_k_top_p", |b| {
        b.iter(|| chat.sample(black_box(&logits)).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_pooling, bench_vector_ops, bench_sampler);
criterion_main!(benches);
