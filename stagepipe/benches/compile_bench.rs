//! Benchmarks for pipeline compilation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stagepipe::core::ArtifactKind;
use stagepipe::pipeline::{compile, fraud_detection_pipeline, FRAUD_DETECTION_PIPELINE};
use stagepipe::stages::StageDescriptor;

fn chain(len: usize) -> Vec<StageDescriptor> {
    (0..len)
        .map(|i| {
            let stage = StageDescriptor::new(format!("stage_{i}"), "python:3.11")
                .with_output(format!("out_{i}"), ArtifactKind::Dataset);
            if i == 0 {
                stage
            } else {
                stage.with_input(format!("out_{}", i - 1), ArtifactKind::Dataset)
            }
        })
        .collect()
}

fn compile_benchmark(c: &mut Criterion) {
    c.bench_function("compile_fraud_detection", |b| {
        b.iter(|| compile(FRAUD_DETECTION_PIPELINE, black_box(fraud_detection_pipeline())))
    });

    let stages = chain(200);
    c.bench_function("compile_chain_200", |b| {
        b.iter(|| compile("chain", black_box(stages.clone())))
    });
}

criterion_group!(benches, compile_benchmark);
criterion_main!(benches);
