use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use finetune_eval::{
    bootstrap_with_config, compute_metrics, BootstrapConfig, Dataset, EvalError, Evaluator, Example,
};
use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const NUM_CLASSES: usize = 8;

fn random_labels(n: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(0..NUM_CLASSES)).collect()
}

fn class_names() -> Vec<String> {
    (0..NUM_CLASSES).map(|i| format!("class_{}", i)).collect()
}

fn bench_compute_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("Metrics");
    group.sample_size(50);
    group.warm_up_time(std::time::Duration::from_secs(1));

    let classes = class_names();
    for n in [100, 1_000, 10_000] {
        let truth = random_labels(n, 1);
        let predicted = random_labels(n, 2);
        group.bench_with_input(BenchmarkId::new("compute_metrics", n), &n, |b, _| {
            b.iter(|| compute_metrics(black_box(&predicted), black_box(&truth), &classes).unwrap())
        });
    }
    group.finish();
}

fn bench_bootstrap(c: &mut Criterion) {
    let mut group = c.benchmark_group("Bootstrap");
    group.sample_size(10);

    // Scores every row from its first real token
    let model = |ids: ArrayView2<'_, i64>, _mask: ArrayView2<'_, i64>| -> Result<Array2<f32>, EvalError> {
        Ok(Array2::from_shape_fn((ids.nrows(), NUM_CLASSES), |(row, col)| {
            if ids[[row, 1]] as usize % NUM_CLASSES == col { 1.0 } else { 0.0 }
        }))
    };
    let labels = random_labels(1_000, 3);
    let dataset = Dataset::new(
        labels
            .iter()
            .enumerate()
            .map(|(i, &class_id)| Example {
                input_ids: vec![101, i as i64, 102],
                attention_mask: vec![1, 1, 1],
                class_id,
                sentence: format!("sentence {}", i),
            })
            .collect(),
    );
    let evaluator = Evaluator::new(&model, class_names(), 32).unwrap();

    for iterations in [10, 100] {
        let config = BootstrapConfig { iterations, seed: 42 };
        group.bench_with_input(BenchmarkId::new("bootstrap", iterations), &config, |b, config| {
            b.iter(|| bootstrap_with_config(&evaluator, black_box(&dataset), config).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compute_metrics, bench_bootstrap);
criterion_main!(benches);
