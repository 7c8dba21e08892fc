use coref::eval::{AssignmentSolver, CorefEvaluation, Evaluator, Metric};
use coref::{ClusterAssembler, GoldAligner, MarginalLoss, MentionIndexer, NO_ANTECEDENT};
use coref_core::{Cluster, Mention};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;

/// Deterministic pseudo-random scores (no RNG dependency).
fn scores(n: usize, k: usize) -> Array2<f32> {
    Array2::from_shape_fn((n, k + 1), |(m, j)| {
        let x = (m * 31 + j * 17) % 23;
        x as f32 / 4.0 - 2.0
    })
}

fn candidates(n: usize, k: usize) -> Array2<usize> {
    Array2::from_shape_fn((n, k), |(m, j)| if j < m { m - 1 - j } else { NO_ANTECEDENT })
}

/// Every `stride`-th token in one cluster per offset.
fn striped(n: usize, stride: usize, offset: usize) -> Vec<Cluster> {
    (0..stride)
        .map(|c| {
            (c + offset..n)
                .step_by(stride)
                .map(Mention::token)
                .collect::<Cluster>()
        })
        .filter(|c| c.len() >= 2)
        .collect()
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for n in [100usize, 500, 2000] {
        let k = 50;
        let mentions = MentionIndexer::new().head_mentions(n);
        let s = scores(n, k);
        let idx = candidates(n, k);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                ClusterAssembler::new()
                    .decode(black_box(&mentions), s.view(), idx.view())
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_loss(c: &mut Criterion) {
    let n = 500;
    let k = 50;
    let mentions = MentionIndexer::new().head_mentions(n);
    let s = scores(n, k);
    let idx = candidates(n, k);
    let gold = GoldAligner::new()
        .align(&mentions, &striped(n, 7, 0), idx.view())
        .unwrap();

    c.bench_function("marginal_loss_500x51", |b| {
        b.iter(|| MarginalLoss::new().compute(black_box(s.view()), gold.view()).unwrap())
    });
}

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics");
    group.sample_size(20);

    let documents: Vec<(Vec<Cluster>, Vec<Cluster>)> = (0..50)
        .map(|d| (striped(400, 9 + d % 3, 0), striped(400, 9, d % 2)))
        .collect();

    for metric in Metric::ALL {
        group.bench_function(metric.name(), |b| {
            b.iter(|| {
                let mut evaluator = Evaluator::new(metric);
                evaluator.update_corpus(black_box(&documents));
                evaluator.f1()
            })
        });
    }
    group.bench_function("all_three", |b| {
        b.iter(|| CorefEvaluation::compute_corpus(black_box(&documents)))
    });
    group.finish();
}

fn bench_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("assignment");
    for size in [10usize, 50, 200] {
        let weights = Array2::from_shape_fn((size, size + 3), |(i, j)| {
            ((i * 13 + j * 7) % 29) as f64 / 29.0
        });
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| AssignmentSolver::new().maximize(black_box(weights.view())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_loss, bench_metrics, bench_assignment);
criterion_main!(benches);
