use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use motifhmm::hmm::{Model, MotifLayout};
use motifhmm::random_seq::generate;

fn criterion_benchmark(c: &mut Criterion) {
    let mut model = Model::new();
    model
        .add_motif_iupac("TGACGT", 0.03, 100.0, 1.0, "m1", &MotifLayout::default())
        .unwrap();
    model
        .add_motif_iupac("CCAATNNR", 0.03, 100.0, 1.0, "m2", &MotifLayout::default())
        .unwrap();

    let mut group = c.benchmark_group("forward_backward");
    for length in [100, 1_000, 10_000].iter() {
        let seq = generate(*length, 0);
        group.bench_with_input(BenchmarkId::new("forward", length), &seq, |b, seq| {
            b.iter(|| model.compute_forward_scaled(black_box(seq)))
        });
        group.bench_with_input(BenchmarkId::new("expected_counts", length), &seq, |b, seq| {
            b.iter(|| model.expected_counts(black_box(seq)))
        });
        group.bench_with_input(BenchmarkId::new("viterbi", length), &seq, |b, seq| {
            b.iter(|| model.viterbi(black_box(seq)))
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
