use criterion::{black_box, criterion_group, criterion_main, Criterion};
use embedrt_core::{engine_for, DistanceKind, EMBEDDING_DIM};

fn gallery(rows: usize) -> Vec<Vec<f32>> {
    (0..rows)
        .map(|r| {
            (0..EMBEDDING_DIM)
                .map(|i| ((r * 31 + i * 7) % 97) as f32 * 0.01)
                .collect()
        })
        .collect()
}

fn bench_distance_range(c: &mut Criterion) {
    let matrix = gallery(1000);

    for kind in [DistanceKind::Portable, DistanceKind::Accelerated] {
        let engine = engine_for(kind);
        c.bench_function(&format!("distance_{}_1000", kind), |b| {
            b.iter(|| {
                let d = engine.compute_range(black_box(&matrix), 0, 0, matrix.len()).unwrap();
                black_box(d);
            });
        });
    }
}

criterion_group!(benches, bench_distance_range);
criterion_main!(benches);
