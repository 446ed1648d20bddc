use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rainfall::spawn::{ParticleData, SpawnParams};

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");
    for count in [1_024u32, 65_536, 262_144] {
        let params = SpawnParams {
            max_particles: count,
            ..SpawnParams::default()
        };
        group.bench_with_input(BenchmarkId::new("generate", count), &params, |b, params| {
            b.iter(|| ParticleData::generate(black_box(params)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_generate);
criterion_main!(benches);
