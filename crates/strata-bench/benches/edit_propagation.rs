//! Criterion micro-benchmarks for edit registration and spatial queries.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strata_bench::terrain_edits;
use strata_core::Aabb;
use strata_edits::{EditConfig, EditDatabase};

/// Benchmark: register a 16×16 terrain batch into an empty database and
/// propagate it through all LODs.
fn bench_register_terrain(c: &mut Criterion) {
    let batch = terrain_edits(16, 42);
    c.bench_function("register_terrain_16x16", |b| {
        b.iter(|| {
            let mut db = EditDatabase::new(EditConfig::new(0.25)).unwrap();
            let summary = db.register_edits(black_box(&batch)).unwrap();
            black_box(summary);
        });
    });
}

/// Benchmark: re-register one changed brick into a populated database.
fn bench_incremental_edit(c: &mut Criterion) {
    let mut db = EditDatabase::new(EditConfig::new(0.25)).unwrap();
    db.register_edits(&terrain_edits(16, 42)).unwrap();
    let variants = [terrain_edits(1, 1), terrain_edits(1, 2)];
    let mut i = 0usize;
    c.bench_function("incremental_edit", |b| {
        b.iter(|| {
            let summary = db.register_edits(&variants[i % 2]).unwrap();
            i += 1;
            black_box(summary);
        });
    });
}

/// Benchmark: bounds query against LOD 0 and LOD 2 of a populated database.
fn bench_get_edits(c: &mut Criterion) {
    let mut db = EditDatabase::new(EditConfig::new(0.25)).unwrap();
    db.register_edits(&terrain_edits(32, 7)).unwrap();
    let bounds = Aabb::new([4.0, 0.0, 4.0], [12.0, 1.0, 12.0]);
    let mut out = Vec::new();
    c.bench_function("get_edits_lod0", |b| {
        b.iter(|| black_box(db.get_edits(black_box(&bounds), 0, &mut out).unwrap()));
    });
    c.bench_function("get_edits_lod2", |b| {
        b.iter(|| black_box(db.get_edits(black_box(&bounds), 2, &mut out).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_register_terrain,
    bench_incremental_edit,
    bench_get_edits
);
criterion_main!(benches);
