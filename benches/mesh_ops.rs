//! Benchmarks for triangulation and mesh improvement.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use eikmesh::prelude::*;
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_points(n: usize, size: f64, seed: u64) -> Vec<Point2<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| Point2::new(rng.gen_range(0.0..size), rng.gen_range(0.0..size)))
        .collect()
}

fn triangulate(points: &[Point2<f64>], size: f64, kind: LocatorKind) -> Triangulation {
    let bound = BoundingBox::from_origin_size(0.0, 0.0, size, size);
    let mut triangulation = Triangulation::new(bound, kind);
    triangulation.insert_all(points).unwrap();
    triangulation
}

const LOCATORS: [LocatorKind; 3] = [LocatorKind::Walk, LocatorKind::Hierarchy, LocatorKind::DelaunayTree];

fn bench_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_10k");
    group.sample_size(10);
    let points = random_points(10_000, 1000.0, 7);
    for kind in LOCATORS {
        group.bench_with_input(BenchmarkId::from_parameter(format!("{:?}", kind)), &kind, |b, &kind| {
            b.iter(|| {
                let mut t = triangulate(&points, 1000.0, kind);
                t.finish().unwrap();
                t
            });
        });
    }
    group.finish();
}

fn bench_location(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate_1k_in_10k");
    let points = random_points(10_000, 1000.0, 7);
    let queries = random_points(1_000, 1000.0, 8);
    for kind in LOCATORS {
        let t = triangulate(&points, 1000.0, kind);
        group.bench_function(BenchmarkId::from_parameter(format!("{:?}", kind)), |b| {
            b.iter(|| {
                let mut found = 0;
                for q in &queries {
                    if t.locate(black_box(q)).is_some() {
                        found += 1;
                    }
                }
                found
            });
        });
    }
    group.finish();
}

fn bench_eikmesh(c: &mut Criterion) {
    let bound = BoundingBox::from_origin_size(-10.0, -10.0, 20.0, 20.0);
    let new_eikmesh = |options: EikMeshOptions| {
        let mut eikmesh = EikMesh::new(annulus(Point2::origin(), 2.0, 10.0), Uniform(0.2), bound, options);
        eikmesh.initialize().unwrap();
        eikmesh
    };

    let mut group = c.benchmark_group("eikmesh_annulus");
    group.sample_size(10);
    group.bench_function("initialize", |b| {
        b.iter(|| new_eikmesh(EikMeshOptions::default()));
    });
    group.bench_function("step_parallel", |b| {
        let mut eikmesh = new_eikmesh(EikMeshOptions::default());
        b.iter(|| eikmesh.step().unwrap());
    });
    group.bench_function("step_sequential", |b| {
        let mut eikmesh = new_eikmesh(EikMeshOptions::default().sequential());
        b.iter(|| eikmesh.step().unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_insertion, bench_location, bench_eikmesh);
criterion_main!(benches);
