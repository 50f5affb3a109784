//! Broad-phase benchmarks: membership refresh and query at arena scale.

use bulwark::spatial::{QueryHits, SpatialGrid};
use bulwark_shared::math::Rect;
use bulwark_shared::Vec2;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn scattered_positions(n: u32) -> Vec<Vec2> {
    // Deterministic pseudo-random layout; no RNG dependency needed here.
    (0..n)
        .map(|i| {
            let a = i.wrapping_mul(2_654_435_769);
            let x = (a >> 16) as f32 / 65_536.0 - 0.5;
            let y = (a & 0xFFFF) as f32 / 65_536.0 - 0.5;
            Vec2::new(x * 3800.0, y * 3800.0)
        })
        .collect()
}

fn bench_membership_refresh(c: &mut Criterion) {
    let positions = scattered_positions(2048);
    let mut grid = SpatialGrid::new(2000.0, 7, 4096);
    for (i, &pos) in positions.iter().enumerate() {
        grid.insert(i as u32, Rect::square(pos, 40.0));
    }

    c.bench_function("grid_refresh_2k", |b| {
        let mut offset = 0.0f32;
        b.iter(|| {
            offset += 1.0;
            for (i, &pos) in positions.iter().enumerate() {
                let moved = pos + Vec2::new(offset.sin() * 10.0, offset.cos() * 10.0);
                grid.update(i as u32, Rect::square(black_box(moved), 40.0));
            }
        });
    });
}

fn bench_query(c: &mut Criterion) {
    let positions = scattered_positions(2048);
    let mut grid = SpatialGrid::new(2000.0, 7, 4096);
    for (i, &pos) in positions.iter().enumerate() {
        grid.insert(i as u32, Rect::square(pos, 40.0));
    }

    c.bench_function("grid_query_view_rect", |b| {
        let mut hits = QueryHits::new();
        b.iter(|| {
            grid.query(Rect::square(black_box(Vec2::ZERO), 960.0), &mut hits);
            hits.iter().count()
        });
    });
}

criterion_group!(benches, bench_membership_refresh, bench_query);
criterion_main!(benches);
