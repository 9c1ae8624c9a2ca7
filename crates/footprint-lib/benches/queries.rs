//! Performance benchmarks for footprint-lib
//!
//! Run with: cargo bench --package footprint-lib

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use footprint_lib::{
    DrawShape, EngineConfig, FeatureIndex, MapEngine, Record, SpatialQueryEngine, utils,
};
use geo::{Coord, Rect};

/// Generate a grid of sites around a base location, alternating points and small polygons
fn generate_records(count: usize, base_lat: f64, base_lon: f64) -> Vec<Record> {
    let side = (count as f64).sqrt().ceil() as usize;
    let statuses = ["pending", "in_progress", "review", "completed", "on_hold"];
    let priorities = ["low", "medium", "high", "critical"];

    (0..count)
        .map(|i| {
            let lat = base_lat + (i / side) as f64 * 0.002;
            let lon = base_lon + (i % side) as f64 * 0.002;
            let wkt = if i % 2 == 0 {
                format!("SRID=4326;POINT ({lon} {lat})")
            } else {
                let d = 0.0008;
                format!(
                    "SRID=4326;POLYGON (({lon} {lat}, {} {lat}, {} {}, {lon} {}, {lon} {lat}))",
                    lon + d,
                    lon + d,
                    lat + d,
                    lat + d
                )
            };
            Record::new(i as i64, wkt)
                .with_status(statuses[i % statuses.len()])
                .with_priority(priorities[i % priorities.len()])
        })
        .collect()
}

fn create_viewport(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Rect<f64> {
    Rect::new(
        utils::wgs84_to_mercator(min_lat, min_lon).0,
        utils::wgs84_to_mercator(max_lat, max_lon).0,
    )
}

fn mercator(lat: f64, lon: f64) -> Coord<f64> {
    utils::wgs84_to_mercator(lat, lon).0
}

// ============================================================================
// Core Benchmarks
// ============================================================================

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");
    group.sample_size(20);

    let records = generate_records(10_000, 51.5, -0.1);
    group.throughput(Throughput::Elements(records.len() as u64));

    group.bench_function("cold_10k", |b| {
        b.iter_batched(
            FeatureIndex::new,
            |mut index| index.rebuild(&records),
            BatchSize::SmallInput,
        );
    });

    // Same rows again: every geometry comes from the cache
    let mut warm = FeatureIndex::new();
    warm.rebuild(&records);
    group.bench_function("cached_10k", |b| {
        b.iter(|| warm.rebuild(&records));
    });

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    let records = generate_records(10_000, 51.5, -0.1);
    let mut index = FeatureIndex::new();
    index.rebuild(&records);
    let engine = SpatialQueryEngine::new(&index);

    let box_shape = DrawShape::Box {
        p1: mercator(51.52, -0.08),
        p2: mercator(51.56, -0.04),
    };
    group.bench_function("box_10k", |b| {
        b.iter(|| engine.run(&box_shape));
    });

    let radius_shape = DrawShape::Radius {
        center: mercator(51.6, 0.0),
        radius_m: 2_000.0,
    };
    group.bench_function("radius_10k", |b| {
        b.iter(|| engine.run(&radius_shape));
    });

    let order: Vec<i64> = index.all().map(|f| f.id).collect();
    let at = mercator(51.55, -0.05);
    group.bench_function("point_10k", |b| {
        b.iter(|| engine.point_query(at, 10.0, &order));
    });

    let viewport = create_viewport(51.5, -0.1, 51.6, 0.0);
    group.bench_function("viewport_10k", |b| {
        b.iter(|| engine.viewport_query(&viewport));
    });

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    let mut engine = MapEngine::new(EngineConfig::default());
    engine.replace_records(generate_records(10_000, 51.5, -0.1));
    engine.viewport_settled(create_viewport(51.5, -0.1, 51.55, -0.05));
    engine.set_grid_selection((0..10_000).step_by(7));

    group.bench_function("render_set_10k", |b| {
        b.iter(|| engine.render_set());
    });

    group.bench_function("selection_projection_10k", |b| {
        b.iter(|| engine.selection_projection());
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_rebuild, bench_queries, bench_render);

criterion_main!(benches);
