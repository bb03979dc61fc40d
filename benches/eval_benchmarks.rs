use apidesign_core::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

// ============================================================================
// Synthetic designs
// ============================================================================

/// `size` media types chained into a ring, each with a resource serving it.
fn define_ring(s: &mut Session, size: usize) {
    s.api("bench", |s| {
        s.title("Benchmark API");
        s.base_path("/v1");
    });
    for i in 0..size {
        let identifier = format!("application/vnd.item{i}");
        let next = format!("application/vnd.item{}", (i + 1) % size);
        s.media_type(&identifier, move |s| {
            s.attributes(move |s| {
                s.attribute("id", args![Primitive::Integer, body(|s| s.minimum(1))]);
                s.attribute("name", args![Primitive::String, body(|s| s.max_length(64))]);
                s.attribute("next", args![next.as_str()]);
                s.required(&["id"]);
            });
            s.view_with("tiny", |s| {
                s.attribute("id", args![]);
            });
        });
        let media = identifier.clone();
        s.resource(&format!("item{i}"), move |s| {
            s.base_path(&format!("/items{i}"));
            s.media(media.as_str(), None);
            s.action("show", |s| {
                s.routing([get("/:id")]);
                s.response("OK", args![]);
                s.response("NotFound", args![]);
            });
            s.action("list", |s| {
                s.routing([get("")]);
                s.params(|s| {
                    s.param("page", args![Primitive::Integer]);
                });
            });
        });
    }
}

/// `depth` user types nested by reference, each with a few attributes.
fn define_chain(s: &mut Session, depth: usize) {
    for i in 0..depth {
        let child = format!("T{}", i + 1);
        let last = i + 1 == depth;
        s.user_type(&format!("T{i}"), move |s| {
            s.attribute("value", args![Primitive::String, body(|s| s.enum_values(["a", "b"]))]);
            s.attribute("count", args![Primitive::Integer]);
            if !last {
                s.attribute("child", args![child.as_str()]);
            }
        });
    }
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_evaluate_small(c: &mut Criterion) {
    c.bench_function("evaluate_small_design", |b| {
        b.iter(|| evaluate(|s| define_ring(s, black_box(3))))
    });
}

fn bench_evaluate_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_by_media_types");
    for size in [10, 50, 200] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| evaluate(|s| define_ring(s, size)))
        });
    }
    group.finish();
}

fn bench_type_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_type_chain");
    for depth in [10, 100, 500] {
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| evaluate(|s| define_chain(s, depth)))
        });
    }
    group.finish();
}

fn bench_evaluation_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation_without_finalize");
    for size in [10, 200] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut session = Session::new();
                define_ring(&mut session, size);
                black_box(session.run_all())
            })
        });
    }
    group.finish();
}

fn bench_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("design_serialization");
    for size in [10, 200] {
        let Ok(design) = evaluate(|s| define_ring(s, size)) else {
            panic!("benchmark design should evaluate");
        };
        group.bench_with_input(BenchmarkId::new("json", size), &design, |b, design| {
            b.iter(|| design.to_json())
        });
        group.bench_with_input(BenchmarkId::new("yaml", size), &design, |b, design| {
            b.iter(|| design.to_yaml())
        });
    }
    group.finish();
}

criterion_group!(
    evaluation_benches,
    bench_evaluate_small,
    bench_evaluate_scaling,
    bench_type_chain,
    bench_evaluation_only
);
criterion_group!(serialization_benches, bench_serialization);

criterion_main!(evaluation_benches, serialization_benches);
