//! Performance benchmarks for the observable store and templates.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use sudo_core::{ChangeFilter, ChangeHandler, Observable, Observer, Template, TemplateCache};

/// Benchmark set + deliver with varying observer counts
fn bench_set_and_deliver(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_and_deliver");

    for observers in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("observers", observers),
            &observers,
            |b, &n| {
                let store = Observable::new();
                for _ in 0..n {
                    store.observe(Observer::new(|_, record| {
                        black_box(record);
                    }));
                }
                let mut i = 0u64;
                b.iter(|| {
                    i += 1;
                    store.set("counter", i, false);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark a batch of held writes flushed once
fn bench_held_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("held_batch");

    for batch in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("records", batch), &batch, |b, &n| {
            let store = Observable::new();
            store.observe(Observer::new(|_, record| {
                black_box(record);
            }));
            b.iter(|| {
                for i in 0..n {
                    store.set_path("stats.count", i, true).ok();
                }
                store.deliver_change_records();
            });
        });
    }

    group.finish();
}

fn bench_filter_dispatch(c: &mut Criterion) {
    let store = Observable::new();
    ChangeFilter::new()
        .on("title", ChangeHandler::new(|change| {
            black_box(change);
        }))
        .attach(&store);

    c.bench_function("filter_dispatch", |b| {
        b.iter(|| {
            store.set("title", "a", false);
            store.set("other", "b", false);
        })
    });
}

/// Benchmark rendering a list template with varying item counts
fn bench_template_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("template_render");
    let template = Template::compile(
        "<ul>{{ for todo, i in todos }}<li id=\"t{{= i }}\"{{ if todo.done }} class=\"done\"{{ end }}>{{- todo.title }}</li>{{ end }}</ul>",
    )
    .unwrap();

    for items in [10, 100, 1000] {
        let todos: Vec<_> = (0..items)
            .map(|i| json!({"title": format!("todo <{}>", i), "done": i % 3 == 0}))
            .collect();
        let data = json!({ "todos": todos });

        group.bench_with_input(BenchmarkId::new("items", items), &data, |b, data| {
            b.iter(|| template.render(black_box(data)).unwrap())
        });
    }

    group.finish();
}

fn bench_template_compile(c: &mut Criterion) {
    let source = "{{ if a }}{{= a.b + 1 }}{{ else if c }}{{- c }}{{ else }}none{{ end }}".repeat(20);

    c.bench_function("template_compile", |b| {
        b.iter(|| Template::compile(black_box(&source)).unwrap())
    });

    let cache = TemplateCache::new(16);
    c.bench_function("template_cache_hit", |b| {
        b.iter(|| cache.get_or_compile(black_box(&source)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_set_and_deliver,
    bench_held_batch,
    bench_filter_dispatch,
    bench_template_render,
    bench_template_compile,
);
criterion_main!(benches);
