use agl_core::classifier::Classifier;
use agl_core::dom::memory::synthetic_page;
use agl_core::dom::Document;
use agl_core::profile::GENERIC;
use agl_core::scheduler::ManualScheduler;
use agl_core::sweep::Sweeper;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_classify(c: &mut Criterion) {
    let doc = synthetic_page("news.example", 200);
    let elements = doc.query_all("*").expect("universal selector");
    let classifier = Classifier::default();

    c.bench_function("classify_all_elements", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for element in &elements {
                if classifier.classify(black_box(element)) {
                    hits += 1;
                }
            }
            hits
        })
    });
}

fn bench_sweep(c: &mut Criterion) {
    let sweeper = Sweeper::new(GENERIC.catalog(None), Classifier::default(), 10.0);
    let clock = ManualScheduler::new();
    let mut group = c.benchmark_group("sweep");

    // A fresh page each iteration: a swept page only has marked elements left.
    for blocks in [50usize, 200] {
        group.bench_function(format!("fresh_{blocks}"), |b| {
            b.iter_with_setup(
                || synthetic_page("news.example", blocks),
                |doc| sweeper.run(black_box(&doc), &clock),
            )
        });
    }

    let swept = synthetic_page("news.example", 200);
    sweeper.run(&swept, &clock);
    group.bench_function("resweep_200", |b| b.iter(|| sweeper.run(black_box(&swept), &clock)));

    group.finish();
}

criterion_group!(benches, bench_classify, bench_sweep);
criterion_main!(benches);
