//! Performance benchmarks for cache mutations
//!
//! Measures:
//! - Wholesale replacement (sort, id assignment, list resolution)
//! - Optimistic add/remove against a populated cache
//! - Linear local-id lookups
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use page_annotations_cache::{
    cache::{AddAnnotationOpts, CacheDeps, PageAnnotationsCache, SetAnnotationsOpts},
    properties::{AnnotationForCache, ListForCache, Selector},
};

const PAGE_URL: &str = "example.com/long-read";

fn annotations(count: usize) -> Vec<AnnotationForCache> {
    (0..count)
        .map(|i| AnnotationForCache {
            local_id: Some(format!("annotation-{i}")),
            normalized_page_url: PAGE_URL.to_string(),
            body: Some(format!("highlighted passage {i}")),
            // Scatter positions so the default sorter has work to do
            selector: Some(Selector::with_text_position(
                format!("passage {i}"),
                ((i * 7919) % 100_000) as u64,
                ((i * 7919) % 100_000 + 20) as u64,
            )),
            created_when: Some(i as i64),
            local_list_ids: vec![(i % 10) as i64],
            ..Default::default()
        })
        .collect()
}

fn lists() -> Vec<ListForCache> {
    (0..10)
        .map(|i| ListForCache {
            local_id: Some(i),
            name: format!("list {i}"),
            ..Default::default()
        })
        .collect()
}

fn populated_cache(count: usize) -> PageAnnotationsCache {
    let mut cache = PageAnnotationsCache::new(CacheDeps {
        normalized_page_url: PAGE_URL.to_string(),
        ..Default::default()
    });
    cache.set_lists(lists());
    cache.set_annotations(PAGE_URL, annotations(count), SetAnnotationsOpts::default());
    cache
}

fn bench_set_annotations(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_annotations");
    for count in [10usize, 100, 1000] {
        let input = annotations(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            let mut cache = populated_cache(0);
            b.iter(|| {
                cache.set_annotations(
                    PAGE_URL,
                    black_box(input.clone()),
                    SetAnnotationsOpts::default(),
                )
            });
        });
    }
    group.finish();
}

fn bench_add_remove(c: &mut Criterion) {
    let mut cache = populated_cache(1000);
    let extra = AnnotationForCache {
        local_id: Some("extra".to_string()),
        normalized_page_url: PAGE_URL.to_string(),
        comment: Some("page note".to_string()),
        created_when: Some(0),
        ..Default::default()
    };

    c.bench_function("add_then_remove_annotation", |b| {
        b.iter(|| {
            let id = cache.add_annotation(black_box(extra.clone()), AddAnnotationOpts::default());
            cache.remove_annotation(&id).ok();
        })
    });
}

fn bench_lookup(c: &mut Criterion) {
    let cache = populated_cache(1000);
    c.bench_function("get_annotation_by_local_id", |b| {
        b.iter(|| cache.get_annotation_by_local_id(black_box("annotation-999")))
    });
}

criterion_group!(benches, bench_set_annotations, bench_add_remove, bench_lookup);
criterion_main!(benches);
