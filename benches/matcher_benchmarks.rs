//! # ManeleMax Performance Benchmarks
//!
//! Benchmarks for the hot path of every play event: normalizing metadata and
//! searching it for keywords.
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench normalization
//! cargo bench matching
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use manelemax::keywords::{find_match, KeywordSet, DEFAULT_MAX_WORDS};
use manelemax::text;
use std::hint::black_box;

/// Realistic titles: short, long, accented, matching and not
const TITLES: &[&str] = &[
    "Nicolae Guță - Hit",
    "Florin Salam feat. Bogdan de la Ploiești - Saint Tropez (Official Video 2024)",
    "Random Song",
    "Ştefan & Ţuţu - Când ești tu lângă mine (Live @ Sala Palatului, București)",
    "An extremely long title that goes on and on with many words and never mentions any keyword at all",
];

/// Digits are stripped by normalization, so spell indices with letters
fn spelled(i: u32) -> String {
    i.to_string()
        .bytes()
        .map(|d| char::from(b'a' + (d - b'0')))
        .collect()
}

fn benchmark_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalization");

    for (i, title) in TITLES.iter().enumerate() {
        group.bench_with_input(BenchmarkId::new("prepare", i), title, |b, title| {
            b.iter(|| black_box(text::prepare(black_box(title))))
        });
    }

    group.finish();
}

fn benchmark_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("matching");
    let builtin = KeywordSet::builtin();

    for (i, title) in TITLES.iter().enumerate() {
        group.bench_with_input(BenchmarkId::new("builtin", i), title, |b, title| {
            b.iter(|| black_box(find_match(black_box(title), &builtin, DEFAULT_MAX_WORDS)))
        });
    }

    let long = TITLES[4];
    for max_words in [1, 2, 4, 0] {
        group.bench_with_input(BenchmarkId::new("max_words", max_words), &max_words, |b, &max_words| {
            b.iter(|| black_box(find_match(black_box(long), &builtin, max_words)))
        });
    }

    let large = KeywordSet::new((0..10_000).map(|i| format!("artist {}", spelled(i))));
    group.bench_function("large_set_no_match", |b| {
        b.iter(|| black_box(find_match(black_box(TITLES[1]), &large, DEFAULT_MAX_WORDS)))
    });

    group.finish();
}

// Group all benchmarks
criterion_group!(benches, benchmark_normalization, benchmark_matching);

criterion_main!(benches);
