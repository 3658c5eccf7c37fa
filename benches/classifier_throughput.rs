//! Benchmarks for command classification
//!
//! - Steady-state classification against a cached rule table
//! - Rule regeneration when the timer name set changes
//! - Batch parsing of raw log text

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use skitime::classifier::CommandClassifier;
use skitime::parser::process_batch;
use std::hint::black_box;

fn names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("Лыжник{}", i)).collect()
}

const MESSAGES: &[&str] = &[
    "Лыжник3 стартовал",
    "старт всех",
    "Лыжник7 прошел 2 круг",
    "Лыжник1 дисквалифицирован",
    "болельщики шумят на трибуне у финиша",
    "финиш Лыжник5",
];

fn classify_cached(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify_cached");
    for count in [4usize, 16, 64] {
        let names = names(count);
        let mut classifier = CommandClassifier::default();
        classifier.refresh(&names);
        group.bench_with_input(BenchmarkId::from_parameter(count), &names, |b, names| {
            b.iter(|| {
                for message in MESSAGES {
                    black_box(classifier.classify(black_box(message), names));
                }
            })
        });
    }
    group.finish();
}

fn regenerate_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("regenerate_rules");
    for count in [4usize, 16, 64] {
        let names = names(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &names, |b, names| {
            let mut classifier = CommandClassifier::default();
            b.iter(|| {
                classifier.invalidate();
                classifier.refresh(black_box(names));
                black_box(classifier.rule_count())
            })
        });
    }
    group.finish();
}

fn parse_batch(c: &mut Criterion) {
    let mut text = String::new();
    for i in 0..500 {
        if i % 5 == 0 {
            text.push_str(&format!("[10:{:02}:{:02}] [Server thread/INFO]: [@ 10 -60 {}] Лыжник{} стартовал\n", i / 60 % 60, i % 60, i, i % 8));
        } else {
            text.push_str(&format!("[10:{:02}:{:02}] [Server thread/INFO]: Player{} joined the game\n", i / 60 % 60, i % 60, i));
        }
    }
    c.bench_function("process_batch_500_lines", |b| b.iter(|| black_box(process_batch(black_box(&text)))));
}

criterion_group!(benches, classify_cached, regenerate_rules, parse_batch);
criterion_main!(benches);
