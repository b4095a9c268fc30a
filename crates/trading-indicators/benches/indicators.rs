//! Benchmarks for streaming indicator updates.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trading_core::traits::StreamingIndicator;
use trading_indicators::{Ema, IndicatorBank, Macd, Rsi};

fn generate_test_data(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 100.0 + (i as f64 * 0.1).sin() * 10.0)
        .collect()
}

fn benchmark_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("streaming");

    for size in [1000, 10000].iter() {
        let data = generate_test_data(*size);

        group.bench_with_input(BenchmarkId::new("ema", size), &data, |b, data| {
            b.iter(|| {
                let mut ema = Ema::new(20);
                for &p in data {
                    black_box(ema.update(p));
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("rsi", size), &data, |b, data| {
            b.iter(|| {
                let mut rsi = Rsi::new(14);
                for &p in data {
                    black_box(rsi.update(p));
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("macd", size), &data, |b, data| {
            b.iter(|| {
                let mut macd = Macd::default();
                for &p in data {
                    black_box(macd.update(p));
                }
            })
        });
    }

    group.finish();
}

fn benchmark_bank(c: &mut Criterion) {
    let mut group = c.benchmark_group("bank");

    for size in [1000, 10000].iter() {
        let data = generate_test_data(*size);

        group.bench_with_input(BenchmarkId::new("update", size), &data, |b, data| {
            b.iter(|| {
                let mut bank = IndicatorBank::new();
                for &p in data {
                    black_box(bank.update(p + 0.5, p - 0.5, p, 1000.0));
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("update_and_vote", size), &data, |b, data| {
            b.iter(|| {
                let mut bank = IndicatorBank::new();
                for &p in data {
                    bank.update(p + 0.5, p - 0.5, p, 1000.0);
                    black_box(bank.votes(p));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_streaming, benchmark_bank);
criterion_main!(benches);
