//! Criterion benchmarks for the per-cycle hot path.
//!
//! Benchmarks:
//! 1. Indicator engine enrichment at several window lengths
//! 2. Heikin-Ashi pass alone
//! 3. Signal evaluation on the latest row

use chrono::TimeZone;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use hatrader_core::domain::Bar;
use hatrader_core::indicators::{heikin_ashi, IndicatorEngine, IndicatorParams};
use hatrader_core::position::PositionState;
use hatrader_core::signal::{evaluate, StrategyParams};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base = chrono::Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            let open = close - 0.3;
            Bar {
                timestamp: base + chrono::Duration::hours(2 * i as i64),
                open,
                high: close + 1.5,
                low: open - 1.5,
                close,
                volume: 1_000_000.0 + (i % 500) as f64 * 1_000.0,
            }
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_engine(c: &mut Criterion) {
    let engine = IndicatorEngine::new(IndicatorParams::default());
    let mut group = c.benchmark_group("indicator_engine");
    for n in [150usize, 1_000, 10_000] {
        let bars = make_bars(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &bars, |b, bars| {
            b.iter(|| engine.compute(black_box(bars)))
        });
    }
    group.finish();
}

fn bench_heikin_ashi(c: &mut Criterion) {
    let bars = make_bars(10_000);
    c.bench_function("heikin_ashi_10k", |b| b.iter(|| heikin_ashi(black_box(&bars))));
}

fn bench_evaluate(c: &mut Criterion) {
    let engine = IndicatorEngine::new(IndicatorParams::default());
    let rows = engine.compute(&make_bars(150));
    let Some(row) = rows.last() else {
        return;
    };
    let state = PositionState::new(24);
    let params = StrategyParams::default();
    c.bench_function("evaluate_latest_row", |b| {
        b.iter(|| evaluate(black_box(row), 1_000, black_box(&state), &params))
    });
}

criterion_group!(benches, bench_engine, bench_heikin_ashi, bench_evaluate);
criterion_main!(benches);
