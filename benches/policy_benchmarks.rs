//! Benchmarks for the per-tick analysis path
//!
//! Run with: cargo bench --bench policy_benchmarks
//!
//! One monitoring tick turns a stats report into a sample and runs the
//! decision list. Both steps must stay far below the 3 s polling interval.

use call_copilot::quality::{decide, sample_from_report, HintState};
use call_copilot::testing::synthetic_stats_report;
use call_copilot::types::{NetworkSample, TransportState};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_decide(c: &mut Criterion) {
    let mut group = c.benchmark_group("decide");

    let samples = [
        ("clean", NetworkSample::connected()),
        ("moderate_loss", NetworkSample::connected().with_packet_loss(15.0)),
        ("severe_loss", NetworkSample::connected().with_packet_loss(40.0)),
        ("high_rtt", NetworkSample::connected().with_round_trip_time(800.0)),
        (
            "disconnected",
            NetworkSample::connected().with_state(TransportState::Disconnected),
        ),
    ];

    for (name, sample) in samples.iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), sample, |b, sample| {
            let mut state = HintState::new();
            let mut now_ms = 0u64;
            b.iter(|| {
                now_ms += 3_000;
                black_box(decide(black_box(sample), &mut state, now_ms, 15_000))
            });
        });
    }

    group.finish();
}

fn bench_sample_from_report(c: &mut Criterion) {
    let report = synthetic_stats_report(7.5, 120.0);

    c.bench_function("sample_from_report", |b| {
        b.iter(|| {
            black_box(sample_from_report(
                black_box(&report),
                TransportState::Connected,
                Some(TransportState::Disconnected),
            ))
        })
    });
}

criterion_group!(benches, bench_decide, bench_sample_from_report);
criterion_main!(benches);
