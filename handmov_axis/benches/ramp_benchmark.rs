//! Step-path benchmarks.
//!
//! Per-step work must stay far below the shortest step period (300 µs by
//! default): ramp delay lookup, status decoding, and a full simulated move
//! on a manual clock.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use handmov_axis::clock::ManualClock;
use handmov_axis::motion::{NoCancel, RampPlan};
use handmov_axis::sim::SimulatedAxis;
use handmov_axis::MotionGenerator;
use handmov_common::device::TMC2130;
use handmov_common::motion::{MotionConfig, MotionRequest, SpeedProfile};
use handmov_common::register::decode_status;
use std::hint::black_box;
use std::sync::Arc;

fn bench_ramp_delays(c: &mut Criterion) {
    let mut group = c.benchmark_group("ramp_delays");
    let profile = SpeedProfile::default();
    for steps in [100u32, 1_000, 10_000] {
        let plan = RampPlan::new(steps, &profile).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(steps), &plan, |b, plan| {
            b.iter(|| black_box(plan.delays_us().sum::<f64>()));
        });
    }
    group.finish();
}

fn bench_single_delay(c: &mut Criterion) {
    let plan = RampPlan::new(10_000, &SpeedProfile::default()).unwrap();
    c.bench_function("ramp_delay_lookup", |b| {
        b.iter(|| black_box(plan.delay(black_box(2_500))));
    });
}

fn bench_decode_status(c: &mut Criterion) {
    let word = 0x8100_0ABCu32;
    c.bench_function("decode_drv_status", |b| {
        b.iter(|| black_box(decode_status(black_box(word), TMC2130.status_fields)));
    });
}

fn bench_simulated_move(c: &mut Criterion) {
    let config = MotionConfig {
        reverse_pause_ms: 0,
        ..Default::default()
    };
    let axis = SimulatedAxis::new();
    let mut generator = MotionGenerator::new(axis.pins(), &config, Arc::new(ManualClock::new()));
    generator.enable();

    let mut target = 1_000i64;
    c.bench_function("simulated_move_1000", |b| {
        b.iter(|| {
            let request = MotionRequest::new(target, SpeedProfile::default());
            black_box(generator.plan_and_execute(&request, &mut NoCancel).unwrap());
            target = -target;
        });
    });
}

criterion_group!(
    benches,
    bench_ramp_delays,
    bench_single_delay,
    bench_decode_status,
    bench_simulated_move
);
criterion_main!(benches);
