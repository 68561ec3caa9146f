//! Sweep cost per mode.
//!
//! Run with: cargo bench -p devcorr-optimize

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use devcorr_core::{LayerPointSet, RangeConstraint, ThresholdConfig};
use devcorr_optimize::{FourPointOptimizer, Mode, OptimizerParams, RotationSweep};

fn layers() -> (LayerPointSet, LayerPointSet) {
    let carbon = LayerPointSet::from_corners(
        "carbon",
        [[0.031, 0.012], [0.052, 0.021], [0.024, -0.011], [0.043, 0.004]],
    );
    let insulation = LayerPointSet::from_corners(
        "insulation",
        [[-0.061, 0.048], [-0.022, 0.071], [-0.053, 0.032], [-0.031, 0.044]],
    );
    (carbon, insulation)
}

fn bench_modes(c: &mut Criterion) {
    let (carbon, insulation) = layers();
    let mut group = c.benchmark_group("optimize");
    for step in [0.001, 0.0005, 0.0001] {
        let params = OptimizerParams {
            sweep: RotationSweep {
                step,
                max_steps: 10_000,
            },
            ..OptimizerParams::default()
        };
        let opt = FourPointOptimizer::new(ThresholdConfig::default(), params);
        for mode in [Mode::Independent, Mode::AlignToFixed, Mode::JointAlignment] {
            group.bench_with_input(
                BenchmarkId::new(format!("{mode:?}"), step),
                &mode,
                |b, &mode| b.iter(|| opt.optimize(black_box(mode), &carbon, &insulation)),
            );
        }
    }
    group.finish();
}

fn bench_anchored(c: &mut Criterion) {
    let (_, insulation) = layers();
    let opt = FourPointOptimizer::default();
    let range = RangeConstraint::default();
    let target = [0.04, -0.05];
    c.bench_function("target_anchored", |b| {
        b.iter(|| opt.target_anchored(&insulation, &range, black_box(target)))
    });
}

criterion_group!(benches, bench_modes, bench_anchored);
criterion_main!(benches);
