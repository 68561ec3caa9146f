//! Bounded rotation grid and the shared candidate selection.

use devcorr_core::{Interval, OffsetVector};
use serde::{Deserialize, Serialize};

/// Objective values closer than this (mm) are considered equal.
pub const OBJECTIVE_QUANTUM: f64 = 1e-9;

/// Discrete rotation grid parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSweep {
    /// Grid spacing of the rotation coefficient.
    pub step: f64,
    /// Upper bound on the number of evaluated rotations.
    pub max_steps: usize,
}

impl Default for RotationSweep {
    fn default() -> Self {
        Self {
            step: 0.0005,
            max_steps: 4001,
        }
    }
}

/// Invalid sweep configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SweepError {
    #[error("rotation step must be finite and > 0 (got {0})")]
    InvalidStep(f64),
    #[error("max_steps must be >= 1")]
    ZeroSteps,
    #[error("rotation grid over [{min}, {max}] needs {needed} steps, max_steps is {max_steps}")]
    TooManySteps {
        min: f64,
        max: f64,
        needed: usize,
        max_steps: usize,
    },
}

impl RotationSweep {
    pub fn validate(&self) -> Result<(), SweepError> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(SweepError::InvalidStep(self.step));
        }
        if self.max_steps == 0 {
            return Err(SweepError::ZeroSteps);
        }
        Ok(())
    }

    /// Rotations to evaluate over `range`, ascending.
    ///
    /// Multiples of `step` inside the range plus both end points. Zero is
    /// always on the grid when the range contains it.
    pub fn grid(&self, range: Interval) -> Result<Vec<f64>, SweepError> {
        self.validate()?;
        let span = (range.max - range.min) / self.step;
        if span > self.max_steps as f64 {
            return Err(SweepError::TooManySteps {
                min: range.min,
                max: range.max,
                needed: span.ceil() as usize + 1,
                max_steps: self.max_steps,
            });
        }

        let k_min = (range.min / self.step - 1e-9).ceil() as i64;
        let k_max = (range.max / self.step + 1e-9).floor() as i64;
        let mut grid: Vec<f64> = Vec::with_capacity((k_max - k_min + 3).max(1) as usize);
        grid.push(range.min);
        grid.extend((k_min..=k_max).map(|k| range.clamp(k as f64 * self.step)));
        grid.push(range.max);
        grid.sort_by(f64::total_cmp);
        grid.dedup_by(|a, b| (*a - *b).abs() <= 1e-12);
        if range.contains(0.0) && !grid.contains(&0.0) {
            // snap the grid point that stands for zero
            if let Some(z) = grid.iter_mut().find(|q| q.abs() <= 1e-12) {
                *z = 0.0;
            }
        }

        if grid.len() > self.max_steps {
            return Err(SweepError::TooManySteps {
                min: range.min,
                max: range.max,
                needed: grid.len(),
                max_steps: self.max_steps,
            });
        }
        Ok(grid)
    }
}

/// Best offset found for one rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Candidate {
    pub offset: OffsetVector,
    /// Objective in mm (box norm of the optimized quantity).
    pub objective: f64,
}

#[inline]
fn quantize(objective: f64) -> i64 {
    (objective / OBJECTIVE_QUANTUM).round() as i64
}

/// Distance of `offset` from `anchor`.
#[inline]
fn motion(offset: &OffsetVector, anchor: &OffsetVector) -> f64 {
    (*offset + anchor.inverse()).magnitude()
}

/// `true` if `a` should win over `b`.
///
/// Smaller quantized objective, then smaller motion from `anchor`, then
/// smaller `|rotation|`, then smaller rotation. Total, so the winner does not
/// depend on evaluation order.
fn better(a: &Candidate, b: &Candidate, anchor: &OffsetVector) -> bool {
    let (ka, kb) = (quantize(a.objective), quantize(b.objective));
    let (ma, mb) = (motion(&a.offset, anchor), motion(&b.offset, anchor));
    let (ra, rb) = (a.offset.rotation, b.offset.rotation);
    ka.cmp(&kb)
        .then(ma.total_cmp(&mb))
        .then(ra.abs().total_cmp(&rb.abs()))
        .then(ra.total_cmp(&rb))
        .is_lt()
}

/// Evaluate `eval` at every rotation of `grid` and keep the best candidate.
///
/// `eval` is the objective: it returns the best offset for a fixed rotation.
/// Returns `None` only for an empty grid.
pub(crate) fn sweep(
    grid: &[f64],
    anchor: &OffsetVector,
    mut eval: impl FnMut(f64) -> Candidate,
) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    for &q in grid {
        let c = eval(q);
        match &best {
            Some(b) if !better(&c, b, anchor) => {}
            _ => best = Some(c),
        }
    }
    best
}
