//! Incremental recommendation on top of the offsets already applied.
//!
//! The recommendation is recomputed from scratch on every call: the residual
//! left by the current offsets is the baseline, and three stages reduce it in
//! the order the stations act on the sheet.
//!
//! 1. Global stage: tilt fit on the tilt axis (rotation + translation) and
//!    the mean of the other axis (translation only).
//! 2. Secondary stage (when available): per-row up-down means left after 1.
//! 3. Per-row stage: per-row means of both axes left after 1 and 2.

use devcorr_core::{Axis, OffsetVector, RowGeometry, RowSet};
use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::offsets::{RowOffset, SecondaryStation, StationOffsets};
use crate::tilt::{fit, TiltFit};

/// Axis corrected by the secondary station.
pub const SECONDARY_AXIS: Axis = Axis::Y;

/// Output of [`live_recommendation`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiveRecommendation {
    /// Increments to add on top of the current offsets.
    pub additional: StationOffsets,
    /// `current ⊕ additional`, the offsets to dial in.
    pub target: StationOffsets,
    /// Global-stage tilt fit of the current residual.
    pub tilt: TiltFit,
}

/// A row that needs the largest per-row movement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriorityRow {
    pub row_index: u32,
    /// `max(|translate_x|, |translate_y|)` of the per-row increment.
    pub movement: f64,
    pub offset: OffsetVector,
}

fn residual(rows: &RowSet, offsets: &StationOffsets, geometry: &RowGeometry) -> RowSet {
    devcorr_core::transform_rows(rows, geometry, |i| offsets.combined_for(i))
}

fn axis_translation(axis: Axis, value: f64) -> OffsetVector {
    match axis {
        Axis::X => OffsetVector::translation(value, 0.0),
        Axis::Y => OffsetVector::translation(0.0, value),
    }
}

/// Mean over rows of the per-row means on `axis`; 0 when nothing is measured.
fn mean_of_rows(rows: &RowSet, axis: Axis) -> f64 {
    let (sum, n) = rows
        .iter()
        .filter_map(|r| r.mean(axis))
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Per-row translations cancelling the row means on `axes`.
fn cancel_row_means(rows: &RowSet, axes: &[Axis]) -> Vec<RowOffset> {
    rows.iter()
        .map(|r| {
            let offset = axes
                .iter()
                .map(|&axis| axis_translation(axis, -r.mean(axis).unwrap_or(0.0)))
                .sum();
            RowOffset::new(r.row_index, offset)
        })
        .collect()
}

/// Recommend increments over `current` for the measured `rows`.
///
/// `rows` are the raw measurements; `current` are the offsets already
/// applied (only their effective part is taken into account). Applying
/// `target` and calling again yields increments of ≈ 0.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(rows, current, geometry), fields(rows = rows.len()))
)]
pub fn live_recommendation(
    rows: &RowSet,
    current: &StationOffsets,
    secondary_available: bool,
    geometry: &RowGeometry,
) -> LiveRecommendation {
    let current = current.effective();
    let base = residual(rows, &current, geometry);

    let tilt = fit(&base, geometry.tilt_axis);
    let other = geometry.tilt_axis.other();
    let global = tilt.offset + axis_translation(other, -mean_of_rows(&base, other));
    let mut additional = StationOffsets::global(global);

    if secondary_available {
        let after_global = residual(rows, &current.compose(&additional), geometry);
        additional.secondary = SecondaryStation {
            enabled: true,
            per_row: cancel_row_means(&after_global, &[SECONDARY_AXIS]),
        };
    }

    let after_stations = residual(rows, &current.compose(&additional), geometry);
    additional.per_row = cancel_row_means(&after_stations, &[Axis::X, Axis::Y]);

    let target = current.compose(&additional);
    debug!(
        "live recommendation: global {:?}, max increment {:.4}",
        additional.global,
        additional.max_component()
    );

    LiveRecommendation {
        additional,
        target,
        tilt,
    }
}

/// Per-row increments only, ignoring the global and secondary stages.
///
/// Useful when only the per-row station can still be adjusted.
pub fn standalone_per_row(
    rows: &RowSet,
    current: &StationOffsets,
    geometry: &RowGeometry,
) -> StationOffsets {
    let base = residual(rows, &current.effective(), geometry);
    StationOffsets {
        per_row: cancel_row_means(&base, &[Axis::X, Axis::Y]),
        ..StationOffsets::default()
    }
}

/// Rows whose per-row increment moves more than `min_movement`, largest
/// first, at most `max_rows`. Ties go to the lower row index.
pub fn priority_rows(
    additional: &StationOffsets,
    max_rows: usize,
    min_movement: f64,
) -> Vec<PriorityRow> {
    let mut rows: Vec<PriorityRow> = additional
        .per_row
        .iter()
        .map(|r| PriorityRow {
            row_index: r.row_index,
            movement: r.offset.translate_x.abs().max(r.offset.translate_y.abs()),
            offset: r.offset,
        })
        .filter(|r| r.movement > min_movement)
        .collect();
    rows.sort_by(|a, b| {
        b.movement
            .total_cmp(&a.movement)
            .then(a.row_index.cmp(&b.row_index))
    });
    rows.truncate(max_rows);
    rows
}
