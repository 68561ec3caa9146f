//! Forward simulation of station offsets over a row set.

use std::collections::BTreeMap;

use devcorr_core::{
    drift_direction, normalize, score100, transform_rows, Axis, AxisValues, DriftDirection, Margin,
    OffsetVector, RowGeometry, RowRecord, RowSet, Status, SubPosition, ThresholdConfig, Trend,
};
use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::offsets::{OffsetError, StationOffsets};

/// Parameters of [`RowSimulator`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowSimulationParams {
    pub geometry: RowGeometry,
    /// Changes of the worst magnitude below this (mm) count as unchanged.
    pub trend_deadband: f64,
    /// Residuals below this (mm) are reported as centered.
    pub direction_deadband: f64,
}

impl Default for RowSimulationParams {
    fn default() -> Self {
        Self {
            geometry: RowGeometry::default(),
            trend_deadband: 0.001,
            direction_deadband: 0.02,
        }
    }
}

/// Errors returned by [`RowSimulator::simulate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error(transparent)]
    Offsets(#[from] OffsetError),
}

/// Worst-case summary over all rows and sub-positions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowAggregate {
    /// Largest `|x|`, 0 when nothing is measured.
    pub worst_x: f64,
    pub worst_y: f64,
    /// `max(worst_x, worst_y)`.
    pub worst: f64,
    /// Row holding `worst`; `None` when nothing is measured.
    pub worst_row: Option<u32>,
    pub status: Status,
    /// `worst / ng`, clipped like the corner score.
    pub normalized: f64,
    pub score: f64,
    pub margin: Margin,
}

impl RowAggregate {
    fn of(rows: &RowSet, thresholds: &ThresholdConfig) -> Self {
        let mut worst_x = 0.0f64;
        let mut worst_y = 0.0f64;
        let mut worst = 0.0f64;
        let mut worst_row = None;
        for row in rows.iter() {
            let x = row.worst_abs(Axis::X);
            let y = row.worst_abs(Axis::Y);
            worst_x = worst_x.max(x.unwrap_or(0.0));
            worst_y = worst_y.max(y.unwrap_or(0.0));
            if let Some(w) = x.into_iter().chain(y).reduce(f64::max) {
                if worst_row.is_none() || w > worst {
                    worst = w;
                    worst_row = Some(row.row_index);
                }
            }
        }
        let normalized = normalize(worst, thresholds.ng_limit());
        Self {
            worst_x,
            worst_y,
            worst,
            worst_row,
            status: thresholds.classify(worst),
            normalized,
            score: score100(normalized),
            margin: thresholds.margin(worst),
        }
    }
}

/// Before/after view of one row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowComparison {
    pub row_index: u32,
    pub before: BTreeMap<SubPosition, AxisValues>,
    pub after: BTreeMap<SubPosition, AxisValues>,
    /// Combined offset applied to this row.
    pub offset: OffsetVector,
    pub before_worst_x: Option<f64>,
    pub before_worst_y: Option<f64>,
    pub after_worst_x: Option<f64>,
    pub after_worst_y: Option<f64>,
    pub status_before: Status,
    pub status_after: Status,
    /// Drift of the signed worst residual on each axis.
    pub after_direction_x: DriftDirection,
    pub after_direction_y: DriftDirection,
}

/// Output of [`RowSimulator::simulate`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub before: RowAggregate,
    pub after: RowAggregate,
    /// One entry per row, in row order.
    pub per_row: Vec<RowComparison>,
    /// Offsets as applied; a disabled secondary station shows zeros.
    pub applied: StationOffsets,
    pub trend: Trend,
}

/// Applies composite station offsets to rows and reports the effect.
#[derive(Clone, Debug, Default)]
pub struct RowSimulator {
    thresholds: ThresholdConfig,
    params: RowSimulationParams,
}

impl RowSimulator {
    pub fn new(thresholds: ThresholdConfig, params: RowSimulationParams) -> Self {
        Self { thresholds, params }
    }

    #[inline]
    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    #[inline]
    pub fn params(&self) -> &RowSimulationParams {
        &self.params
    }

    /// Rows after `offsets`, without building a report.
    pub fn apply(&self, rows: &RowSet, offsets: &StationOffsets) -> RowSet {
        transform_rows(rows, &self.params.geometry, |i| offsets.combined_for(i))
    }

    /// Apply `offsets` to every row and compare against the measurements.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, rows, offsets), fields(rows = rows.len()))
    )]
    pub fn simulate(
        &self,
        rows: &RowSet,
        offsets: &StationOffsets,
    ) -> Result<SimulationReport, SimulationError> {
        offsets.validate()?;
        offsets.warn_unknown_rows(rows.len());
        let applied = offsets.effective();
        let after = self.apply(rows, &applied);

        let th = &self.thresholds;
        let dead = self.params.direction_deadband;
        let per_row = rows
            .iter()
            .zip(after.iter())
            .map(|(b, a)| {
                let status = |r: &RowRecord| {
                    let w = r
                        .worst_abs(Axis::X)
                        .into_iter()
                        .chain(r.worst_abs(Axis::Y))
                        .fold(0.0, f64::max);
                    th.classify(w)
                };
                let dir = |axis: Axis| {
                    a.worst_signed(axis)
                        .map_or(DriftDirection::Centered, |v| drift_direction(axis, v, dead))
                };
                RowComparison {
                    row_index: b.row_index,
                    before: b.positions.clone(),
                    after: a.positions.clone(),
                    offset: applied.combined_for(b.row_index),
                    before_worst_x: b.worst_abs(Axis::X),
                    before_worst_y: b.worst_abs(Axis::Y),
                    after_worst_x: a.worst_abs(Axis::X),
                    after_worst_y: a.worst_abs(Axis::Y),
                    status_before: status(b),
                    status_after: status(a),
                    after_direction_x: dir(Axis::X),
                    after_direction_y: dir(Axis::Y),
                }
            })
            .collect();

        let before = RowAggregate::of(rows, th);
        let after = RowAggregate::of(&after, th);
        let trend = Trend::between(before.worst, after.worst, self.params.trend_deadband);
        debug!(
            "simulated {} rows: worst {:.4} -> {:.4} ({:?})",
            rows.len(),
            before.worst,
            after.worst,
            trend
        );

        Ok(SimulationReport {
            before,
            after,
            per_row,
            applied,
            trend,
        })
    }
}
