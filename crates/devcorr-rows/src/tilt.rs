//! Closed-form mean + tilt fit over row-indexed deviations.

use devcorr_core::{Axis, OffsetVector, RowSet, ROW_TILT_DAMPING};
use log::debug;
use serde::{Deserialize, Serialize};

/// Result of [`fit`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TiltFit {
    pub axis: Axis,
    /// Recommended correction: minus the fitted value at the center row on
    /// `axis`, `-slope * ROW_TILT_DAMPING` rotation.
    pub offset: OffsetVector,
    /// Mean of the per-row means.
    pub mean: f64,
    /// Least-squares slope of the per-row mean against `row_index - center`.
    pub slope: f64,
    /// Rows that carried at least one value on `axis`.
    pub rows_used: usize,
    /// Zero-variance input; the rotation fell back to zero.
    pub degenerate: bool,
}

/// Fit the translation and tilt correction for `axis`.
///
/// Each row contributes the mean of its measured values on `axis`; rows with
/// nothing measured are skipped. Row positions are taken relative to
/// `center = (N + 1) / 2` over the full set, and the line is fitted through
/// the measured rows only, so gaps do not bias the slope.
/// The returned rotation cancels the slope when applied with a
/// [`RowGeometry`](devcorr_core::RowGeometry) whose tilt axis is `axis`.
pub fn fit(rows: &RowSet, axis: Axis) -> TiltFit {
    let samples: Vec<(f64, f64)> = rows
        .iter()
        .filter_map(|r| r.mean(axis).map(|v| (rows.row_factor(r.row_index), v)))
        .collect();

    if samples.is_empty() {
        debug!("tilt fit on {axis}: no measured rows");
        return TiltFit {
            axis,
            offset: OffsetVector::ZERO,
            mean: 0.0,
            slope: 0.0,
            rows_used: 0,
            degenerate: true,
        };
    }

    let n = samples.len() as f64;
    let mean = samples.iter().map(|(_, v)| v).sum::<f64>() / n;
    // unmeasured rows shift the sample center away from zero
    let d_mean = samples.iter().map(|(d, _)| d).sum::<f64>() / n;
    let num: f64 = samples.iter().map(|(d, v)| (d - d_mean) * (v - mean)).sum();
    let den: f64 = samples.iter().map(|(d, _)| (d - d_mean).powi(2)).sum();

    let degenerate = den <= f64::EPSILON;
    let slope = if degenerate { 0.0 } else { num / den };

    let rotation = if degenerate {
        0.0
    } else {
        -slope * ROW_TILT_DAMPING
    };
    let intercept = mean - slope * d_mean;
    let offset = match axis {
        Axis::X => OffsetVector::new(rotation, -intercept, 0.0),
        Axis::Y => OffsetVector::new(rotation, 0.0, -intercept),
    };

    TiltFit {
        axis,
        offset,
        mean,
        slope,
        rows_used: samples.len(),
        degenerate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use devcorr_core::{transform_rows, AxisValues, RowGeometry, RowRecord, SubPosition};

    fn rows_from(values: &[f64], axis: Axis) -> RowSet {
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let vals = match axis {
                    Axis::X => AxisValues::new(Some(v), None),
                    Axis::Y => AxisValues::new(None, Some(v)),
                };
                RowRecord::new(i as u32 + 1)
                    .with(SubPosition::Left, vals)
                    .with(SubPosition::Right, vals)
            })
            .collect();
        RowSet::new(rows).expect("rows")
    }

    fn max_abs(rows: &RowSet, axis: Axis) -> f64 {
        rows.iter()
            .filter_map(|r| r.worst_abs(axis))
            .fold(0.0, f64::max)
    }

    #[test]
    fn perfect_linear_tilt() {
        let values: Vec<f64> = (1..=12).map(|i| 0.01 * (i as f64 - 6.5)).collect();
        let rows = rows_from(&values, Axis::X);
        let f = fit(&rows, Axis::X);

        assert_abs_diff_eq!(f.offset.translate_x, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f.slope, 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(f.offset.rotation, -0.009, epsilon = 1e-12);
        assert!(!f.degenerate);

        let geometry = RowGeometry { tilt_axis: Axis::X };
        let corrected = transform_rows(&rows, &geometry, |_| f.offset);
        assert!(max_abs(&rows, Axis::X) > 0.05);
        assert_abs_diff_eq!(max_abs(&corrected, Axis::X), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn refit_of_residual_is_zero() {
        let values = [
            0.031, -0.012, 0.044, 0.005, -0.021, 0.017, 0.09, -0.03, 0.002, 0.011, 0.06, -0.008,
        ];
        for axis in [Axis::X, Axis::Y] {
            let rows = rows_from(&values, axis);
            let first = fit(&rows, axis);
            let geometry = RowGeometry { tilt_axis: axis };
            let residual = transform_rows(&rows, &geometry, |_| first.offset);
            let second = fit(&residual, axis);
            assert_abs_diff_eq!(second.offset.rotation, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(second.offset.translate_x, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(second.offset.translate_y, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_offset_is_pure_translation() {
        let rows = rows_from(&[0.04; 12], Axis::Y);
        let f = fit(&rows, Axis::Y);
        assert_abs_diff_eq!(f.offset.translate_y, -0.04, epsilon = 1e-12);
        assert_abs_diff_eq!(f.offset.rotation, 0.0, epsilon = 1e-12);
        assert_eq!(f.offset.translate_x, 0.0);
    }

    #[test]
    fn single_row_is_degenerate() {
        let rows = rows_from(&[0.07], Axis::X);
        let f = fit(&rows, Axis::X);
        assert!(f.degenerate);
        assert_eq!(f.offset.rotation, 0.0);
        assert_abs_diff_eq!(f.offset.translate_x, -0.07, epsilon = 1e-12);
    }

    #[test]
    fn unmeasured_axis_yields_zero() {
        let rows = rows_from(&[0.01, 0.02, 0.03], Axis::X);
        let f = fit(&rows, Axis::Y);
        assert!(f.degenerate);
        assert_eq!(f.rows_used, 0);
        assert_eq!(f.offset, OffsetVector::ZERO);
    }

    #[test]
    fn unmeasured_row_does_not_bias_the_fit() {
        let values: Vec<f64> = (1..=12).map(|i| 0.02 + 0.01 * (i as f64 - 6.5)).collect();
        let mut records: Vec<RowRecord> = rows_from(&values, Axis::X).rows().to_vec();
        records[0] = RowRecord::new(1)
            .with(SubPosition::Left, AxisValues::new(None, Some(0.01)))
            .with(SubPosition::Right, AxisValues::new(Some(f64::NAN), None));
        let rows = RowSet::new(records).expect("rows");

        let f = fit(&rows, Axis::X);
        assert_eq!(f.rows_used, 11);
        assert_abs_diff_eq!(f.slope, 0.01, epsilon = 1e-12);
        assert_abs_diff_eq!(f.offset.rotation, -0.009, epsilon = 1e-12);
        assert_abs_diff_eq!(f.offset.translate_x, -0.02, epsilon = 1e-12);

        let geometry = RowGeometry { tilt_axis: Axis::X };
        let corrected = transform_rows(&rows, &geometry, |_| f.offset);
        assert_abs_diff_eq!(max_abs(&corrected, Axis::X), 0.0, epsilon = 1e-12);

        let refit = fit(&corrected, Axis::X);
        assert_abs_diff_eq!(refit.offset.rotation, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(refit.offset.translate_x, 0.0, epsilon = 1e-12);
    }
}
