//! Linearized rigid transform model and the norms used for scoring.
//!
//! A correction adds its translation to every anchor and adds a rotational
//! cross term proportional to the anchor's signed position relative to the
//! set center. There is no trigonometry: the rotation coefficient is a
//! small-angle gain, and the constants below define its effect for both the
//! forward simulation and the inverse estimators.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Axis, Corner, DeviationPoint, LayerPointSet, OffsetVector, RowRecord, RowSet};

/// Corner displacement (mm) per unit rotation at unit lever.
pub const CORNER_ROTATION_GAIN: f64 = 1.0;

/// Tilt damping shared by the row transform and the tilt estimator.
///
/// The estimator recommends `-slope * ROW_TILT_DAMPING` and the transform
/// divides by the same constant, so a fitted rotation cancels the fitted slope.
pub const ROW_TILT_DAMPING: f64 = 0.9;

/// Gain of the rotation on the secondary (non-tilt) axis of a row, per unit
/// of lateral position.
pub const ROW_SECONDARY_DAMPING: f64 = 0.1;

/// Upper clip of [`normalized_score`].
pub const NORMALIZED_SCORE_CAP: f64 = 1.5;

/// Row layout parameters for the rotational term.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowGeometry {
    /// Axis whose deviation grows linearly with the row position under rotation.
    pub tilt_axis: Axis,
}

impl Default for RowGeometry {
    fn default() -> Self {
        Self { tilt_axis: Axis::X }
    }
}

/// Displacement of one corner under `offset`.
#[inline]
pub fn corner_displacement(corner: Corner, offset: &OffsetVector) -> Vector2<f64> {
    let lever = corner.lever();
    // clockwise-positive small rotation: (x, y) -> (x + q*v, y - q*u)
    let rot = Vector2::new(lever.y, -lever.x) * (offset.rotation * CORNER_ROTATION_GAIN);
    offset.translation_vector() + rot
}

/// Apply `offset` to every corner of a layer.
pub fn transform_points(points: &LayerPointSet, offset: &OffsetVector) -> LayerPointSet {
    let shift = |p: &DeviationPoint| corner_displacement(p.position, offset);
    points.map_points(|p| p.vector() + shift(p))
}

/// Displacement of a single value on `axis` for a row anchor.
#[inline]
pub fn row_displacement(
    axis: Axis,
    lateral: f64,
    row_factor: f64,
    offset: &OffsetVector,
    geometry: &RowGeometry,
) -> f64 {
    let translation = match axis {
        Axis::X => offset.translate_x,
        Axis::Y => offset.translate_y,
    };
    let rotation = if axis == geometry.tilt_axis {
        offset.rotation * row_factor / ROW_TILT_DAMPING
    } else {
        offset.rotation * lateral * ROW_SECONDARY_DAMPING
    };
    translation + rotation
}

/// Apply `offset` to one row located `row_factor` rows away from the center.
///
/// Unmeasured values stay unmeasured.
pub fn transform_row(
    row: &RowRecord,
    offset: &OffsetVector,
    row_factor: f64,
    geometry: &RowGeometry,
) -> RowRecord {
    let mut out = row.clone();
    for (sub, values) in out.positions.iter_mut() {
        for axis in [Axis::X, Axis::Y] {
            if let Some(v) = values.get_mut(axis) {
                *v += row_displacement(axis, sub.lateral(), row_factor, offset, geometry);
            }
        }
    }
    out
}

/// Apply a per-row offset to every row. `offset_for` receives the row index.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(rows, offset_for), fields(rows = rows.len()))
)]
pub fn transform_rows(
    rows: &RowSet,
    geometry: &RowGeometry,
    mut offset_for: impl FnMut(u32) -> OffsetVector,
) -> RowSet {
    let out = rows
        .iter()
        .map(|r| {
            let offset = offset_for(r.row_index);
            transform_row(r, &offset, rows.row_factor(r.row_index), geometry)
        })
        .collect();
    RowSet::from_validated(out)
}

/// Per-corner difference `a - b`, keyed and labeled like `a`.
///
/// Corners missing from `b` are dropped.
pub fn difference(a: &LayerPointSet, b: &LayerPointSet) -> LayerPointSet {
    let points = a
        .points
        .iter()
        .filter_map(|(&c, pa)| {
            b.get(c).map(|pb| {
                let d = pa.vector() - pb.vector();
                (c, DeviationPoint::new(c, d.x, d.y))
            })
        })
        .collect();
    LayerPointSet {
        layer_id: a.layer_id.clone(),
        points,
    }
}

/// `max sqrt(x² + y²)` over vectors; 0 for none.
pub fn radius_norm_of(vectors: impl IntoIterator<Item = Vector2<f64>>) -> f64 {
    vectors.into_iter().map(|v| v.norm()).fold(0.0, f64::max)
}

/// `max max(|x|, |y|)` over vectors; 0 for none.
pub fn box_norm_of(vectors: impl IntoIterator<Item = Vector2<f64>>) -> f64 {
    vectors
        .into_iter()
        .map(|v| v.x.abs().max(v.y.abs()))
        .fold(0.0, f64::max)
}

pub fn radius_norm(points: &LayerPointSet) -> f64 {
    radius_norm_of(points.iter().map(|p| p.vector()))
}

pub fn box_norm(points: &LayerPointSet) -> f64 {
    box_norm_of(points.iter().map(|p| p.vector()))
}

/// `box_norm / ng_limit`, clipped to [`NORMALIZED_SCORE_CAP`].
#[inline]
pub fn normalize(box_norm: f64, ng_limit: f64) -> f64 {
    (box_norm / ng_limit).min(NORMALIZED_SCORE_CAP)
}

pub fn normalized_score(points: &LayerPointSet, ng_limit: f64) -> f64 {
    normalize(box_norm(points), ng_limit)
}

/// 0–100 quality score: `max(0, (1 - normalized) * 100)`.
#[inline]
pub fn score100(normalized: f64) -> f64 {
    ((1.0 - normalized) * 100.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AxisValues, SubPosition};
    use approx::assert_relative_eq;

    fn layer() -> LayerPointSet {
        LayerPointSet::from_corners(
            "carbon",
            [[-0.02, -0.03], [0.02, -0.03], [-0.02, 0.03], [0.02, 0.03]],
        )
    }

    #[test]
    fn translation_is_uniform() {
        let out = transform_points(&layer(), &OffsetVector::translation(0.01, -0.02));
        for (before, after) in layer().iter().zip(out.iter()) {
            assert_relative_eq!(after.x - before.x, 0.01, epsilon = 1e-12);
            assert_relative_eq!(after.y - before.y, -0.02, epsilon = 1e-12);
        }
    }

    #[test]
    fn rotation_is_antisymmetric_about_center() {
        let off = OffsetVector::new(0.01, 0.0, 0.0);
        let tl = corner_displacement(Corner::TopLeft, &off);
        let br = corner_displacement(Corner::BottomRight, &off);
        let tr = corner_displacement(Corner::TopRight, &off);
        let bl = corner_displacement(Corner::BottomLeft, &off);
        assert_relative_eq!(tl, -br, epsilon = 1e-15);
        assert_relative_eq!(tr, -bl, epsilon = 1e-15);
        // clockwise: top edge moves right, right edge moves down
        assert!(tl.x > 0.0 && tr.x > 0.0);
        assert!(tr.y < 0.0 && br.y < 0.0);
    }

    #[test]
    fn composition_is_additive() {
        let a = OffsetVector::new(0.013, -0.02, 0.004);
        let b = OffsetVector::new(-0.04, 0.031, 0.07);
        let twice = transform_points(&transform_points(&layer(), &a), &b);
        let once = transform_points(&layer(), &(a + b));
        for (p, q) in twice.iter().zip(once.iter()) {
            assert_relative_eq!(p.x, q.x, epsilon = 1e-12);
            assert_relative_eq!(p.y, q.y, epsilon = 1e-12);
        }
    }

    #[test]
    fn norms_on_reference_layer() {
        let l = layer();
        assert_relative_eq!(box_norm(&l), 0.03, epsilon = 1e-12);
        assert_relative_eq!(radius_norm(&l), (0.02f64.powi(2) + 0.03f64.powi(2)).sqrt());
        assert_relative_eq!(normalized_score(&l, 0.15), 0.2, epsilon = 1e-12);
        assert_relative_eq!(score100(0.2), 80.0, epsilon = 1e-9);
        assert_relative_eq!(score100(normalize(0.12, 0.15)), 20.0, epsilon = 1e-9);
        assert_eq!(score100(normalize(10.0, 0.15)), 0.0);
        assert_eq!(normalize(10.0, 0.15), NORMALIZED_SCORE_CAP);
    }

    #[test]
    fn row_rotation_scales_with_position() {
        let geometry = RowGeometry::default();
        let row = RowRecord::new(1)
            .with(SubPosition::Left, AxisValues::xy(0.0, 0.0))
            .with(SubPosition::Right, AxisValues::xy(0.0, 0.0));
        let off = OffsetVector::new(0.009, 0.0, 0.0);
        let out = transform_row(&row, &off, -2.0, &geometry);
        let left = out.positions[&SubPosition::Left];
        let right = out.positions[&SubPosition::Right];
        assert_relative_eq!(left.x.unwrap(), -0.02, epsilon = 1e-12);
        assert_relative_eq!(right.x.unwrap(), -0.02, epsilon = 1e-12);
        assert_relative_eq!(left.y.unwrap(), -0.0009, epsilon = 1e-12);
        assert_relative_eq!(right.y.unwrap(), 0.0009, epsilon = 1e-12);
    }

    #[test]
    fn difference_subtracts_per_corner() {
        let a = layer();
        let b = transform_points(&a, &OffsetVector::translation(0.01, 0.02));
        let d = difference(&b, &a);
        assert_relative_eq!(box_norm(&d), 0.02, epsilon = 1e-12);
        assert_eq!(d.layer_id, b.layer_id);
    }
}
