//! Closed-form translation for a fixed rotation.
//!
//! For a fixed rotation `q`, every corner moves by `t + q * r_i`. Shifting the
//! points by the rotational term first leaves a separable problem per axis:
//! `min_t max_i |a_i + t|` is solved by the negative midrange of `a`, and the
//! clamped midrange is optimal inside a box because the cost is convex in `t`.

use devcorr_core::{
    box_norm_of, corner_displacement, Corner, Interval, LayerPointSet, OffsetVector,
    RangeConstraint,
};
use nalgebra::Vector2;

use crate::sweep::Candidate;

/// Corner deviations flattened for repeated evaluation.
#[derive(Clone, Debug)]
pub(crate) struct Anchors {
    points: Vec<(Corner, Vector2<f64>)>,
}

impl Anchors {
    pub fn of(layer: &LayerPointSet) -> Self {
        Self {
            points: layer.iter().map(|p| (p.position, p.vector())).collect(),
        }
    }

    /// Points after the rotational part of `q`.
    fn rotated(&self, q: f64) -> impl Iterator<Item = Vector2<f64>> + '_ {
        let rot = OffsetVector::new(q, 0.0, 0.0);
        self.points
            .iter()
            .map(move |(c, v)| v + corner_displacement(*c, &rot))
    }

    /// Box norm after applying `offset`.
    pub fn box_norm_after(&self, offset: &OffsetVector) -> f64 {
        box_norm_of(
            self.points
                .iter()
                .map(|(c, v)| v + corner_displacement(*c, offset)),
        )
    }
}

/// Per-axis extent of the rotated points.
#[derive(Clone, Copy, Debug)]
struct Extent {
    min: f64,
    max: f64,
}

impl Extent {
    /// Cost `max_i |a_i + t|`.
    #[inline]
    fn cost(&self, t: f64) -> f64 {
        (self.max + t).abs().max((self.min + t).abs())
    }

    /// Translations keeping the cost at or below `level`.
    #[inline]
    fn within(&self, level: f64) -> Interval {
        Interval::new(-level - self.min, level - self.max)
    }
}

fn extents(points: impl Iterator<Item = Vector2<f64>>) -> Option<(Extent, Extent)> {
    points.fold(None, |acc, p| {
        Some(match acc {
            None => (Extent { min: p.x, max: p.x }, Extent { min: p.y, max: p.y }),
            Some((ex, ey)) => (
                Extent {
                    min: ex.min.min(p.x),
                    max: ex.max.max(p.x),
                },
                Extent {
                    min: ey.min.min(p.y),
                    max: ey.max.max(p.y),
                },
            ),
        })
    })
}

/// Best translation for rotation `q` inside `range`.
///
/// Among the translations reaching the optimal objective, the one nearest
/// the anchor translation is returned.
pub(crate) fn best_translation(
    anchors: &Anchors,
    q: f64,
    range: &RangeConstraint,
    anchor: &OffsetVector,
) -> Candidate {
    let Some((ex, ey)) = extents(anchors.rotated(q)) else {
        let t = range.clamp(anchor);
        return Candidate {
            offset: OffsetVector::new(q, t.translate_x, t.translate_y),
            objective: 0.0,
        };
    };

    let midrange = |e: &Extent, box_: Interval| box_.clamp(-(e.max + e.min) / 2.0);
    let tx0 = midrange(&ex, range.x());
    let ty0 = midrange(&ey, range.y());
    let objective = ex.cost(tx0).max(ey.cost(ty0));

    let pick = |e: &Extent, box_: Interval, fallback: f64, target: f64| {
        e.within(objective)
            .intersect(&box_)
            .map_or(fallback, |i| i.nearest(target))
    };
    let tx = pick(&ex, range.x(), tx0, anchor.translate_x);
    let ty = pick(&ey, range.y(), ty0, anchor.translate_y);

    Candidate {
        offset: OffsetVector::new(q, tx, ty),
        objective: ex.cost(tx).max(ey.cost(ty)),
    }
}

/// Objective for rotation `q` with the translation held at `translation`.
pub(crate) fn fixed_translation(anchors: &Anchors, q: f64, translation: [f64; 2]) -> Candidate {
    let offset = OffsetVector::new(q, translation[0], translation[1]);
    Candidate {
        objective: anchors.box_norm_after(&offset),
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn layer(xy: [[f64; 2]; 4]) -> Anchors {
        Anchors::of(&LayerPointSet::from_corners("l", xy))
    }

    #[test]
    fn midrange_centers_the_points() {
        let a = layer([[0.10, 0.02], [0.14, 0.02], [0.10, -0.02], [0.14, -0.02]]);
        let c = best_translation(&a, 0.0, &RangeConstraint::default(), &OffsetVector::ZERO);
        assert_abs_diff_eq!(c.offset.translate_x, -0.12, epsilon = 1e-12);
        assert_abs_diff_eq!(c.objective, 0.02, epsilon = 1e-12);
        // y is not binding: staying at the anchor costs nothing
        assert_eq!(c.offset.translate_y, 0.0);
    }

    #[test]
    fn box_limits_the_translation() {
        let a = layer([[0.30, 0.0], [0.30, 0.0], [0.30, 0.0], [0.30, 0.0]]);
        let range = RangeConstraint::symmetric(0.1, 0.2, 0.2);
        let c = best_translation(&a, 0.0, &range, &OffsetVector::ZERO);
        assert_abs_diff_eq!(c.offset.translate_x, -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(c.objective, 0.1, epsilon = 1e-12);
        assert!(range.contains(&c.offset));
    }

    #[test]
    fn objective_matches_forward_transform() {
        let a = layer([[-0.05, 0.08], [0.03, 0.07], [-0.06, -0.01], [0.04, -0.02]]);
        for q in [-0.05, 0.0, 0.02] {
            let c = best_translation(&a, q, &RangeConstraint::default(), &OffsetVector::ZERO);
            assert_abs_diff_eq!(c.objective, a.box_norm_after(&c.offset), epsilon = 1e-12);
            let f = fixed_translation(&a, q, [0.0, 0.0]);
            assert!(c.objective <= f.objective + 1e-12);
        }
    }

    #[test]
    fn empty_layer_costs_nothing() {
        let a = Anchors { points: vec![] };
        let c = best_translation(&a, 0.01, &RangeConstraint::default(), &OffsetVector::ZERO);
        assert_eq!(c.objective, 0.0);
        assert_eq!(c.offset, OffsetVector::new(0.01, 0.0, 0.0));
    }
}
