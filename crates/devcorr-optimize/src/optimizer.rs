use std::collections::BTreeMap;

use devcorr_core::{
    box_norm, difference, normalize, score100, transform_points, ConstraintError, InvalidPointSet,
    LayerId, LayerPointSet, OffsetVector, RangeConstraint, ThresholdConfig,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::search::{best_translation, Anchors};
use crate::sweep::{sweep, Candidate, RotationSweep, SweepError};

/// Objective of a four-point optimization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Each layer minimizes its own deviation.
    #[default]
    Independent,
    /// Base layer stays put; the overlay minimizes its interference with it.
    AlignToFixed,
    /// Both layers move to minimize their interference.
    JointAlignment,
}

/// Correction boxes of the two layers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerRanges {
    pub base: RangeConstraint,
    pub overlay: RangeConstraint,
}

/// Parameters of [`FourPointOptimizer`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerParams {
    pub ranges: LayerRanges,
    pub sweep: RotationSweep,
}

/// Errors that abort an optimization before any search.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
    #[error(transparent)]
    Sweep(#[from] SweepError),
    #[error(transparent)]
    InvalidLayer(#[from] InvalidPointSet),
    #[error("base and overlay share the layer id {0}")]
    DuplicateLayer(LayerId),
    #[error("target translation must be finite (got [{0}, {1}])")]
    NonFiniteTarget(f64, f64),
}

/// Outcome of [`FourPointOptimizer::optimize`].
///
/// Maps hold one entry per valid layer; invalid layers only appear in
/// `rejected`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub mode: Mode,
    pub offsets: BTreeMap<LayerId, OffsetVector>,
    pub transformed: BTreeMap<LayerId, LayerPointSet>,
    /// `score100` of each layer before correction.
    pub score_before: BTreeMap<LayerId, f64>,
    pub score_after: BTreeMap<LayerId, f64>,
    /// Minimized quantity in mm: the worst layer box norm for `Independent`,
    /// the interference box norm for the alignment modes.
    pub objective_before: f64,
    pub objective_after: f64,
    /// `box_norm(overlay - base)` when both layers are valid.
    pub interference_before: Option<f64>,
    pub interference_after: Option<f64>,
    pub rejected: BTreeMap<LayerId, String>,
}

/// Bounded rotation sweep with closed-form translation over four corners.
#[derive(Clone, Debug, Default)]
pub struct FourPointOptimizer {
    thresholds: ThresholdConfig,
    params: OptimizerParams,
}

/// Split of a joint difference offset between the overlay and the base.
///
/// Picks `overlay - base = delta` with both inside their boxes and the
/// smallest total motion, i.e. `overlay` nearest `delta / 2`.
fn split_difference(delta: f64, overlay: (f64, f64), base: (f64, f64)) -> (f64, f64) {
    let lo = overlay.0.max(base.0 + delta);
    let hi = overlay.1.min(base.1 + delta);
    let o = (delta / 2.0).max(lo).min(hi);
    (o, (o - delta).max(base.0).min(base.1))
}

impl FourPointOptimizer {
    pub fn new(thresholds: ThresholdConfig, params: OptimizerParams) -> Self {
        Self { thresholds, params }
    }

    #[inline]
    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    #[inline]
    pub fn params(&self) -> &OptimizerParams {
        &self.params
    }

    /// Reject bad boxes and any rotation grid a mode would exceed.
    ///
    /// The joint grid spans the difference box, so a sweep that fits both
    /// layer boxes can still be too fine for `JointAlignment`; the check is
    /// the same for every mode.
    pub(crate) fn validate_config(&self) -> Result<(), OptimizeError> {
        let ranges = &self.params.ranges;
        ranges.base.validate()?;
        ranges.overlay.validate()?;
        self.params.sweep.validate()?;
        for range in [ranges.base, ranges.overlay, self.delta_range()] {
            self.params.sweep.grid(range.rotation())?;
        }
        Ok(())
    }

    /// Box of `overlay - base` offsets reachable with both layers in range.
    fn delta_range(&self) -> RangeConstraint {
        let b = &self.params.ranges.base;
        let o = &self.params.ranges.overlay;
        RangeConstraint {
            rotation_min: o.rotation_min - b.rotation_max,
            rotation_max: o.rotation_max - b.rotation_min,
            x_min: o.x_min - b.x_max,
            x_max: o.x_max - b.x_min,
            y_min: o.y_min - b.y_max,
            y_max: o.y_max - b.y_min,
        }
    }

    pub(crate) fn score(&self, layer: &LayerPointSet) -> f64 {
        score100(normalize(box_norm(layer), self.thresholds.ng_limit()))
    }

    /// Best offset of a single layer against its own deviation.
    pub(crate) fn independent(
        &self,
        layer: &LayerPointSet,
        range: &RangeConstraint,
        anchor: &OffsetVector,
    ) -> Result<Candidate, OptimizeError> {
        let anchors = Anchors::of(layer);
        let grid = self.params.sweep.grid(range.rotation())?;
        let best = sweep(&grid, anchor, |q| {
            best_translation(&anchors, q, range, anchor)
        });
        Ok(best.unwrap_or(Candidate {
            offset: OffsetVector::ZERO,
            objective: box_norm(layer),
        }))
    }

    /// Best overlay offset against a fixed base.
    fn align_to_fixed(
        &self,
        base: &LayerPointSet,
        overlay: &LayerPointSet,
    ) -> Result<Candidate, OptimizeError> {
        let diff = difference(overlay, base);
        let range = &self.params.ranges.overlay;
        self.independent(&diff, range, &OffsetVector::ZERO)
    }

    /// Best `(base, overlay)` offsets minimizing their interference.
    fn joint(
        &self,
        base: &LayerPointSet,
        overlay: &LayerPointSet,
    ) -> Result<(OffsetVector, OffsetVector, f64), OptimizeError> {
        let b = &self.params.ranges.base;
        let o = &self.params.ranges.overlay;
        // interference depends on overlay - base only
        let delta_range = self.delta_range();
        let diff = difference(overlay, base);
        let best = self.independent(&diff, &delta_range, &OffsetVector::ZERO)?;
        let d = best.offset;

        let (oq, bq) = split_difference(
            d.rotation,
            (o.rotation_min, o.rotation_max),
            (b.rotation_min, b.rotation_max),
        );
        let (ox, bx) = split_difference(d.translate_x, (o.x_min, o.x_max), (b.x_min, b.x_max));
        let (oy, by) = split_difference(d.translate_y, (o.y_min, o.y_max), (b.y_min, b.y_max));
        Ok((
            OffsetVector::new(bq, bx, by),
            OffsetVector::new(oq, ox, oy),
            best.objective,
        ))
    }

    /// Optimize the base and overlay layers under `mode`.
    ///
    /// An invalid layer is listed in `rejected` and never fails the other
    /// one; in the alignment modes a valid layer without a valid partner
    /// falls back to its independent optimum, except the `AlignToFixed` base,
    /// which stays at zero.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, base, overlay),
            fields(base = %base.layer_id, overlay = %overlay.layer_id)
        )
    )]
    pub fn optimize(
        &self,
        mode: Mode,
        base: &LayerPointSet,
        overlay: &LayerPointSet,
    ) -> Result<OptimizationResult, OptimizeError> {
        self.validate_config()?;
        if base.layer_id == overlay.layer_id {
            return Err(OptimizeError::DuplicateLayer(base.layer_id.clone()));
        }

        let mut rejected = BTreeMap::new();
        for layer in [base, overlay] {
            if let Err(e) = layer.validate() {
                warn!("layer {} rejected: {e}", layer.layer_id);
                rejected.insert(layer.layer_id.clone(), e.to_string());
            }
        }
        let base_ok = !rejected.contains_key(&base.layer_id);
        let overlay_ok = !rejected.contains_key(&overlay.layer_id);

        let ranges = self.params.ranges;
        let zero = OffsetVector::ZERO;
        let mut offsets = BTreeMap::new();
        let effective_mode = if base_ok && overlay_ok {
            mode
        } else {
            if mode != Mode::Independent && (base_ok || overlay_ok) {
                warn!("{mode:?} needs both layers; falling back to independent optimization");
            }
            Mode::Independent
        };

        match effective_mode {
            Mode::Independent => {
                if base_ok && mode == Mode::AlignToFixed {
                    // the fixed base never moves, even without an overlay
                    offsets.insert(base.layer_id.clone(), OffsetVector::ZERO);
                } else if base_ok {
                    let c = self.independent(base, &ranges.base, &zero)?;
                    offsets.insert(base.layer_id.clone(), c.offset);
                }
                if overlay_ok {
                    let c = self.independent(overlay, &ranges.overlay, &zero)?;
                    offsets.insert(overlay.layer_id.clone(), c.offset);
                }
            }
            Mode::AlignToFixed => {
                let c = self.align_to_fixed(base, overlay)?;
                offsets.insert(base.layer_id.clone(), OffsetVector::ZERO);
                offsets.insert(overlay.layer_id.clone(), c.offset);
            }
            Mode::JointAlignment => {
                let (b, o, _) = self.joint(base, overlay)?;
                offsets.insert(base.layer_id.clone(), b);
                offsets.insert(overlay.layer_id.clone(), o);
            }
        }

        let mut transformed = BTreeMap::new();
        let mut score_before = BTreeMap::new();
        let mut score_after = BTreeMap::new();
        for layer in [base, overlay] {
            if let Some(offset) = offsets.get(&layer.layer_id) {
                let id = &layer.layer_id;
                let moved = transform_points(layer, offset);
                score_before.insert(id.clone(), self.score(layer));
                score_after.insert(id.clone(), self.score(&moved));
                transformed.insert(id.clone(), moved);
            }
        }

        let interference = |b: &LayerPointSet, o: &LayerPointSet| box_norm(&difference(o, b));
        let (interference_before, interference_after) = if base_ok && overlay_ok {
            (
                Some(interference(base, overlay)),
                transformed
                    .get(&base.layer_id)
                    .zip(transformed.get(&overlay.layer_id))
                    .map(|(b, o)| interference(b, o)),
            )
        } else {
            (None, None)
        };

        let worst_layer = |layers: &[&LayerPointSet]| {
            layers.iter().map(|l| box_norm(l)).fold(0.0, f64::max)
        };
        let valid: Vec<&LayerPointSet> = [base, overlay]
            .into_iter()
            .filter(|l| offsets.contains_key(&l.layer_id))
            .collect();
        let (objective_before, objective_after) = match effective_mode {
            Mode::Independent => (
                worst_layer(&valid),
                worst_layer(&transformed.values().collect::<Vec<_>>()),
            ),
            Mode::AlignToFixed | Mode::JointAlignment => (
                interference_before.unwrap_or(0.0),
                interference_after.unwrap_or(0.0),
            ),
        };

        debug!(
            "{mode:?}: objective {objective_before:.5} -> {objective_after:.5}, {} rejected",
            rejected.len()
        );

        Ok(OptimizationResult {
            mode,
            offsets,
            transformed,
            score_before,
            score_after,
            objective_before,
            objective_after,
            interference_before,
            interference_after,
            rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn base() -> LayerPointSet {
        LayerPointSet::from_corners(
            "carbon",
            [[0.03, 0.01], [0.05, 0.02], [0.02, -0.01], [0.04, 0.0]],
        )
    }

    fn overlay() -> LayerPointSet {
        LayerPointSet::from_corners(
            "insulation",
            [[-0.06, 0.05], [-0.02, 0.07], [-0.05, 0.03], [-0.03, 0.04]],
        )
    }

    #[test]
    fn split_keeps_difference_and_minimizes_motion() {
        let (o, b) = split_difference(0.1, (-0.2, 0.2), (-0.2, 0.2));
        assert_abs_diff_eq!(o, 0.05, epsilon = 1e-15);
        assert_abs_diff_eq!(b, -0.05, epsilon = 1e-15);
        // the overlay cannot move, so the base takes it all
        let (o, b) = split_difference(0.1, (0.0, 0.0), (-0.2, 0.2));
        assert_eq!(o, 0.0);
        assert_abs_diff_eq!(b, -0.1, epsilon = 1e-15);
    }

    #[test]
    fn independent_improves_both_layers() {
        let opt = FourPointOptimizer::default();
        let r = opt
            .optimize(Mode::Independent, &base(), &overlay())
            .expect("optimize");
        assert!(r.rejected.is_empty());
        for id in ["carbon", "insulation"] {
            let id = LayerId::from(id);
            assert!(r.score_after[&id] >= r.score_before[&id]);
        }
        assert!(r.objective_after <= r.objective_before);
    }

    #[test]
    fn align_to_fixed_never_moves_base() {
        let opt = FourPointOptimizer::default();
        let r = opt
            .optimize(Mode::AlignToFixed, &base(), &overlay())
            .expect("optimize");
        assert_eq!(r.offsets[&LayerId::from("carbon")], OffsetVector::ZERO);
        assert_eq!(r.transformed[&LayerId::from("carbon")], base());
        let after = r.interference_after.expect("both valid");
        assert!(after <= r.interference_before.expect("both valid"));
        assert_abs_diff_eq!(r.objective_after, after, epsilon = 1e-15);
    }

    #[test]
    fn joint_at_least_as_good_as_fixed() {
        let opt = FourPointOptimizer::default();
        let fixed = opt
            .optimize(Mode::AlignToFixed, &base(), &overlay())
            .expect("optimize");
        let joint = opt
            .optimize(Mode::JointAlignment, &base(), &overlay())
            .expect("optimize");
        assert!(joint.objective_after <= fixed.objective_after + 1e-9);
        let b = joint.offsets[&LayerId::from("carbon")];
        let o = joint.offsets[&LayerId::from("insulation")];
        assert!(opt.params().ranges.base.contains(&b));
        assert!(opt.params().ranges.overlay.contains(&o));
    }

    #[test]
    fn invalid_overlay_falls_back_for_base() {
        let mut ins = overlay();
        ins.points.remove(&devcorr_core::Corner::TopLeft);
        let opt = FourPointOptimizer::default();
        let r = opt
            .optimize(Mode::JointAlignment, &base(), &ins)
            .expect("optimize");
        assert!(r.rejected.contains_key(&LayerId::from("insulation")));
        assert!(!r.offsets.contains_key(&LayerId::from("insulation")));
        let solo = opt
            .optimize(Mode::Independent, &base(), &overlay())
            .expect("optimize");
        assert_eq!(
            r.offsets[&LayerId::from("carbon")],
            solo.offsets[&LayerId::from("carbon")]
        );
        assert_eq!(r.interference_after, None);
        assert_eq!(r.mode, Mode::JointAlignment);
    }

    #[test]
    fn inverted_box_is_rejected_before_search() {
        let mut params = OptimizerParams::default();
        params.ranges.overlay.x_min = 0.5;
        let opt = FourPointOptimizer::new(ThresholdConfig::default(), params);
        assert!(matches!(
            opt.optimize(Mode::Independent, &base(), &overlay()),
            Err(OptimizeError::Constraint(ConstraintError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn duplicate_layer_ids_are_rejected() {
        let opt = FourPointOptimizer::default();
        assert!(matches!(
            opt.optimize(Mode::Independent, &base(), &base()),
            Err(OptimizeError::DuplicateLayer(_))
        ));
    }

    #[test]
    fn align_to_fixed_keeps_base_without_overlay() {
        let mut ins = overlay();
        ins.points.remove(&devcorr_core::Corner::BottomRight);
        let r = FourPointOptimizer::default()
            .optimize(Mode::AlignToFixed, &base(), &ins)
            .expect("optimize");
        assert!(r.rejected.contains_key(&LayerId::from("insulation")));
        assert_eq!(r.offsets[&LayerId::from("carbon")], OffsetVector::ZERO);
        assert_eq!(r.transformed[&LayerId::from("carbon")], base());
        assert_eq!(r.mode, Mode::AlignToFixed);
    }

    #[test]
    fn joint_grid_is_checked_for_every_mode() {
        // each box fits the sweep, the doubled difference box does not
        let box_ = RangeConstraint::symmetric(0.6, 0.2, 0.2);
        let params = OptimizerParams {
            ranges: LayerRanges {
                base: box_,
                overlay: box_,
            },
            sweep: RotationSweep::default(),
        };
        assert!(params.sweep.grid(box_.rotation()).is_ok());
        let opt = FourPointOptimizer::new(ThresholdConfig::default(), params);
        for mode in [Mode::Independent, Mode::AlignToFixed, Mode::JointAlignment] {
            assert!(matches!(
                opt.optimize(mode, &base(), &overlay()),
                Err(OptimizeError::Sweep(SweepError::TooManySteps { .. }))
            ));
        }

        let coarse = OptimizerParams {
            sweep: RotationSweep {
                step: 0.001,
                ..RotationSweep::default()
            },
            ..params
        };
        let opt = FourPointOptimizer::new(ThresholdConfig::default(), coarse);
        for mode in [Mode::Independent, Mode::AlignToFixed, Mode::JointAlignment] {
            assert!(opt.optimize(mode, &base(), &overlay()).is_ok());
        }
    }
}
