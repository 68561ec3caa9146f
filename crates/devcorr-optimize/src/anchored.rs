//! Optimization anchored on an externally recommended translation.

use devcorr_core::{box_norm, transform_points, LayerPointSet, OffsetVector, RangeConstraint};
use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::optimizer::{FourPointOptimizer, OptimizeError};
use crate::search::{fixed_translation, Anchors};
use crate::sweep::sweep;

/// One corrected layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerOptimum {
    pub offset: OffsetVector,
    pub transformed: LayerPointSet,
    pub box_before: f64,
    pub box_after: f64,
    pub score_before: f64,
    pub score_after: f64,
}

/// Output of [`FourPointOptimizer::target_anchored`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchoredResult {
    /// The target translation `[x, y]` the search was anchored on.
    pub target: [f64; 2],
    /// Translation held at the target, rotation searched.
    pub constrained: LayerOptimum,
    /// Rotation and translation searched, ties broken toward the target.
    pub free: LayerOptimum,
}

impl FourPointOptimizer {
    fn layer_optimum(&self, layer: &LayerPointSet, offset: OffsetVector) -> LayerOptimum {
        let transformed = transform_points(layer, &offset);
        LayerOptimum {
            offset,
            box_before: box_norm(layer),
            box_after: box_norm(&transformed),
            score_before: self.score(layer),
            score_after: self.score(&transformed),
            transformed,
        }
    }

    /// Optimize `layer` around the translation `target` recommended elsewhere.
    ///
    /// The constrained result keeps the translation at `target` exactly, even
    /// outside `range`; only its rotation is searched within `range`. The free
    /// result searches the whole box with the target as the tie-break anchor.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, layer, range), fields(layer = %layer.layer_id))
    )]
    pub fn target_anchored(
        &self,
        layer: &LayerPointSet,
        range: &RangeConstraint,
        target: [f64; 2],
    ) -> Result<AnchoredResult, OptimizeError> {
        range.validate()?;
        self.params().sweep.validate()?;
        layer.validate()?;
        let [tx, ty] = target;
        if !tx.is_finite() || !ty.is_finite() {
            return Err(OptimizeError::NonFiniteTarget(tx, ty));
        }

        let anchor = OffsetVector::translation(tx, ty);
        let grid = self.params().sweep.grid(range.rotation())?;

        let anchors = Anchors::of(layer);
        let constrained = sweep(&grid, &anchor, |q| fixed_translation(&anchors, q, target))
            .map_or(anchor, |c| c.offset);
        let free = self.independent(layer, range, &anchor)?.offset;

        debug!(
            "target-anchored {}: constrained {:?}, free {:?}",
            layer.layer_id, constrained, free
        );

        Ok(AnchoredResult {
            target,
            constrained: self.layer_optimum(layer, constrained),
            free: self.layer_optimum(layer, free),
        })
    }
}
