//! Four-point correction optimizer.
//!
//! Each printed layer is measured at its four corners. The optimizer searches
//! a bounded grid of rotations and, for every rotation, solves the
//! translation in closed form, so the result is the exact optimum over the
//! grid. Three objectives are supported (see [`Mode`]) plus a search anchored
//! on a translation recommended by a downstream station.
//!
//! ```
//! use devcorr_core::{LayerId, LayerPointSet, ThresholdConfig};
//! use devcorr_optimize::{FourPointOptimizer, Mode, OptimizerParams};
//!
//! let carbon = LayerPointSet::from_corners(
//!     "carbon",
//!     [[0.08, 0.02], [0.10, 0.03], [0.07, 0.0], [0.09, 0.01]],
//! );
//! let insulation = LayerPointSet::from_corners(
//!     "insulation",
//!     [[0.02, 0.05], [0.03, 0.06], [0.01, 0.04], [0.02, 0.05]],
//! );
//!
//! let opt = FourPointOptimizer::new(ThresholdConfig::default(), OptimizerParams::default());
//! let res = opt.optimize(Mode::Independent, &carbon, &insulation).unwrap();
//! let id = LayerId::from("carbon");
//! assert!(res.score_after[&id] >= res.score_before[&id]);
//! ```

mod anchored;
mod optimizer;
mod search;
mod sweep;

pub use anchored::{AnchoredResult, LayerOptimum};
pub use optimizer::{
    FourPointOptimizer, LayerRanges, Mode, OptimizationResult, OptimizeError, OptimizerParams,
};
pub use sweep::{RotationSweep, SweepError, OBJECTIVE_QUANTUM};
