//! Facade crate for the `devcorr-*` workspace.
//!
//! This crate provides:
//! - re-exports of the core model, the row engine and the four-point optimizer
//! - JSON configuration, request and report types ([`io`])
//! - (feature `cli`) the `devcorr` command-line tool
//!
//! ## Quickstart
//!
//! ```
//! use devcorr::io::{EngineConfig, OptimizeRequest};
//! use devcorr::{LayerPointSet, Mode};
//!
//! let cfg = EngineConfig::default();
//! let req = OptimizeRequest {
//!     mode: Mode::JointAlignment,
//!     base: LayerPointSet::from_corners("carbon", [[0.04, 0.01]; 4]),
//!     overlay: LayerPointSet::from_corners("insulation", [[-0.03, 0.02]; 4]),
//! };
//! let report = cfg.optimize(&req);
//! assert!(report.error.is_none());
//! ```
//!
//! ## API map
//! - `devcorr::core`: value types, thresholds, rigid transform model, norms.
//! - `devcorr::rows`: tilt fit, row simulation, live recommendation.
//! - `devcorr::optimize`: four-point optimizer and target-anchored search.
//! - `devcorr::io`: JSON config/request/report helpers used by the CLI.

pub use devcorr_core as core;
pub use devcorr_optimize as optimize;
pub use devcorr_rows as rows;

pub use devcorr_core::{
    classify, Corner, LayerId, LayerPointSet, OffsetVector, RangeConstraint, RowGeometry,
    RowRecord, RowSet, Status, ThresholdConfig,
};
pub use devcorr_optimize::{FourPointOptimizer, Mode, OptimizationResult, RotationSweep};
pub use devcorr_rows::{
    fit, live_recommendation, LiveRecommendation, RowSimulator, SimulationReport, StationOffsets,
};

pub mod io;
