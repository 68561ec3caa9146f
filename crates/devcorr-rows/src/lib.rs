//! Row-based simulation and recommendation.
//!
//! Rows are measured at left/center/right sub-positions. This crate fits the
//! translation + tilt that best explains those measurements, simulates the
//! effect of composite station offsets (global, optional secondary station,
//! per-row), and derives incremental recommendations on top of what is
//! already applied.
//!
//! ```
//! use devcorr_core::{Axis, AxisValues, RowRecord, RowSet, SubPosition};
//! use devcorr_rows::{fit, RowSimulator, StationOffsets};
//!
//! let rows: Vec<_> = (1..=12)
//!     .map(|i| {
//!         let v = 0.01 * (i as f64 - 6.5);
//!         RowRecord::new(i)
//!             .with(SubPosition::Left, AxisValues::new(Some(v), None))
//!             .with(SubPosition::Right, AxisValues::new(Some(v), None))
//!     })
//!     .collect();
//! let rows = RowSet::new(rows).unwrap();
//!
//! let tilt = fit(&rows, Axis::X);
//! let report = RowSimulator::default()
//!     .simulate(&rows, &StationOffsets::global(tilt.offset))
//!     .unwrap();
//! assert!(report.after.worst < 1e-9);
//! ```

mod offsets;
mod recommend;
mod simulate;
mod tilt;

pub use offsets::{OffsetError, RowOffset, SecondaryStation, StationOffsets};
pub use recommend::{
    live_recommendation, priority_rows, standalone_per_row, LiveRecommendation, PriorityRow,
    SECONDARY_AXIS,
};
pub use simulate::{
    RowAggregate, RowComparison, RowSimulationParams, RowSimulator, SimulationError,
    SimulationReport,
};
pub use tilt::{fit, TiltFit};
