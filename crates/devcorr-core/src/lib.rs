//! Core types and the rigid transform model for deviation correction.
//!
//! Sheets are measured at fixed anchors: four corners per printed layer, or
//! left/center/right positions per row. This crate holds the immutable value
//! types for those measurements, the tolerance classifier, and the linearized
//! translation + small-angle rotation model shared by the row simulator and
//! the four-point optimizer. It performs no I/O and keeps no state.
//!
//! ```
//! use devcorr_core::{
//!     box_norm, classify, transform_points, LayerPointSet, OffsetVector, Status,
//!     ThresholdConfig,
//! };
//!
//! let th = ThresholdConfig::default();
//! let layer = LayerPointSet::from_corners(
//!     "carbon",
//!     [[-0.02, -0.03], [0.02, -0.03], [-0.02, 0.03], [0.02, 0.03]],
//! );
//! assert_eq!(classify(box_norm(&layer), &th), Status::Ok);
//!
//! let moved = transform_points(&layer, &OffsetVector::translation(0.0, 0.1));
//! assert_eq!(classify(box_norm(&moved), &th), Status::Check);
//! ```

mod logger;
mod offset;
mod points;
mod rows;
mod threshold;
mod transform;

pub use offset::{ConstraintError, Interval, OffsetComponent, OffsetVector, RangeConstraint};
pub use points::{Corner, DeviationPoint, InvalidPointSet, LayerId, LayerPointSet};
pub use rows::{Axis, AxisValues, InvalidRowSet, RowRecord, RowSet, SubPosition};
pub use threshold::{
    classify, classify_point, drift_direction, margin_percent, DriftDirection, Margin, Status,
    ThresholdConfig, ThresholdError, Trend,
};
pub use transform::{
    box_norm, box_norm_of, corner_displacement, difference, normalize, normalized_score,
    radius_norm, radius_norm_of, row_displacement, score100, transform_points, transform_row,
    transform_rows, RowGeometry, CORNER_ROTATION_GAIN, NORMALIZED_SCORE_CAP,
    ROW_SECONDARY_DAMPING, ROW_TILT_DAMPING,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
