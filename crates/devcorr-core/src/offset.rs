//! Correction offsets and the boxes that bound them.

use std::fmt;
use std::ops::Add;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Rigid correction: small-angle rotation coefficient plus translation (mm).
///
/// Offsets compose additively on every component, see the `Add` impl.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OffsetVector {
    pub rotation: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl OffsetVector {
    pub const ZERO: OffsetVector = OffsetVector {
        rotation: 0.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    pub fn new(rotation: f64, translate_x: f64, translate_y: f64) -> Self {
        Self {
            rotation,
            translate_x,
            translate_y,
        }
    }

    pub fn translation(translate_x: f64, translate_y: f64) -> Self {
        Self::new(0.0, translate_x, translate_y)
    }

    #[inline]
    pub fn translation_vector(&self) -> Vector2<f64> {
        Vector2::new(self.translate_x, self.translate_y)
    }

    /// Euclidean size of the correction, used to prefer minimal motion.
    #[inline]
    pub fn magnitude(&self) -> f64 {
        (self.rotation * self.rotation
            + self.translate_x * self.translate_x
            + self.translate_y * self.translate_y)
            .sqrt()
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.rotation.is_finite() && self.translate_x.is_finite() && self.translate_y.is_finite()
    }

    /// Component-wise negation.
    pub fn inverse(&self) -> Self {
        Self::new(-self.rotation, -self.translate_x, -self.translate_y)
    }
}

impl Add for OffsetVector {
    type Output = OffsetVector;

    fn add(self, rhs: OffsetVector) -> OffsetVector {
        OffsetVector {
            rotation: self.rotation + rhs.rotation,
            translate_x: self.translate_x + rhs.translate_x,
            translate_y: self.translate_y + rhs.translate_y,
        }
    }
}

impl std::iter::Sum for OffsetVector {
    fn sum<I: Iterator<Item = OffsetVector>>(iter: I) -> Self {
        iter.fold(OffsetVector::ZERO, Add::add)
    }
}

/// Component of an [`OffsetVector`], used in constraint errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetComponent {
    Rotation,
    TranslateX,
    TranslateY,
}

impl fmt::Display for OffsetComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OffsetComponent::Rotation => "rotation",
            OffsetComponent::TranslateX => "x",
            OffsetComponent::TranslateY => "y",
        })
    }
}

/// Constraint box validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("{component} range is inverted (min={min} > max={max})")]
    OutOfRange {
        component: OffsetComponent,
        min: f64,
        max: f64,
    },
    #[error("{component} range has a non-finite bound")]
    NonFinite { component: OffsetComponent },
}

/// Closed interval `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    #[inline]
    pub fn clamp(&self, v: f64) -> f64 {
        v.max(self.min).min(self.max)
    }

    /// Intersection, `None` when empty.
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let lo = self.min.max(other.min);
        let hi = self.max.min(other.max);
        (lo <= hi).then_some(Interval::new(lo, hi))
    }

    /// Point of the interval closest to `target`.
    #[inline]
    pub fn nearest(&self, target: f64) -> f64 {
        self.clamp(target)
    }
}

/// Box bounds on each component of an [`OffsetVector`].
///
/// Bounds may be asymmetric. Use [`RangeConstraint::validate`] before any
/// search; an inverted box is a configuration bug upstream.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeConstraint {
    pub rotation_min: f64,
    pub rotation_max: f64,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Default for RangeConstraint {
    fn default() -> Self {
        Self::symmetric(0.10, 0.20, 0.20)
    }
}

impl RangeConstraint {
    /// `±rotation`, `±x`, `±y`. Negative inputs are taken by magnitude.
    pub fn symmetric(rotation: f64, x: f64, y: f64) -> Self {
        let (q, x, y) = (rotation.abs(), x.abs(), y.abs());
        Self {
            rotation_min: -q,
            rotation_max: q,
            x_min: -x,
            x_max: x,
            y_min: -y,
            y_max: y,
        }
    }

    pub fn validate(&self) -> Result<(), ConstraintError> {
        for (component, min, max) in [
            (OffsetComponent::Rotation, self.rotation_min, self.rotation_max),
            (OffsetComponent::TranslateX, self.x_min, self.x_max),
            (OffsetComponent::TranslateY, self.y_min, self.y_max),
        ] {
            if !min.is_finite() || !max.is_finite() {
                return Err(ConstraintError::NonFinite { component });
            }
            if min > max {
                return Err(ConstraintError::OutOfRange {
                    component,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn rotation(&self) -> Interval {
        Interval::new(self.rotation_min, self.rotation_max)
    }

    #[inline]
    pub fn x(&self) -> Interval {
        Interval::new(self.x_min, self.x_max)
    }

    #[inline]
    pub fn y(&self) -> Interval {
        Interval::new(self.y_min, self.y_max)
    }

    pub fn contains(&self, offset: &OffsetVector) -> bool {
        self.rotation().contains(offset.rotation)
            && self.x().contains(offset.translate_x)
            && self.y().contains(offset.translate_y)
    }

    pub fn contains_zero(&self) -> bool {
        self.contains(&OffsetVector::ZERO)
    }

    /// Pull `offset` into the box component-wise.
    pub fn clamp(&self, offset: &OffsetVector) -> OffsetVector {
        OffsetVector {
            rotation: self.rotation().clamp(offset.rotation),
            translate_x: self.x().clamp(offset.translate_x),
            translate_y: self.y().clamp(offset.translate_y),
        }
    }
}
