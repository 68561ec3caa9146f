//! Tolerance bands and severity classification.
//!
//! Every deviation the engine reports is eventually mapped onto a three-tier
//! [`Status`]. Exceeding tolerance is a normal outcome (`Ng`), never an error.

use serde::{Deserialize, Serialize};

use crate::Axis;

/// Severity of a deviation, ordered `Ok < Check < Ng`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Check,
    Ng,
}

/// Threshold band validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ThresholdError {
    #[error("threshold limits must be finite and >= 0 (ok={ok}, check={check}, ng={ng})")]
    NotFinite { ok: f64, check: f64, ng: f64 },
    #[error("ng limit must be > 0")]
    ZeroNgLimit,
    #[error("threshold limits must satisfy ok <= check <= ng (ok={ok}, check={check}, ng={ng})")]
    Unordered { ok: f64, check: f64, ng: f64 },
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct RawThresholds {
    ok_limit: f64,
    check_limit: f64,
    ng_limit: f64,
}

impl TryFrom<RawThresholds> for ThresholdConfig {
    type Error = ThresholdError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        ThresholdConfig::new(raw.ok_limit, raw.check_limit, raw.ng_limit)
    }
}

impl From<ThresholdConfig> for RawThresholds {
    fn from(cfg: ThresholdConfig) -> Self {
        Self {
            ok_limit: cfg.ok_limit,
            check_limit: cfg.check_limit,
            ng_limit: cfg.ng_limit,
        }
    }
}

/// Tolerance band in millimeters.
///
/// The ordering invariant `0 <= ok <= check <= ng`, `ng > 0` is checked once,
/// when the config is built or deserialized, and never re-checked per call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds", into = "RawThresholds")]
pub struct ThresholdConfig {
    ok_limit: f64,
    check_limit: f64,
    ng_limit: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            ok_limit: 0.05,
            check_limit: 0.10,
            ng_limit: 0.15,
        }
    }
}

impl ThresholdConfig {
    pub fn new(ok_limit: f64, check_limit: f64, ng_limit: f64) -> Result<Self, ThresholdError> {
        let finite = [ok_limit, check_limit, ng_limit]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0);
        if !finite {
            return Err(ThresholdError::NotFinite {
                ok: ok_limit,
                check: check_limit,
                ng: ng_limit,
            });
        }
        if ng_limit <= 0.0 {
            return Err(ThresholdError::ZeroNgLimit);
        }
        if ok_limit > check_limit || check_limit > ng_limit {
            return Err(ThresholdError::Unordered {
                ok: ok_limit,
                check: check_limit,
                ng: ng_limit,
            });
        }
        Ok(Self {
            ok_limit,
            check_limit,
            ng_limit,
        })
    }

    #[inline]
    pub fn ok_limit(&self) -> f64 {
        self.ok_limit
    }

    #[inline]
    pub fn check_limit(&self) -> f64 {
        self.check_limit
    }

    #[inline]
    pub fn ng_limit(&self) -> f64 {
        self.ng_limit
    }

    /// Classify a signed deviation against this band.
    #[inline]
    pub fn classify(&self, magnitude: f64) -> Status {
        classify(magnitude, self)
    }

    /// Margin report relative to the NG limit.
    pub fn margin(&self, magnitude: f64) -> Margin {
        let abs = magnitude.abs();
        Margin {
            percent: margin_percent(magnitude, self.ng_limit),
            movable_mm: (self.ng_limit - abs).max(0.0),
            low: abs > self.ok_limit,
        }
    }
}

/// Map a deviation magnitude to a severity tier.
///
/// `Ng` if `|m| >= ng`, `Check` if `|m| >= check`, else `Ok`. Total and
/// monotonic in `|m|`.
pub fn classify(magnitude: f64, config: &ThresholdConfig) -> Status {
    let m = magnitude.abs();
    if m >= config.ng_limit {
        Status::Ng
    } else if m >= config.check_limit {
        Status::Check
    } else {
        Status::Ok
    }
}

/// Status of a 2-D deviation, judged by its worst axis.
pub fn classify_point(x: f64, y: f64, config: &ThresholdConfig) -> Status {
    classify(x.abs().max(y.abs()), config)
}

/// Remaining margin to `limit`, in percent: `(limit - |m|) / limit * 100`.
///
/// Negative when over the limit; never clamped.
pub fn margin_percent(magnitude: f64, limit: f64) -> f64 {
    (limit - magnitude.abs()) / limit * 100.0
}

/// Margin of one value against the NG limit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    /// `(ng - |m|) / ng * 100`, may be negative.
    pub percent: f64,
    /// Distance left before NG, floored at zero.
    pub movable_mm: f64,
    /// `|m|` is beyond the comfortable OK band.
    pub low: bool,
}

/// Before/after comparison of a magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improved,
    Worsened,
    Unchanged,
}

impl Trend {
    /// Compare absolute values; differences within `deadband` are `Unchanged`.
    pub fn between(before: f64, after: f64, deadband: f64) -> Self {
        let delta = after.abs() - before.abs();
        if delta.abs() <= deadband {
            Trend::Unchanged
        } else if delta < 0.0 {
            Trend::Improved
        } else {
            Trend::Worsened
        }
    }
}

/// Which way a signed deviation drifts on the floor.
///
/// X(+) is right, X(-) is left, Y(+) is up, Y(-) is down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftDirection {
    Centered,
    Left,
    Right,
    Up,
    Down,
}

pub fn drift_direction(axis: Axis, value: f64, deadband: f64) -> DriftDirection {
    if !value.is_finite() || value.abs() < deadband {
        return DriftDirection::Centered;
    }
    match (axis, value > 0.0) {
        (Axis::X, true) => DriftDirection::Right,
        (Axis::X, false) => DriftDirection::Left,
        (Axis::Y, true) => DriftDirection::Up,
        (Axis::Y, false) => DriftDirection::Down,
    }
}
