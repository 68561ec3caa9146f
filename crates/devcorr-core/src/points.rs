//! Four-corner layer measurements.

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Anchor corner of a printed sheet.
///
/// Lever arms relative to the sheet center are `(-1|+1, -1|+1)` with `+x`
/// pointing right and `+y` pointing up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// Signed position of the corner relative to the sheet center.
    #[inline]
    pub fn lever(self) -> Vector2<f64> {
        match self {
            Corner::TopLeft => Vector2::new(-1.0, 1.0),
            Corner::TopRight => Vector2::new(1.0, 1.0),
            Corner::BottomLeft => Vector2::new(-1.0, -1.0),
            Corner::BottomRight => Vector2::new(1.0, -1.0),
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Corner::TopLeft => "top_left",
            Corner::TopRight => "top_right",
            Corner::BottomLeft => "bottom_left",
            Corner::BottomRight => "bottom_right",
        };
        f.write_str(name)
    }
}

/// Measured deviation (mm) at one corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviationPoint {
    pub position: Corner,
    pub x: f64,
    pub y: f64,
}

impl DeviationPoint {
    pub fn new(position: Corner, x: f64, y: f64) -> Self {
        Self { position, x, y }
    }

    #[inline]
    pub fn vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Identifier of a printed layer (e.g. `"carbon"`, `"insulation"`).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Why a layer point set cannot take part in a computation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InvalidPointSet {
    #[error("layer {layer}: missing point at {position}")]
    MissingPosition { layer: LayerId, position: Corner },
    #[error("layer {layer}: more than one point at {position}")]
    DuplicatePosition { layer: LayerId, position: Corner },
    #[error("layer {layer}: non-finite deviation at {position}")]
    NonFinite { layer: LayerId, position: Corner },
    #[error("layer {layer}: point stored under {key} claims position {position}")]
    MislabeledPoint {
        layer: LayerId,
        key: Corner,
        position: Corner,
    },
}

/// Deviations of one printed layer, keyed by corner.
///
/// A set may be incomplete as delivered by ingestion; [`LayerPointSet::validate`]
/// decides whether it can be optimized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerPointSet {
    pub layer_id: LayerId,
    pub points: BTreeMap<Corner, DeviationPoint>,
}

impl LayerPointSet {
    /// Build a set from a flat point list, rejecting duplicate positions.
    pub fn from_points(
        layer_id: LayerId,
        points: impl IntoIterator<Item = DeviationPoint>,
    ) -> Result<Self, InvalidPointSet> {
        let mut map = BTreeMap::new();
        for p in points {
            if map.insert(p.position, p).is_some() {
                return Err(InvalidPointSet::DuplicatePosition {
                    layer: layer_id,
                    position: p.position,
                });
            }
        }
        Ok(Self {
            layer_id,
            points: map,
        })
    }

    /// Convenience constructor from `[x, y]` pairs in [`Corner::ALL`] order.
    pub fn from_corners(layer_id: impl Into<LayerId>, xy: [[f64; 2]; 4]) -> Self {
        let points = Corner::ALL
            .iter()
            .zip(xy)
            .map(|(&c, [x, y])| (c, DeviationPoint::new(c, x, y)))
            .collect();
        Self {
            layer_id: layer_id.into(),
            points,
        }
    }

    /// Check completeness, labeling and finiteness.
    pub fn validate(&self) -> Result<(), InvalidPointSet> {
        for (&key, p) in &self.points {
            if key != p.position {
                return Err(InvalidPointSet::MislabeledPoint {
                    layer: self.layer_id.clone(),
                    key,
                    position: p.position,
                });
            }
        }
        for c in Corner::ALL {
            let Some(p) = self.points.get(&c) else {
                return Err(InvalidPointSet::MissingPosition {
                    layer: self.layer_id.clone(),
                    position: c,
                });
            };
            if !p.is_finite() {
                return Err(InvalidPointSet::NonFinite {
                    layer: self.layer_id.clone(),
                    position: c,
                });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn get(&self, corner: Corner) -> Option<&DeviationPoint> {
        self.points.get(&corner)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviationPoint> {
        self.points.values()
    }

    /// Same layer with every deviation replaced by `f(point)`.
    pub fn map_points(&self, mut f: impl FnMut(&DeviationPoint) -> Vector2<f64>) -> Self {
        let points = self
            .points
            .iter()
            .map(|(&c, p)| {
                let v = f(p);
                (c, DeviationPoint::new(c, v.x, v.y))
            })
            .collect();
        Self {
            layer_id: self.layer_id.clone(),
            points,
        }
    }
}
