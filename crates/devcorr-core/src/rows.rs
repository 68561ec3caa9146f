//! Row-indexed measurements (left/center/right sub-positions per row).

use std::collections::BTreeMap;
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

/// Measurement axis: `X` is left-right, `Y` is up-down.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    #[inline]
    pub fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Axis::X => "x",
            Axis::Y => "y",
        })
    }
}

/// Anchor inside a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubPosition {
    Left,
    Center,
    Right,
}

impl SubPosition {
    pub const ALL: [SubPosition; 3] = [SubPosition::Left, SubPosition::Center, SubPosition::Right];

    /// Signed lateral position relative to the row center.
    #[inline]
    pub fn lateral(self) -> f64 {
        match self {
            SubPosition::Left => -1.0,
            SubPosition::Center => 0.0,
            SubPosition::Right => 1.0,
        }
    }
}

/// Signed deviations (mm) at one sub-position; either axis may be unmeasured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisValues {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

impl AxisValues {
    pub fn new(x: Option<f64>, y: Option<f64>) -> Self {
        Self { x, y }
    }

    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
        }
    }

    #[inline]
    pub fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, axis: Axis) -> &mut Option<f64> {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        }
    }

    fn sanitized(self) -> (Self, bool) {
        let keep = |v: Option<f64>| v.filter(|v| v.is_finite());
        let out = Self {
            x: keep(self.x),
            y: keep(self.y),
        };
        let dropped = out.x.is_none() != self.x.is_none() || out.y.is_none() != self.y.is_none();
        (out, dropped)
    }
}

/// One measured row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    pub row_index: u32,
    #[serde(default)]
    pub positions: BTreeMap<SubPosition, AxisValues>,
}

impl RowRecord {
    pub fn new(row_index: u32) -> Self {
        Self {
            row_index,
            positions: BTreeMap::new(),
        }
    }

    pub fn with(mut self, position: SubPosition, values: AxisValues) -> Self {
        self.positions.insert(position, values);
        self
    }

    /// All measured values on `axis`, in sub-position order.
    pub fn values(&self, axis: Axis) -> impl Iterator<Item = (SubPosition, f64)> + '_ {
        self.positions
            .iter()
            .filter_map(move |(&p, v)| v.get(axis).map(|val| (p, val)))
    }

    /// Mean of the measured values on `axis`, `None` if nothing was measured.
    pub fn mean(&self, axis: Axis) -> Option<f64> {
        let (sum, n) = self
            .values(axis)
            .fold((0.0, 0usize), |(s, n), (_, v)| (s + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Largest absolute value on `axis`.
    pub fn worst_abs(&self, axis: Axis) -> Option<f64> {
        self.values(axis).map(|(_, v)| v.abs()).reduce(f64::max)
    }

    /// Signed value with the largest magnitude on `axis`.
    pub fn worst_signed(&self, axis: Axis) -> Option<f64> {
        self.values(axis)
            .map(|(_, v)| v)
            .reduce(|a, b| if b.abs() > a.abs() { b } else { a })
    }
}

/// Row set validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRowSet {
    #[error("row set is empty")]
    Empty,
    /// Rows must be numbered `1..=N` in order.
    #[error("row {found} at position {position}, expected row {expected}")]
    NonContiguous {
        position: usize,
        expected: u32,
        found: u32,
    },
}

/// Ordered, contiguous rows `1..=N`.
///
/// Non-finite values are treated as unmeasured.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RowSet {
    rows: Vec<RowRecord>,
}

impl RowSet {
    pub fn new(rows: Vec<RowRecord>) -> Result<Self, InvalidRowSet> {
        if rows.is_empty() {
            return Err(InvalidRowSet::Empty);
        }
        let mut out = Vec::with_capacity(rows.len());
        for (position, mut row) in rows.into_iter().enumerate() {
            let expected = position as u32 + 1;
            if row.row_index != expected {
                return Err(InvalidRowSet::NonContiguous {
                    position,
                    expected,
                    found: row.row_index,
                });
            }
            for (sub, values) in row.positions.iter_mut() {
                let (clean, dropped) = values.sanitized();
                if dropped {
                    warn!("row {expected} {sub:?}: non-finite value treated as unmeasured");
                }
                *values = clean;
            }
            out.push(row);
        }
        Ok(Self { rows: out })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn rows(&self) -> &[RowRecord] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &RowRecord> {
        self.rows.iter()
    }

    /// Geometric center row index, `(N + 1) / 2`.
    #[inline]
    pub fn center_index(&self) -> f64 {
        (self.rows.len() as f64 + 1.0) / 2.0
    }

    /// Signed distance of `row_index` from the center row.
    #[inline]
    pub fn row_factor(&self, row_index: u32) -> f64 {
        row_index as f64 - self.center_index()
    }

    pub fn get(&self, row_index: u32) -> Option<&RowRecord> {
        let idx = usize::try_from(row_index).ok()?.checked_sub(1)?;
        self.rows.get(idx)
    }

    /// Build a row set from rows that were already validated.
    pub(crate) fn from_validated(rows: Vec<RowRecord>) -> Self {
        Self { rows }
    }
}

impl<'de> Deserialize<'de> for RowSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let rows = Vec::<RowRecord>::deserialize(deserializer)?;
        RowSet::new(rows).map_err(serde::de::Error::custom)
    }
}
