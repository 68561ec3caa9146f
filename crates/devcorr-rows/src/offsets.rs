//! Composite station offsets for row-based simulation.

use std::collections::BTreeMap;

use devcorr_core::OffsetVector;
use log::warn;
use serde::{Deserialize, Serialize};

/// Offset applied to a single row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RowOffset {
    pub row_index: u32,
    #[serde(flatten)]
    pub offset: OffsetVector,
}

impl RowOffset {
    pub fn new(row_index: u32, offset: OffsetVector) -> Self {
        Self { row_index, offset }
    }
}

/// Optional per-row station (e.g. a slitter) correcting between the global
/// stage and the per-row stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SecondaryStation {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub per_row: Vec<RowOffset>,
}

/// Offset validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OffsetError {
    #[error("global offset has a non-finite component")]
    NonFiniteGlobal,
    #[error("offset for row {row_index} has a non-finite component")]
    NonFiniteRow { row_index: u32 },
}

/// Global, per-row and secondary offsets applied together to a row set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StationOffsets {
    #[serde(default)]
    pub global: OffsetVector,
    #[serde(default)]
    pub per_row: Vec<RowOffset>,
    #[serde(default)]
    pub secondary: SecondaryStation,
}

impl StationOffsets {
    pub fn global(offset: OffsetVector) -> Self {
        Self {
            global: offset,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), OffsetError> {
        if !self.global.is_finite() {
            return Err(OffsetError::NonFiniteGlobal);
        }
        for r in self.per_row.iter().chain(&self.secondary.per_row) {
            if !r.offset.is_finite() {
                return Err(OffsetError::NonFiniteRow {
                    row_index: r.row_index,
                });
            }
        }
        Ok(())
    }

    /// Offsets as they are actually applied: a disabled secondary station
    /// contributes nothing and its entries are zeroed.
    pub fn effective(&self) -> Self {
        let mut out = self.clone();
        if !out.secondary.enabled {
            for r in &mut out.secondary.per_row {
                r.offset = OffsetVector::ZERO;
            }
        }
        out
    }

    /// `global ⊕ per_row[i] ⊕ secondary[i]` for one row.
    ///
    /// Duplicate entries for the same row add up.
    pub fn combined_for(&self, row_index: u32) -> OffsetVector {
        let per_row: OffsetVector = self
            .per_row
            .iter()
            .filter(|r| r.row_index == row_index)
            .map(|r| r.offset)
            .sum();
        let secondary: OffsetVector = if self.secondary.enabled {
            self.secondary
                .per_row
                .iter()
                .filter(|r| r.row_index == row_index)
                .map(|r| r.offset)
                .sum()
        } else {
            OffsetVector::ZERO
        };
        self.global + per_row + secondary
    }

    /// Warn about per-row entries that target rows outside `1..=row_count`.
    ///
    /// Such entries never match a row and are ignored by [`Self::combined_for`].
    pub fn warn_unknown_rows(&self, row_count: usize) {
        let in_range = |i: u32| i >= 1 && (i as usize) <= row_count;
        for r in &self.per_row {
            if !in_range(r.row_index) {
                warn!("per-row offset for missing row {} ignored", r.row_index);
            }
        }
        for r in &self.secondary.per_row {
            if !in_range(r.row_index) {
                warn!("secondary offset for missing row {} ignored", r.row_index);
            }
        }
    }

    /// Sum of two offset sets, with one entry per row in each per-row list.
    ///
    /// The secondary station is enabled if either side enables it.
    pub fn compose(&self, other: &StationOffsets) -> StationOffsets {
        let (a, b) = (&self.secondary, &other.secondary);
        StationOffsets {
            global: self.global + other.global,
            per_row: merge_rows(self.per_row.iter().chain(&other.per_row)),
            secondary: SecondaryStation {
                enabled: a.enabled || b.enabled,
                per_row: merge_rows(a.per_row.iter().chain(&b.per_row)),
            },
        }
    }

    /// Largest component of any per-row or secondary entry, plus the global offset.
    pub fn max_component(&self) -> f64 {
        let comp = |o: &OffsetVector| {
            o.rotation
                .abs()
                .max(o.translate_x.abs())
                .max(o.translate_y.abs())
        };
        self.per_row
            .iter()
            .chain(&self.secondary.per_row)
            .map(|r| comp(&r.offset))
            .fold(comp(&self.global), f64::max)
    }
}

fn merge_rows<'a>(entries: impl Iterator<Item = &'a RowOffset>) -> Vec<RowOffset> {
    let mut merged: BTreeMap<u32, OffsetVector> = BTreeMap::new();
    for r in entries {
        let e = merged.entry(r.row_index).or_default();
        *e = *e + r.offset;
    }
    merged
        .into_iter()
        .map(|(row_index, offset)| RowOffset { row_index, offset })
        .collect()
}
