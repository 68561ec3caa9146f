//! JSON configuration, requests and reports.
//!
//! Every operation takes a request document plus an optional [`EngineConfig`]
//! and produces a [`CorrectionReport`]. Engine errors end up in the report's
//! `error` field, so a report is written for every request that parses.

use std::{fs, path::Path};

use devcorr_core::{LayerPointSet, RowSet, ThresholdConfig};
use devcorr_optimize::{
    AnchoredResult, FourPointOptimizer, LayerRanges, Mode, OptimizationResult, OptimizerParams,
    RotationSweep,
};
use devcorr_rows::{
    live_recommendation, priority_rows, standalone_per_row, LiveRecommendation, PriorityRow,
    RowSimulationParams, RowSimulator, SimulationReport, StationOffsets,
};
use log::{info, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum DevcorrIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Read a JSON document from disk.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, DevcorrIoError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Write `value` to disk as pretty JSON.
pub fn write_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), DevcorrIoError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Engine-wide settings. Every section is optional in JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: ThresholdConfig,
    pub ranges: LayerRanges,
    pub sweep: RotationSweep,
    pub rows: RowSimulationParams,
}

impl EngineConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DevcorrIoError> {
        load_json(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DevcorrIoError> {
        write_json(self, path)
    }

    pub fn optimizer(&self) -> FourPointOptimizer {
        FourPointOptimizer::new(
            self.thresholds,
            OptimizerParams {
                ranges: self.ranges,
                sweep: self.sweep,
            },
        )
    }

    pub fn simulator(&self) -> RowSimulator {
        RowSimulator::new(self.thresholds, self.rows)
    }

    fn report(&self, result: Result<ReportPayload, String>) -> CorrectionReport {
        match result {
            Ok(payload) => CorrectionReport {
                thresholds: self.thresholds,
                result: Some(payload),
                error: None,
            },
            Err(error) => {
                warn!("request failed: {error}");
                CorrectionReport {
                    thresholds: self.thresholds,
                    result: None,
                    error: Some(error),
                }
            }
        }
    }

    pub fn simulate(&self, req: &SimulateRequest) -> CorrectionReport {
        info!("simulating {} rows", req.rows.len());
        let result = self
            .simulator()
            .simulate(&req.rows, &req.offsets)
            .map(ReportPayload::Simulate)
            .map_err(|e| e.to_string());
        self.report(result)
    }

    pub fn recommend(&self, req: &RecommendRequest) -> CorrectionReport {
        info!(
            "recommending for {} rows (secondary available: {})",
            req.rows.len(),
            req.secondary_available
        );
        let geometry = &self.rows.geometry;
        let recommendation =
            live_recommendation(&req.rows, &req.current, req.secondary_available, geometry);
        let priority = priority_rows(
            &recommendation.additional,
            req.max_priority_rows,
            req.min_movement,
        );
        let standalone = req
            .standalone
            .then(|| standalone_per_row(&req.rows, &req.current, geometry));
        self.report(Ok(ReportPayload::Recommend {
            recommendation,
            priority,
            standalone,
        }))
    }

    pub fn optimize(&self, req: &OptimizeRequest) -> CorrectionReport {
        info!(
            "optimizing {} / {} in {:?} mode",
            req.base.layer_id, req.overlay.layer_id, req.mode
        );
        let result = self
            .optimizer()
            .optimize(req.mode, &req.base, &req.overlay)
            .map(ReportPayload::Optimize)
            .map_err(|e| e.to_string());
        self.report(result)
    }

    pub fn anchored(&self, req: &AnchoredRequest) -> CorrectionReport {
        let range = match req.role {
            LayerRole::Base => &self.ranges.base,
            LayerRole::Overlay => &self.ranges.overlay,
        };
        info!(
            "target-anchored optimization of {} at [{}, {}]",
            req.layer.layer_id, req.target[0], req.target[1]
        );
        let result = self
            .optimizer()
            .target_anchored(&req.layer, range, req.target)
            .map(ReportPayload::Anchored)
            .map_err(|e| e.to_string());
        self.report(result)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulateRequest {
    pub rows: RowSet,
    #[serde(default)]
    pub offsets: StationOffsets,
}

fn default_max_priority_rows() -> usize {
    5
}

fn default_min_movement() -> f64 {
    0.01
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecommendRequest {
    pub rows: RowSet,
    /// Offsets already dialed in.
    #[serde(default)]
    pub current: StationOffsets,
    #[serde(default)]
    pub secondary_available: bool,
    #[serde(default = "default_max_priority_rows")]
    pub max_priority_rows: usize,
    #[serde(default = "default_min_movement")]
    pub min_movement: f64,
    /// Also report the per-row-only recommendation.
    #[serde(default)]
    pub standalone: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptimizeRequest {
    #[serde(default)]
    pub mode: Mode,
    pub base: LayerPointSet,
    pub overlay: LayerPointSet,
}

/// Which configured box applies to a single-layer request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerRole {
    Base,
    #[default]
    Overlay,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnchoredRequest {
    pub layer: LayerPointSet,
    /// Translation `[x, y]` recommended downstream.
    pub target: [f64; 2],
    #[serde(default)]
    pub role: LayerRole,
}

/// Result of one operation, tagged by operation name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum ReportPayload {
    Simulate(SimulationReport),
    Recommend {
        recommendation: LiveRecommendation,
        priority: Vec<PriorityRow>,
        #[serde(default)]
        standalone: Option<StationOffsets>,
    },
    Optimize(OptimizationResult),
    Anchored(AnchoredResult),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrectionReport {
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub result: Option<ReportPayload>,
    #[serde(default)]
    pub error: Option<String>,
}

impl CorrectionReport {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DevcorrIoError> {
        load_json(path)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), DevcorrIoError> {
        write_json(self, path)
    }
}
