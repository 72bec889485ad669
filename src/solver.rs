// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Hydraulic Solver Boundary
//
// The numerical solver is external. This module fixes what the engine hands
// it and what it must hand back.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::HydraulicConfig;
use crate::network::WaterNetwork;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum SolverError {
    /// The solve did not converge.
    #[error("simulation diverged: {0}")]
    Diverged(String),

    #[error("solver rejected network: {0}")]
    InvalidNetwork(String),

    #[error("solver failure: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandModel {
    DemandDriven,
    #[default]
    PressureDriven,
}

/// Global options passed to every solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydraulicOptions {
    pub duration_hours: i64,
    pub minimum_pressure: f64,
    pub required_pressure: f64,
    pub demand_model: DemandModel,
}

impl From<&HydraulicConfig> for HydraulicOptions {
    fn from(config: &HydraulicConfig) -> Self {
        Self {
            duration_hours: config.duration,
            minimum_pressure: config.minimum_pressure,
            required_pressure: config.required_pressure,
            demand_model: DemandModel::PressureDriven,
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSeries {
    pub demand: Vec<f64>,
    pub pressure: Vec<f64>,
}

/// Per-node demand and pressure time series of one solve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub timestamps_hours: Vec<f64>,
    pub nodes: HashMap<String, NodeSeries>,
}

impl SimulationResult {
    pub fn demand(&self, node_id: &str) -> Option<&[f64]> {
        self.nodes.get(node_id).map(|s| s.demand.as_slice())
    }

    pub fn pressure(&self, node_id: &str) -> Option<&[f64]> {
        self.nodes.get(node_id).map(|s| s.pressure.as_slice())
    }

    pub fn mean_demand(&self, node_id: &str) -> Option<f64> {
        self.demand(node_id).and_then(mean)
    }
}

/// Baseline required demand per node, from the undamaged network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedDemand {
    series: HashMap<String, Vec<f64>>,
}

impl ExpectedDemand {
    pub fn new(series: HashMap<String, Vec<f64>>) -> Self {
        Self { series }
    }

    pub fn series(&self, node_id: &str) -> Option<&[f64]> {
        self.series.get(node_id).map(Vec::as_slice)
    }

    /// Mean required demand; zero when the node has no baseline series.
    pub fn mean(&self, node_id: &str) -> f64 {
        self.series(node_id).and_then(mean).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Adapter trait
// ---------------------------------------------------------------------------

/// External pressure-driven hydraulic solver.
///
/// `solve` is blocking and may be slow; the orchestrator runs it on a
/// bounded blocking pool under a timeout. Implementations must be
/// deterministic for identical network and options.
pub trait HydraulicSolver: Send + Sync {
    fn solve(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<SimulationResult, SolverError>;

    /// Required demand per junction over the simulation horizon.
    fn expected_demand(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<ExpectedDemand, SolverError>;
}

impl<S: HydraulicSolver + ?Sized> HydraulicSolver for std::sync::Arc<S> {
    fn solve(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<SimulationResult, SolverError> {
        (**self).solve(network, options)
    }

    fn expected_demand(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<ExpectedDemand, SolverError> {
        (**self).expected_demand(network, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_demand_mean_defaults_to_zero() {
        let mut series = HashMap::new();
        series.insert("J1".to_string(), vec![1.0, 2.0, 3.0]);
        series.insert("J2".to_string(), Vec::new());
        let expected = ExpectedDemand::new(series);
        assert!((expected.mean("J1") - 2.0).abs() < f64::EPSILON);
        assert_eq!(expected.mean("J2"), 0.0);
        assert_eq!(expected.mean("J3"), 0.0);
    }

    #[test]
    fn test_options_from_config_use_pressure_driven_demand() {
        let config = HydraulicConfig::default();
        let options = HydraulicOptions::from(&config);
        assert_eq!(options.demand_model, DemandModel::PressureDriven);
        assert_eq!(options.duration_hours, config.duration);
    }
}
