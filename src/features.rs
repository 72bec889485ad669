// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Feature Assembly
//
// Static topology descriptors and baseline pressures per node, joined with
// serviceability, intensity and population impact into one row per
// (scenario, node) for downstream model fitting.

use serde::Serialize;
use std::collections::HashMap;

use crate::impact::PopulationImpact;
use crate::network::{LinkKind, WaterNetwork};
use crate::solver::SimulationResult;
use crate::types::{ScenarioRow, ScenarioTable, ServiceabilityTable};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeFeatures {
    pub site_id: String,
    /// Links whose end node is this node.
    pub incoming_links: usize,
    /// Links whose start node is this node.
    pub outgoing_links: usize,
    /// Mean diameter over all connecting links; pumps and valves count as 0.
    pub mean_connecting_diameter: f64,
    pub total_pipe_length: f64,
    pub max_pressure: Option<f64>,
    pub min_pressure: Option<f64>,
}

/// Features for every node of `network`, in network order.
///
/// `baseline` is a solve of the undamaged network.
pub fn node_features(network: &WaterNetwork, baseline: &SimulationResult) -> Vec<NodeFeatures> {
    network
        .nodes()
        .iter()
        .map(|node| {
            let mut incoming = 0;
            let mut outgoing = 0;
            let mut diameters = Vec::new();
            let mut total_length = 0.0;
            for link in network.links_for_node(&node.id) {
                if link.end_node == node.id {
                    incoming += 1;
                }
                if link.start_node == node.id {
                    outgoing += 1;
                }
                match link.kind {
                    LinkKind::Pipe { length, diameter, .. } => {
                        diameters.push(diameter);
                        total_length += length;
                    }
                    LinkKind::Pump { .. } | LinkKind::Valve { .. } => diameters.push(0.0),
                }
            }
            let mean_connecting_diameter = if diameters.is_empty() {
                0.0
            } else {
                diameters.iter().sum::<f64>() / diameters.len() as f64
            };
            let pressure = baseline.pressure(&node.id).filter(|p| !p.is_empty());

            NodeFeatures {
                site_id: node.id.clone(),
                incoming_links: incoming,
                outgoing_links: outgoing,
                mean_connecting_diameter,
                total_pipe_length: total_length,
                max_pressure: pressure.map(|p| p.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
                min_pressure: pressure.map(|p| p.iter().cloned().fold(f64::INFINITY, f64::min)),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureRow {
    pub scenario_index: i64,
    pub site_id: String,
    pub pga: Option<f64>,
    pub pgv: Option<f64>,
    pub population_served: Option<f64>,
    pub population_impacted: Option<f64>,
    pub serviceability: f64,
    #[serde(flatten)]
    pub node: Option<NodeFeatures>,
}

/// Left-join serviceability records with intensities, impact and node
/// features. Missing counterparts leave the corresponding fields empty.
pub fn assemble_features(
    table: &ServiceabilityTable,
    scenarios: &ScenarioTable,
    impacts: &[PopulationImpact],
    features: &[NodeFeatures],
) -> Vec<FeatureRow> {
    let mut intensity: HashMap<(i64, &str), &ScenarioRow> = HashMap::new();
    for row in &scenarios.rows {
        intensity.entry((row.scenario_index, row.site_id.as_str())).or_insert(row);
    }
    let impact: HashMap<(i64, &str), &PopulationImpact> = impacts
        .iter()
        .map(|i| ((i.scenario_index, i.site_id.as_str()), i))
        .collect();
    let by_node: HashMap<&str, &NodeFeatures> =
        features.iter().map(|f| (f.site_id.as_str(), f)).collect();

    table
        .iter()
        .map(|record| {
            let key = (record.scenario_index, record.site_id.as_str());
            let observed = intensity.get(&key);
            let impacted = impact.get(&key);
            FeatureRow {
                scenario_index: record.scenario_index,
                site_id: record.site_id.clone(),
                pga: observed.map(|r| r.pga),
                pgv: observed.map(|r| r.pgv),
                population_served: impacted.map(|i| i.population_served),
                population_impacted: impacted.map(|i| i.population_impacted),
                serviceability: record.serviceability,
                node: by_node.get(record.site_id.as_str()).map(|f| (*f).clone()),
            }
        })
        .collect()
}
