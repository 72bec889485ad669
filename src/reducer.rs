// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Serviceability Reduction

use crate::network::WaterNetwork;
use crate::solver::{ExpectedDemand, SimulationResult};
use crate::types::ServiceabilityRecord;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReduceError {
    #[error("solver returned no demand series for junction '{0}'")]
    MissingSeries(String),
}

/// Reduces one solved scenario to satisfied/required demand ratios.
pub struct ServiceabilityReducer<'a> {
    baseline: &'a ExpectedDemand,
}

impl<'a> ServiceabilityReducer<'a> {
    /// `baseline` must come from the undamaged network.
    pub fn new(baseline: &'a ExpectedDemand) -> Self {
        Self { baseline }
    }

    /// One record per junction of `network` with non-zero baseline demand.
    ///
    /// Junctions absent from the baseline (inserted leak nodes) count as
    /// zero demand and are skipped. Ratios are not clamped.
    pub fn reduce(
        &self,
        scenario_index: i64,
        network: &WaterNetwork,
        result: &SimulationResult,
    ) -> Result<Vec<ServiceabilityRecord>, ReduceError> {
        let mut records = Vec::new();
        for junction in network.junctions() {
            let required = self.baseline.mean(&junction.id);
            if required == 0.0 {
                continue;
            }
            let satisfied = result
                .mean_demand(&junction.id)
                .ok_or_else(|| ReduceError::MissingSeries(junction.id.clone()))?;
            records.push(ServiceabilityRecord {
                scenario_index,
                site_id: junction.id.clone(),
                serviceability: satisfied / required,
            });
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Link, Node};
    use crate::solver::NodeSeries;
    use std::collections::HashMap;

    fn network() -> WaterNetwork {
        let mut wn = WaterNetwork::new();
        wn.add_node(Node::reservoir("R1", 50.0)).unwrap();
        wn.add_node(Node::junction("J1", 0.01, 0.0)).unwrap();
        wn.add_node(Node::junction("J2", 0.0, 0.0)).unwrap();
        wn.add_node(Node::junction("J3", 0.02, 0.0)).unwrap();
        wn.add_link(Link::pipe("P1", "R1", "J1", 100.0, 0.3)).unwrap();
        wn.add_link(Link::pipe("P2", "J1", "J2", 100.0, 0.3)).unwrap();
        wn.add_link(Link::pipe("P3", "J2", "J3", 100.0, 0.3)).unwrap();
        wn
    }

    fn baseline() -> ExpectedDemand {
        let mut series = HashMap::new();
        series.insert("J1".to_string(), vec![0.01, 0.01]);
        series.insert("J2".to_string(), vec![0.0, 0.0]);
        series.insert("J3".to_string(), vec![0.02, 0.02]);
        ExpectedDemand::new(series)
    }

    fn result(j1: Vec<f64>, j3: Vec<f64>) -> SimulationResult {
        let mut nodes = HashMap::new();
        nodes.insert("J1".to_string(), NodeSeries { demand: j1, pressure: vec![30.0, 30.0] });
        nodes.insert("J2".to_string(), NodeSeries { demand: vec![0.0, 0.0], pressure: vec![30.0, 30.0] });
        nodes.insert("J3".to_string(), NodeSeries { demand: j3, pressure: vec![30.0, 30.0] });
        SimulationResult { timestamps_hours: vec![0.0, 1.0], nodes }
    }

    #[test]
    fn test_zero_demand_nodes_are_skipped() {
        let baseline = baseline();
        let reducer = ServiceabilityReducer::new(&baseline);
        let records = reducer
            .reduce(5, &network(), &result(vec![0.01, 0.005], vec![0.02, 0.02]))
            .unwrap();

        let sites: Vec<&str> = records.iter().map(|r| r.site_id.as_str()).collect();
        assert_eq!(sites, vec!["J1", "J3"]);
        assert!((records[0].serviceability - 0.75).abs() < 1e-12);
        assert!((records[1].serviceability - 1.0).abs() < 1e-12);
        assert!(records.iter().all(|r| r.scenario_index == 5));
    }

    #[test]
    fn test_ratio_above_one_is_kept() {
        let baseline = baseline();
        let reducer = ServiceabilityReducer::new(&baseline);
        let records = reducer
            .reduce(0, &network(), &result(vec![0.02, 0.02], vec![0.02, 0.02]))
            .unwrap();
        assert!((records[0].serviceability - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_leak_nodes_absent_from_baseline_are_skipped() {
        let mut wn = network();
        wn.split_pipe("P1").unwrap();
        let baseline = baseline();
        let reducer = ServiceabilityReducer::new(&baseline);
        let records = reducer
            .reduce(0, &wn, &result(vec![0.01, 0.01], vec![0.02, 0.02]))
            .unwrap();
        assert!(records.iter().all(|r| r.site_id != "Leak_P1"));
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_missing_series_is_an_error() {
        let baseline = baseline();
        let reducer = ServiceabilityReducer::new(&baseline);
        let mut partial = result(vec![0.01], vec![0.02]);
        partial.nodes.remove("J3");
        assert_eq!(
            reducer.reduce(0, &network(), &partial),
            Err(ReduceError::MissingSeries("J3".to_string()))
        );
    }
}
