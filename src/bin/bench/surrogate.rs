// Surrogate pressure-driven solver for benchmarking without an external
// hydraulic engine. Pressures come from source heads less a per-hop loss
// and a drawdown around every active leak that decays with hop distance.

use std::collections::{HashMap, VecDeque};

use quake_serviceability::network::{Leak, NodeKind};
use quake_serviceability::solver::{DemandModel, NodeSeries};
use quake_serviceability::{
    ExpectedDemand, HydraulicOptions, HydraulicSolver, SimulationResult, SolverError, WaterNetwork,
};

// ─── Topology ───────────────────────────────────────────────────────────────

struct Adjacency<'a> {
    neighbours: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> Adjacency<'a> {
    fn new(network: &'a WaterNetwork) -> Self {
        let mut neighbours: HashMap<&str, Vec<&str>> = HashMap::new();
        for link in network.links() {
            neighbours.entry(link.start_node.as_str()).or_default().push(link.end_node.as_str());
            neighbours.entry(link.end_node.as_str()).or_default().push(link.start_node.as_str());
        }
        Self { neighbours }
    }

    /// Hop count from `origin` to every reachable node, links undirected.
    fn hops_from(&self, origin: &'a str) -> HashMap<&'a str, usize> {
        let mut dist = HashMap::new();
        let mut queue = VecDeque::new();
        dist.insert(origin, 0);
        queue.push_back(origin);
        while let Some(node) = queue.pop_front() {
            let d = dist[node];
            for &next in self.neighbours.get(node).into_iter().flatten() {
                if !dist.contains_key(next) {
                    dist.insert(next, d + 1);
                    queue.push_back(next);
                }
            }
        }
        dist
    }
}

// ─── Solver ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SurrogateSolver {
    /// Head lost per link traversed, metres.
    pub headloss_per_hop: f64,
    /// Drawdown at the leak node per square metre of orifice, metres.
    pub leak_drawdown: f64,
}

impl Default for SurrogateSolver {
    fn default() -> Self {
        Self { headloss_per_hop: 1.5, leak_drawdown: 4000.0 }
    }
}

fn timestamps(options: &HydraulicOptions) -> Vec<f64> {
    (0..=options.duration_hours.max(0)).map(|h| h as f64).collect()
}

/// Wagner pressure-demand relation.
fn supply_fraction(pressure: f64, options: &HydraulicOptions) -> f64 {
    match options.demand_model {
        DemandModel::DemandDriven => 1.0,
        DemandModel::PressureDriven => {
            if pressure <= options.minimum_pressure {
                0.0
            } else if pressure >= options.required_pressure {
                1.0
            } else {
                ((pressure - options.minimum_pressure)
                    / (options.required_pressure - options.minimum_pressure))
                    .sqrt()
            }
        }
    }
}

impl HydraulicSolver for SurrogateSolver {
    fn solve(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<SimulationResult, SolverError> {
        let graph = Adjacency::new(network);

        let sources: Vec<(&str, f64)> = network
            .nodes()
            .iter()
            .filter_map(|n| match n.kind {
                NodeKind::Reservoir { head } => Some((n.id.as_str(), head)),
                NodeKind::Tank { elevation, init_level } => Some((n.id.as_str(), elevation + init_level)),
                NodeKind::Junction { .. } => None,
            })
            .collect();
        if sources.is_empty() {
            return Err(SolverError::InvalidNetwork("no reservoir or tank".into()));
        }

        let mut static_head: HashMap<&str, f64> = HashMap::new();
        for &(id, head) in &sources {
            for (node, hops) in graph.hops_from(id) {
                let h = head - self.headloss_per_hop * hops as f64;
                static_head.entry(node).and_modify(|v| *v = v.max(h)).or_insert(h);
            }
        }

        let leaks: Vec<(&Leak, HashMap<&str, usize>)> = network
            .nodes()
            .iter()
            .filter_map(|n| n.leak().map(|leak| (leak, graph.hops_from(&n.id))))
            .collect();

        let times = timestamps(options);
        let mut nodes = HashMap::new();
        for junction in network.junctions() {
            let id = junction.id.as_str();
            let mut demand = Vec::with_capacity(times.len());
            let mut pressure = Vec::with_capacity(times.len());
            for &t in &times {
                // Nodes cut off from every source get no pressure.
                let p = match static_head.get(id) {
                    Some(head) => {
                        let drawdown: f64 = leaks
                            .iter()
                            .filter(|(leak, _)| leak.is_active_at(t))
                            .filter_map(|(leak, hops)| {
                                hops.get(id).map(|h| self.leak_drawdown * leak.area / (1 + h) as f64)
                            })
                            .sum();
                        head - junction.elevation() - drawdown
                    }
                    None => 0.0,
                };
                if !p.is_finite() {
                    return Err(SolverError::Diverged(format!("non-finite pressure at '{id}', hour {t}")));
                }
                pressure.push(p);
                demand.push(junction.base_demand() * supply_fraction(p, options));
            }
            nodes.insert(junction.id.clone(), NodeSeries { demand, pressure });
        }

        Ok(SimulationResult { timestamps_hours: times, nodes })
    }

    fn expected_demand(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<ExpectedDemand, SolverError> {
        let steps = timestamps(options).len();
        let series = network
            .junctions()
            .map(|j| (j.id.clone(), vec![j.base_demand(); steps]))
            .collect();
        Ok(ExpectedDemand::new(series))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quake_serviceability::network::{Link, Node};
    use quake_serviceability::HydraulicConfig;

    fn options() -> HydraulicOptions {
        HydraulicOptions::from(&HydraulicConfig::default())
    }

    fn line() -> WaterNetwork {
        let mut wn = WaterNetwork::new();
        wn.add_node(Node::reservoir("R1", 60.0)).unwrap();
        wn.add_node(Node::junction("J1", 0.01, 0.0)).unwrap();
        wn.add_node(Node::junction("J2", 0.01, 0.0)).unwrap();
        wn.add_link(Link::pipe("P1", "R1", "J1", 1000.0, 0.3)).unwrap();
        wn.add_link(Link::pipe("P2", "J1", "J2", 1000.0, 0.3)).unwrap();
        wn
    }

    #[test]
    fn test_intact_network_fully_served() {
        let wn = line();
        let result = SurrogateSolver::default().solve(&wn, &options()).unwrap();
        assert_eq!(result.timestamps_hours.len(), 25);
        assert!((result.mean_demand("J2").unwrap() - 0.01).abs() < 1e-12);
        assert!((result.pressure("J1").unwrap()[0] - 58.5).abs() < 1e-12);
    }

    #[test]
    fn test_leak_reduces_supply_nearby() {
        let mut wn = line();
        let node = wn.split_pipe("P2").unwrap();
        wn.add_leak(&node, 0.02, 0, 24).unwrap();
        let result = SurrogateSolver::default().solve(&wn, &options()).unwrap();
        let j2 = result.mean_demand("J2").unwrap();
        assert!(j2 < 0.01, "J2 = {j2}");
    }

    #[test]
    fn test_no_source_is_invalid() {
        let mut wn = WaterNetwork::new();
        wn.add_node(Node::junction("J1", 0.01, 0.0)).unwrap();
        let err = SurrogateSolver::default().solve(&wn, &options()).unwrap_err();
        assert!(matches!(err, SolverError::InvalidNetwork(_)));
    }

    #[test]
    fn test_supply_fraction_curve() {
        let opts = options();
        assert_eq!(supply_fraction(-1.0, &opts), 0.0);
        assert_eq!(supply_fraction(30.0, &opts), 1.0);
        assert!((supply_fraction(5.0, &opts) - 0.5).abs() < 1e-12);
    }
}
