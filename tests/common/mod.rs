// Shared fixtures for integration tests: a small network and deterministic
// stand-in solvers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use quake_serviceability::network::{Link, Node};
use quake_serviceability::solver::NodeSeries;
use quake_serviceability::{
    EngineConfig, ExpectedDemand, HydraulicOptions, HydraulicSolver, Scenario, ScenarioTable,
    SimulationResult, SolverError, WaterNetwork,
};

/// R1 feeds J1, J2 and a zero-demand J3. P2 is long and wide so extreme
/// shaking always breaks it. V1 is a valve between J1 and J3.
pub fn network() -> WaterNetwork {
    let mut wn = WaterNetwork::new();
    wn.add_node(Node::reservoir("R1", 60.0)).unwrap();
    wn.add_node(Node::junction("J1", 0.01, 2.0)).unwrap();
    wn.add_node(Node::junction("J2", 0.02, 4.0)).unwrap();
    wn.add_node(Node::junction("J3", 0.0, 3.0)).unwrap();
    wn.add_link(Link::pipe("P1", "R1", "J1", 1000.0, 0.3)).unwrap();
    wn.add_link(Link::pipe("P2", "J1", "J2", 100_000.0, 0.5)).unwrap();
    wn.add_link(Link::pipe("P3", "J2", "J3", 1000.0, 0.3)).unwrap();
    wn.add_link(Link::valve("V1", "J1", "J3", 30.0)).unwrap();
    wn
}

pub fn config(workers: usize) -> EngineConfig {
    EngineConfig { seed: 17, max_workers: workers, ..EngineConfig::default() }
}

/// Shaking strong enough that P1 and P3 usually fail, often without a
/// measurable orifice.
pub fn mixed_table(count: i64) -> ScenarioTable {
    let scenarios: Vec<Scenario> = (0..count)
        .map(|i| {
            let pgv = 1000.0 + 200.0 * (i % 10) as f64;
            Scenario::new(i)
                .with_observation("P1", 0.5, pgv)
                .with_observation("P3", 0.5, pgv)
                .with_observation("J1", 0.5, pgv)
        })
        .collect();
    ScenarioTable::from_scenarios(&scenarios)
}

pub fn quiet_scenario(index: i64) -> Scenario {
    Scenario::new(index)
        .with_observation("P1", 0.0, 0.0)
        .with_observation("P2", 0.0, 0.0)
        .with_observation("P3", 0.0, 0.0)
}

/// P2 fails with certainty.
pub fn violent_scenario(index: i64) -> Scenario {
    Scenario::new(index).with_observation("P2", 5.0, 1.0e6)
}

fn steps(options: &HydraulicOptions) -> Vec<f64> {
    (0..=options.duration_hours.max(0)).map(|h| h as f64).collect()
}

/// Every junction loses a share of its demand proportional to the total
/// leak area open at each step. Intact networks deliver exactly the base
/// demand.
#[derive(Debug, Clone)]
pub struct LeakAreaSolver {
    pub sensitivity: f64,
}

impl Default for LeakAreaSolver {
    fn default() -> Self {
        Self { sensitivity: 2.0 }
    }
}

impl HydraulicSolver for LeakAreaSolver {
    fn solve(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<SimulationResult, SolverError> {
        let times = steps(options);
        let open_area: Vec<f64> = times
            .iter()
            .map(|&t| {
                network
                    .nodes()
                    .iter()
                    .filter_map(|n| n.leak())
                    .filter(|leak| leak.is_active_at(t))
                    .map(|leak| leak.area)
                    .sum::<f64>()
            })
            .collect();

        let mut nodes = HashMap::new();
        for junction in network.junctions() {
            let base = junction.base_demand();
            let demand = open_area
                .iter()
                .map(|area| base * (1.0 - self.sensitivity * area).max(0.0))
                .collect();
            nodes.insert(
                junction.id.clone(),
                NodeSeries { demand, pressure: vec![30.0; times.len()] },
            );
        }
        Ok(SimulationResult { timestamps_hours: times, nodes })
    }

    fn expected_demand(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<ExpectedDemand, SolverError> {
        let n = steps(options).len();
        Ok(ExpectedDemand::new(
            network.junctions().map(|j| (j.id.clone(), vec![j.base_demand(); n])).collect(),
        ))
    }
}

/// Diverges whenever the network carries a leak.
#[derive(Debug, Clone, Default)]
pub struct FragileSolver {
    inner: LeakAreaSolver,
}

impl HydraulicSolver for FragileSolver {
    fn solve(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<SimulationResult, SolverError> {
        if network.leak_count() > 0 {
            return Err(SolverError::Diverged("unbalanced heads after 200 trials".into()));
        }
        self.inner.solve(network, options)
    }

    fn expected_demand(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<ExpectedDemand, SolverError> {
        self.inner.expected_demand(network, options)
    }
}

/// Sleeps before every damaged solve.
#[derive(Debug, Clone)]
pub struct SlowSolver {
    pub delay: Duration,
    inner: LeakAreaSolver,
}

impl SlowSolver {
    pub fn new(delay: Duration) -> Self {
        Self { delay, inner: LeakAreaSolver::default() }
    }
}

impl HydraulicSolver for SlowSolver {
    fn solve(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<SimulationResult, SolverError> {
        if network.leak_count() > 0 {
            std::thread::sleep(self.delay);
        }
        self.inner.solve(network, options)
    }

    fn expected_demand(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<ExpectedDemand, SolverError> {
        self.inner.expected_demand(network, options)
    }
}

/// Slow on damaged networks and records the peak number of solves running
/// at once.
#[derive(Debug)]
pub struct CountingSolver {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    inner: LeakAreaSolver,
}

impl CountingSolver {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            inner: LeakAreaSolver::default(),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl HydraulicSolver for CountingSolver {
    fn solve(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<SimulationResult, SolverError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if network.leak_count() > 0 {
            std::thread::sleep(self.delay);
        }
        let result = self.inner.solve(network, options);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn expected_demand(
        &self,
        network: &WaterNetwork,
        options: &HydraulicOptions,
    ) -> Result<ExpectedDemand, SolverError> {
        self.inner.expected_demand(network, options)
    }
}
