// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Pipe Damage Sampling
//
// Empirical pipeline fragility: repair rate from PGV, Poisson damage count,
// leak/break split, orifice area, and an independent Bernoulli failure draw.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::network::{PipeAttributes, WaterNetwork};
use crate::types::Scenario;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const FEET_TO_METERS: f64 = 0.3048;

/// Above this mean, Poisson draws use the normal approximation.
const POISSON_DIRECT_LIMIT: f64 = 30.0;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DamageError {
    #[error("pipe '{0}' appears more than once in the damage plan")]
    DuplicateDamage(String),
}

// ---------------------------------------------------------------------------
// Randomness
// ---------------------------------------------------------------------------

/// Independent RNG stream for one scenario.
///
/// Every scenario shares the global seed but draws from its own ChaCha
/// stream, so results do not depend on execution order or parallelism.
pub fn scenario_rng(global_seed: u64, scenario_index: i64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(global_seed);
    rng.set_stream(scenario_index as u64);
    rng
}

/// Poisson sampling via Knuth's algorithm.
/// For λ < 30, uses the direct method. For larger λ, a normal approximation.
pub fn poisson_sample<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> u32 {
    if !lambda.is_finite() || lambda <= 0.0 {
        return 0;
    }
    if lambda < POISSON_DIRECT_LIMIT {
        let l = (-lambda).exp();
        let mut k: u32 = 0;
        let mut p: f64 = 1.0;
        loop {
            k += 1;
            p *= rng.gen::<f64>();
            if p <= l {
                return k - 1;
            }
        }
    } else {
        // Box-Muller; 1 - u keeps the log argument in (0, 1]
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        let result = lambda + lambda.sqrt() * z;
        result.round().clamp(0.0, u32::MAX as f64) as u32
    }
}

// ---------------------------------------------------------------------------
// Fragility model
// ---------------------------------------------------------------------------

/// Outcome of sampling one pipe in one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageDraw {
    pub pipe_id: String,
    pub scenario_index: i64,
    pub repair_rate: f64,
    pub num_damages: u32,
    pub leak_count: u32,
    pub break_count: u32,
    pub orifice_area: f64,
    pub failure_probability: f64,
    pub failed: bool,
}

/// Coefficients of the repair-rate fragility curve and the damage split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragilityModel {
    /// Repairs per metre per unit PGV, before the /100 scaling.
    pub repair_rate_coefficient: f64,
    pub leak_fraction: f64,
    pub break_fraction: f64,
    /// Orifice area per leak, as a fraction of the full bore.
    pub leak_area_ratio: f64,
    /// Orifice area per break, as a fraction of the full bore.
    pub break_area_ratio: f64,
}

impl Default for FragilityModel {
    fn default() -> Self {
        Self {
            repair_rate_coefficient: 0.000241,
            leak_fraction: 0.85,
            break_fraction: 0.15,
            leak_area_ratio: 0.03,
            break_area_ratio: 0.2,
        }
    }
}

impl FragilityModel {
    /// Repairs per metre. Zero for non-positive or non-finite PGV.
    pub fn repair_rate(&self, pgv: f64) -> f64 {
        if !pgv.is_finite() || pgv <= 0.0 {
            return 0.0;
        }
        self.repair_rate_coefficient * pgv / 100.0
    }

    /// Expected number of damages along the pipe.
    pub fn expected_damages(&self, pipe: &PipeAttributes, pgv: f64) -> f64 {
        let length_m = pipe.length.max(0.0) * FEET_TO_METERS;
        self.repair_rate(pgv) * length_m
    }

    pub fn failure_probability(&self, pipe: &PipeAttributes, pgv: f64) -> f64 {
        1.0 - (-self.expected_damages(pipe, pgv)).exp()
    }

    /// Sample damage for one pipe.
    ///
    /// The damage count and the failure decision are separate draws from the
    /// same rate, so `failed` can be true while `orifice_area` is zero.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        pipe: &PipeAttributes,
        scenario_index: i64,
        pgv: f64,
        rng: &mut R,
    ) -> DamageDraw {
        let lambda = self.expected_damages(pipe, pgv);
        let num_damages = poisson_sample(rng, lambda);
        let pf = self.failure_probability(pipe, pgv);
        let failed = rng.gen::<f64>() < pf;

        let mut draw = self.draw_from_count(pipe, scenario_index, pgv, num_damages);
        draw.failed = failed;
        draw
    }

    /// Deterministic part of [`sample`](Self::sample) for a given damage
    /// count. `failed` is left false.
    pub fn draw_from_count(
        &self,
        pipe: &PipeAttributes,
        scenario_index: i64,
        pgv: f64,
        num_damages: u32,
    ) -> DamageDraw {
        let leak_count = (self.leak_fraction * num_damages as f64).floor() as u32;
        let break_count = (self.break_fraction * num_damages as f64).floor() as u32;
        let area = pipe.cross_section_area().max(0.0);
        let orifice_area = ((self.leak_area_ratio * leak_count as f64
            + self.break_area_ratio * break_count as f64)
            * area)
            .min(area);

        DamageDraw {
            pipe_id: pipe.pipe_id.clone(),
            scenario_index,
            repair_rate: self.repair_rate(pgv),
            num_damages,
            leak_count,
            break_count,
            orifice_area,
            failure_probability: self.failure_probability(pipe, pgv),
            failed: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Damage plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedLeak {
    pub pipe_id: String,
    pub orifice_area: f64,
}

/// Failed pipes of one scenario and their orifice areas, in draw order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DamagePlan {
    entries: Vec<PlannedLeak>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl DamagePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pipe_id: impl Into<String>, orifice_area: f64) -> Result<(), DamageError> {
        let pipe_id = pipe_id.into();
        if !self.seen.insert(pipe_id.clone()) {
            return Err(DamageError::DuplicateDamage(pipe_id));
        }
        self.entries.push(PlannedLeak { pipe_id, orifice_area });
        Ok(())
    }

    pub fn entries(&self) -> &[PlannedLeak] {
        &self.entries
    }

    pub fn orifice_area(&self, pipe_id: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.pipe_id == pipe_id)
            .map(|e| e.orifice_area)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Plan plus every draw made while building it.
#[derive(Debug, Clone)]
pub struct PlanningOutcome {
    pub plan: DamagePlan,
    pub draws: Vec<DamageDraw>,
}

/// Samples every pipe named in one scenario against the base network.
pub struct ScenarioDamagePlanner<'a> {
    network: &'a WaterNetwork,
    model: &'a FragilityModel,
}

impl<'a> ScenarioDamagePlanner<'a> {
    pub fn new(network: &'a WaterNetwork, model: &'a FragilityModel) -> Self {
        Self { network, model }
    }

    /// Build the damage plan for `scenario`.
    ///
    /// Observations naming junctions, pumps, valves or ids absent from the
    /// network are skipped. A pipe named twice is a `DuplicateDamage` error
    /// even when neither draw fails: rows are checked before sampling, which
    /// is stricter than [`DamagePlan::insert`] and keeps the outcome
    /// independent of the draws. The plan-level check never trips from here.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        scenario: &Scenario,
        rng: &mut R,
    ) -> Result<PlanningOutcome, DamageError> {
        let mut sampled = HashSet::new();
        let mut plan = DamagePlan::new();
        let mut draws = Vec::new();

        for obs in &scenario.observations {
            let Some(pipe) = self.network.pipe(&obs.site_id) else {
                continue;
            };
            if !sampled.insert(obs.site_id.as_str()) {
                return Err(DamageError::DuplicateDamage(obs.site_id.clone()));
            }
            let draw = self.model.sample(&pipe, scenario.scenario_index, obs.pgv, rng);
            if draw.failed {
                plan.insert(draw.pipe_id.clone(), draw.orifice_area)?;
            }
            draws.push(draw);
        }

        Ok(PlanningOutcome { plan, draws })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Link, Node};

    fn pipe(length: f64, diameter: f64) -> PipeAttributes {
        PipeAttributes { pipe_id: "P1".to_string(), length, diameter }
    }

    #[test]
    fn test_worked_example() {
        let model = FragilityModel::default();
        let p1 = pipe(1000.0, 0.5);

        assert!((model.repair_rate(100.0) - 0.000241).abs() < 1e-15);
        let lambda = model.expected_damages(&p1, 100.0);
        assert!((lambda - 0.0734568).abs() < 1e-6);
        let pf = model.failure_probability(&p1, 100.0);
        assert!((pf - 0.0708).abs() < 1e-4, "pf = {pf}");

        let draw = model.draw_from_count(&p1, 0, 100.0, 3);
        assert_eq!(draw.leak_count, 2);
        assert_eq!(draw.break_count, 0);
        assert!((draw.orifice_area - 0.011781).abs() < 1e-6, "area = {}", draw.orifice_area);
    }

    #[test]
    fn test_orifice_area_capped_at_bore() {
        let model = FragilityModel::default();
        let p = pipe(10.0, 0.3);
        let bore = p.cross_section_area();
        for n in [0u32, 1, 2, 7, 20, 100, 10_000] {
            let draw = model.draw_from_count(&p, 0, 50.0, n);
            assert!(draw.orifice_area >= 0.0);
            assert!(draw.orifice_area <= bore + 1e-15, "n={n} area={}", draw.orifice_area);
        }
        assert!((model.draw_from_count(&p, 0, 50.0, 100).orifice_area - bore).abs() < 1e-15);
    }

    #[test]
    fn test_zero_pgv_never_fails() {
        let model = FragilityModel::default();
        let p = pipe(50_000.0, 1.0);
        let mut rng = scenario_rng(7, 0);
        for _ in 0..1000 {
            let draw = model.sample(&p, 0, 0.0, &mut rng);
            assert_eq!(draw.failure_probability, 0.0);
            assert!(!draw.failed);
            assert_eq!(draw.num_damages, 0);
        }
    }

    #[test]
    fn test_sampling_is_reproducible_per_stream() {
        let model = FragilityModel::default();
        let p = pipe(20_000.0, 0.4);
        let run = |index: i64| {
            let mut rng = scenario_rng(42, index);
            (0..50).map(|_| model.sample(&p, index, 80.0, &mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(run(3), run(3));
        assert_ne!(
            run(3).iter().map(|d| d.num_damages).collect::<Vec<_>>(),
            run(4).iter().map(|d| d.num_damages).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_poisson_mean() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for lambda in [0.5, 10.0, 75.0] {
            let n = 10_000;
            let sum: u64 = (0..n).map(|_| poisson_sample(&mut rng, lambda) as u64).sum();
            let mean = sum as f64 / n as f64;
            assert!(
                (mean - lambda).abs() < 0.05 * lambda + 0.05,
                "Poisson mean {} far from λ={}",
                mean,
                lambda
            );
        }
    }

    #[test]
    fn test_plan_rejects_duplicate_entries() {
        let mut plan = DamagePlan::new();
        plan.insert("P1", 0.1).unwrap();
        assert_eq!(
            plan.insert("P1", 0.2),
            Err(DamageError::DuplicateDamage("P1".to_string()))
        );
        assert_eq!(plan.len(), 1);
    }

    fn planner_network() -> WaterNetwork {
        let mut wn = WaterNetwork::new();
        wn.add_node(Node::reservoir("R1", 100.0)).unwrap();
        wn.add_node(Node::junction("J1", 0.01, 0.0)).unwrap();
        wn.add_node(Node::junction("J2", 0.01, 0.0)).unwrap();
        wn.add_link(Link::pipe("P1", "R1", "J1", 100_000.0, 0.5)).unwrap();
        wn.add_link(Link::pipe("P2", "J1", "J2", 100_000.0, 0.5)).unwrap();
        wn.add_link(Link::pump("PU1", "R1", "J2", 10.0)).unwrap();
        wn
    }

    #[test]
    fn test_planner_skips_non_pipes() {
        let wn = planner_network();
        let model = FragilityModel::default();
        let planner = ScenarioDamagePlanner::new(&wn, &model);
        let scenario = Scenario::new(1)
            .with_observation("J1", 0.5, 1.0e6)
            .with_observation("PU1", 0.5, 1.0e6)
            .with_observation("ghost", 0.5, 1.0e6)
            .with_observation("P1", 0.5, 1.0e6);

        let outcome = planner.plan(&scenario, &mut scenario_rng(1, 1)).unwrap();
        assert_eq!(outcome.draws.len(), 1);
        assert_eq!(outcome.draws[0].pipe_id, "P1");
        // λ is in the tens of thousands: failure is certain
        assert!(outcome.plan.orifice_area("P1").is_some());
    }

    #[test]
    fn test_planner_duplicate_pipe_rows() {
        let wn = planner_network();
        let model = FragilityModel::default();
        let planner = ScenarioDamagePlanner::new(&wn, &model);
        let scenario = Scenario::new(1)
            .with_observation("P2", 0.1, 0.0)
            .with_observation("P2", 0.1, 0.0);
        let err = planner.plan(&scenario, &mut scenario_rng(1, 1)).unwrap_err();
        assert_eq!(err, DamageError::DuplicateDamage("P2".to_string()));
    }
}
