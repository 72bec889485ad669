// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Type Definitions

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ─── Scenario Input ──────────────────────────────────────────────────────────

/// One row of the flat scenario table as produced by the ground-motion stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRow {
    pub scenario_index: i64,
    pub site_id: String,
    #[serde(rename = "PGA")]
    pub pga: f64,
    #[serde(rename = "PGV")]
    pub pgv: f64,
}

/// Ground-motion intensity at one site for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteObservation {
    pub site_id: String,
    pub pga: f64,
    pub pgv: f64,
}

/// One independent Monte Carlo trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_index: i64,
    pub observations: Vec<SiteObservation>,
}

impl Scenario {
    pub fn new(scenario_index: i64) -> Self {
        Self { scenario_index, observations: Vec::new() }
    }

    pub fn with_observation(mut self, site_id: impl Into<String>, pga: f64, pgv: f64) -> Self {
        self.observations.push(SiteObservation { site_id: site_id.into(), pga, pgv });
        self
    }
}

/// Flat scenario table, grouped into [`Scenario`]s on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioTable {
    pub rows: Vec<ScenarioRow>,
}

impl ScenarioTable {
    pub fn new(rows: Vec<ScenarioRow>) -> Self {
        Self { rows }
    }

    pub fn from_scenarios(scenarios: &[Scenario]) -> Self {
        let rows = scenarios
            .iter()
            .flat_map(|s| {
                s.observations.iter().map(move |o| ScenarioRow {
                    scenario_index: s.scenario_index,
                    site_id: o.site_id.clone(),
                    pga: o.pga,
                    pgv: o.pgv,
                })
            })
            .collect();
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Group rows by `scenario_index`, ascending. Row order inside a
    /// scenario follows table order.
    pub fn scenarios(&self) -> Vec<Scenario> {
        let mut grouped: BTreeMap<i64, Scenario> = BTreeMap::new();
        for row in &self.rows {
            grouped
                .entry(row.scenario_index)
                .or_insert_with(|| Scenario::new(row.scenario_index))
                .observations
                .push(SiteObservation {
                    site_id: row.site_id.clone(),
                    pga: row.pga,
                    pgv: row.pgv,
                });
        }
        grouped.into_values().collect()
    }

    /// Look up the observation of a site in a scenario (first match).
    pub fn observation(&self, scenario_index: i64, site_id: &str) -> Option<&ScenarioRow> {
        self.rows
            .iter()
            .find(|r| r.scenario_index == scenario_index && r.site_id == site_id)
    }
}

// ─── Engine Output ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceabilityRecord {
    pub scenario_index: i64,
    pub site_id: String,
    /// Satisfied over required demand. Not clamped; values above 1 are kept.
    pub serviceability: f64,
}

/// Long-format output table, ordered by scenario then base-network node order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceabilityTable {
    records: Vec<ServiceabilityRecord>,
}

impl ServiceabilityTable {
    /// Concatenate per-scenario partitions. Partitions are sorted by
    /// scenario index first so the result does not depend on completion order.
    pub fn from_partitions(mut partitions: Vec<(i64, Vec<ServiceabilityRecord>)>) -> Self {
        partitions.sort_by_key(|(index, _)| *index);
        let records = partitions.into_iter().flat_map(|(_, rows)| rows).collect();
        Self { records }
    }

    pub fn records(&self) -> &[ServiceabilityRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceabilityRecord> {
        self.records.iter()
    }

    pub fn for_scenario(&self, scenario_index: i64) -> impl Iterator<Item = &ServiceabilityRecord> {
        self.records.iter().filter(move |r| r.scenario_index == scenario_index)
    }

    pub fn get(&self, scenario_index: i64, site_id: &str) -> Option<f64> {
        self.records
            .iter()
            .find(|r| r.scenario_index == scenario_index && r.site_id == site_id)
            .map(|r| r.serviceability)
    }

    /// Distinct scenario indices present, ascending.
    pub fn scenario_indices(&self) -> Vec<i64> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.scenario_index))
            .map(|r| r.scenario_index)
            .collect()
    }

    /// Whether every `(scenario_index, site_id)` key appears at most once.
    pub fn keys_are_unique(&self) -> bool {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .all(|r| seen.insert((r.scenario_index, r.site_id.as_str())))
    }
}

impl IntoIterator for ServiceabilityTable {
    type Item = ServiceabilityRecord;
    type IntoIter = std::vec::IntoIter<ServiceabilityRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
