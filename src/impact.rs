// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Population Impact

//! People left without service: `(1 - serviceability) * population_served`.
//!
//! Population per node comes from upstream spatial apportionment. Nodes the
//! apportionment did not cover are treated as serving nobody.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::types::ServiceabilityTable;

/// Population served by each node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PopulationServed {
    by_site: HashMap<String, f64>,
}

impl PopulationServed {
    pub fn new(by_site: HashMap<String, f64>) -> Self {
        Self { by_site }
    }

    pub fn get(&self, site_id: &str) -> f64 {
        self.by_site.get(site_id).copied().unwrap_or(0.0)
    }
}

impl FromIterator<(String, f64)> for PopulationServed {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self { by_site: iter.into_iter().collect() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationImpact {
    pub scenario_index: i64,
    pub site_id: String,
    pub population_served: f64,
    pub population_impacted: f64,
}

/// One impact row per serviceability record, same order.
///
/// Serviceability above 1 yields a negative impact; it is reported as is.
pub fn population_impact(
    table: &ServiceabilityTable,
    population: &PopulationServed,
) -> Vec<PopulationImpact> {
    table
        .iter()
        .map(|record| {
            let served = population.get(&record.site_id);
            PopulationImpact {
                scenario_index: record.scenario_index,
                site_id: record.site_id.clone(),
                population_served: served,
                population_impacted: (1.0 - record.serviceability) * served,
            }
        })
        .collect()
}

/// Total impacted population per scenario, ascending by index.
pub fn impacted_by_scenario(rows: &[PopulationImpact]) -> Vec<(i64, f64)> {
    let mut totals: BTreeMap<i64, f64> = BTreeMap::new();
    for row in rows {
        *totals.entry(row.scenario_index).or_insert(0.0) += row.population_impacted;
    }
    totals.into_iter().collect()
}
