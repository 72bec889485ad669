// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Monte Carlo Summary
//
// Per-site statistics across scenarios and the serializable batch report.

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::config::EngineConfig;
use crate::orchestrator::{BatchOutcome, ExcludedScenario};
use crate::types::ServiceabilityTable;

// ─── Statistics ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let stderr = std_dev / (n as f64).sqrt();
        let z = 1.96; // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - z * stderr,
            ci_upper: mean + z * stderr,
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }
}

// ─── Per-Site Summary ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub site_id: String,
    pub serviceability: Stats,
    /// Scenarios in which the site delivered less than its baseline demand.
    pub degraded_scenarios: usize,
}

/// Serviceability statistics per site, in order of first appearance.
pub fn summarize_sites(table: &ServiceabilityTable) -> Vec<SiteSummary> {
    let mut order: Vec<&str> = Vec::new();
    let mut samples: HashMap<&str, Vec<f64>> = HashMap::new();
    for record in table.iter() {
        let entry = samples.entry(record.site_id.as_str()).or_insert_with(|| {
            order.push(record.site_id.as_str());
            Vec::new()
        });
        entry.push(record.serviceability);
    }

    order
        .into_iter()
        .map(|site| {
            let values = &samples[site];
            SiteSummary {
                site_id: site.to_string(),
                serviceability: Stats::from_samples(values),
                degraded_scenarios: values.iter().filter(|&&v| v < 1.0).count(),
            }
        })
        .collect()
}

// ─── Batch Report ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub seed: u64,
    pub scenarios_total: usize,
    pub scenarios_merged: usize,
    pub scenarios_failed: usize,
    pub records: usize,
    pub elapsed_ms: u128,
    pub network_serviceability: Stats,
    pub excluded: Vec<ExcludedScenario>,
    pub sites: Vec<SiteSummary>,
}

impl BatchReport {
    pub fn new(outcome: &BatchOutcome, config: &EngineConfig, timestamp: impl Into<String>) -> Self {
        let all: Vec<f64> = outcome.table.iter().map(|r| r.serviceability).collect();
        Self {
            timestamp: timestamp.into(),
            version: env!("CARGO_PKG_VERSION"),
            prng: "ChaCha8Rng",
            seed: config.seed,
            scenarios_total: outcome.manifest.scenarios_total,
            scenarios_merged: outcome.manifest.merged.len(),
            scenarios_failed: outcome.manifest.failed_count(),
            records: outcome.table.len(),
            elapsed_ms: outcome.manifest.elapsed_ms,
            network_serviceability: Stats::from_samples(&all),
            excluded: outcome.manifest.excluded.clone(),
            sites: summarize_sites(&outcome.table),
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceabilityRecord;

    #[test]
    fn test_stats_basic() {
        let stats = Stats::from_samples(&[1.0, 0.5, 0.0, 0.5]);
        assert_eq!(stats.n, 4);
        assert!((stats.mean - 0.5).abs() < 1e-12);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 1.0);
        assert!(stats.ci_lower < stats.mean && stats.mean < stats.ci_upper);
    }

    #[test]
    fn test_stats_empty_and_single() {
        assert_eq!(Stats::from_samples(&[]).n, 0);
        let single = Stats::from_samples(&[0.8]);
        assert_eq!(single.std_dev, 0.0);
        assert_eq!(single.ci_lower, single.ci_upper);
    }

    #[test]
    fn test_site_summary_order_and_degradation() {
        let rec = |i: i64, s: &str, v: f64| ServiceabilityRecord {
            scenario_index: i,
            site_id: s.to_string(),
            serviceability: v,
        };
        let table = ServiceabilityTable::from_partitions(vec![
            (0, vec![rec(0, "J2", 1.0), rec(0, "J1", 0.4)]),
            (1, vec![rec(1, "J2", 0.9), rec(1, "J1", 1.2)]),
        ]);
        let sites = summarize_sites(&table);
        assert_eq!(sites[0].site_id, "J2");
        assert_eq!(sites[0].degraded_scenarios, 1);
        assert_eq!(sites[1].serviceability.n, 2);
        assert!((sites[1].serviceability.mean - 0.8).abs() < 1e-12);
    }
}
