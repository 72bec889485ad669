// Synthetic grid networks and ground-motion tables for the bench runner.
// Every input is derived from the seed, so runs are reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

use quake_serviceability::network::{Link, Node, NetworkError};
use quake_serviceability::{ScenarioRow, ScenarioTable, WaterNetwork};

// ─── Intensity Levels ───────────────────────────────────────────────────────

pub struct IntensityLevel {
    pub name: &'static str,
    pub label: &'static str,
    /// Median PGV at the epicentre, cm/s.
    pub median_pgv: f64,
}

pub fn levels() -> Vec<IntensityLevel> {
    vec![
        IntensityLevel { name: "QUIET", label: "No shaking (control)", median_pgv: 0.0 },
        IntensityLevel { name: "MODERATE", label: "Moderate, ~M5.5", median_pgv: 15.0 },
        IntensityLevel { name: "STRONG", label: "Strong, ~M6.5", median_pgv: 60.0 },
        IntensityLevel { name: "SEVERE", label: "Severe, ~M7.2", median_pgv: 150.0 },
    ]
}

// ─── Network ────────────────────────────────────────────────────────────────

const PIPE_LENGTH_FT: f64 = 1000.0;
const PIPE_DIAMETER_M: f64 = 0.3;

/// Grid cell coordinates of every junction and pipe midpoint.
pub type Layout = HashMap<String, (f64, f64)>;

/// `size` x `size` junction grid fed by one reservoir at the corner.
pub fn grid_network(size: usize) -> Result<(WaterNetwork, Layout), NetworkError> {
    let mut wn = WaterNetwork::new();
    let mut layout = Layout::new();
    let junction = |r: usize, c: usize| format!("J{r}_{c}");

    wn.add_node(Node::reservoir("R1", 60.0))?;
    for r in 0..size {
        for c in 0..size {
            // Gentle slope away from the reservoir with mixed residential load.
            let elevation = (r + c) as f64 * 0.5;
            let demand = if (r * size + c) % 4 == 0 { 0.0 } else { 0.004 + 0.001 * ((r + c) % 3) as f64 };
            wn.add_node(Node::junction(junction(r, c), demand, elevation))?;
            layout.insert(junction(r, c), (r as f64, c as f64));
        }
    }

    wn.add_link(Link::pipe("P_main", "R1", junction(0, 0), PIPE_LENGTH_FT, 0.6))?;
    layout.insert("P_main".into(), (-0.5, 0.0));
    for r in 0..size {
        for c in 0..size {
            if c + 1 < size {
                let id = format!("PH{r}_{c}");
                wn.add_link(Link::pipe(&id, junction(r, c), junction(r, c + 1), PIPE_LENGTH_FT, PIPE_DIAMETER_M))?;
                layout.insert(id, (r as f64, c as f64 + 0.5));
            }
            if r + 1 < size {
                let id = format!("PV{r}_{c}");
                wn.add_link(Link::pipe(&id, junction(r, c), junction(r + 1, c), PIPE_LENGTH_FT, PIPE_DIAMETER_M))?;
                layout.insert(id, (r as f64 + 0.5, c as f64));
            }
        }
    }
    Ok((wn, layout))
}

// ─── Ground Motion ──────────────────────────────────────────────────────────

/// One row per laid-out site per scenario. Each scenario draws an epicentre
/// inside the grid and an event factor; PGV decays with distance from it.
pub fn synthetic_scenarios(
    layout: &Layout,
    level: &IntensityLevel,
    count: usize,
    seed: u64,
) -> ScenarioTable {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let extent = layout.values().map(|&(r, c)| r.max(c)).fold(0.0_f64, f64::max);

    let mut sites: Vec<(&String, &(f64, f64))> = layout.iter().collect();
    sites.sort_by(|a, b| a.0.cmp(b.0));

    let mut rows = Vec::with_capacity(count * sites.len());
    for index in 0..count {
        let epicentre = (rng.gen_range(0.0..=extent), rng.gen_range(0.0..=extent));
        let factor: f64 = rng.gen_range(0.3..1.7);
        for (site, &(r, c)) in &sites {
            let distance = ((r - epicentre.0).powi(2) + (c - epicentre.1).powi(2)).sqrt();
            let pgv = level.median_pgv * factor / (1.0 + 0.15 * distance);
            rows.push(ScenarioRow {
                scenario_index: index as i64,
                site_id: (*site).clone(),
                pga: pgv / 100.0 * 0.9,
                pgv,
            });
        }
    }
    ScenarioTable::new(rows)
}
