// Serviceability Benchmark Runner
// Monte Carlo damage batches over a synthetic grid (or supplied inputs),
// solved with the surrogate pressure-driven solver.
//
// Usage:
//   cargo run --release --bin bench                          # All intensity levels, 30 scenarios each
//   cargo run --release --bin bench -- --scenarios 5         # Quick mode
//   cargo run --release --bin bench -- STRONG                # Filter by level name
//   cargo run --release --bin bench -- --seed 42 --workers 4 # Custom seed and pool size
//   cargo run --release --bin bench -- --network net.json --scenario-table rows.json

mod grid;
mod surrogate;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, Level};

use quake_serviceability::features::{assemble_features, node_features};
use quake_serviceability::impact::{impacted_by_scenario, population_impact, PopulationServed};
use quake_serviceability::summary::{BatchReport, Stats};
use quake_serviceability::telemetry::init_tracing;
use quake_serviceability::{
    EngineConfig, HydraulicOptions, HydraulicSolver, ScenarioOrchestrator, ScenarioTable,
    WaterNetwork,
};

use grid::{grid_network, levels, synthetic_scenarios};
use surrogate::SurrogateSolver;

// ─── CLI ────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "bench", about = "Seismic serviceability Monte Carlo benchmark")]
struct Cli {
    /// Only run intensity levels whose name or label contains this text.
    filter: Option<String>,

    /// Scenarios per intensity level.
    #[arg(long, default_value_t = 30)]
    scenarios: usize,

    /// Junctions per side of the synthetic grid.
    #[arg(long, default_value_t = 6)]
    grid: usize,

    /// Base seed for ground motion and damage sampling.
    #[arg(long)]
    seed: Option<u64>,

    /// Concurrent solves. Defaults to the config value.
    #[arg(long)]
    workers: Option<usize>,

    /// Engine configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Network JSON; replaces the synthetic grid.
    #[arg(long, requires = "scenario_table")]
    network: Option<PathBuf>,

    /// Scenario table JSON, used with --network.
    #[arg(long = "scenario-table", requires = "network")]
    scenario_table: Option<PathBuf>,

    /// Population served per node JSON, used with --network.
    #[arg(long)]
    population: Option<PathBuf>,

    /// Also write the per-record feature table.
    #[arg(long)]
    features: bool,

    /// Output directory for JSON reports.
    #[arg(long, default_value = "benchmark-results")]
    out: PathBuf,

    /// Emit JSON log lines.
    #[arg(long, env = "QUAKE_LOG_JSON")]
    json_logs: bool,
}

struct Batch {
    name: String,
    label: String,
    network: WaterNetwork,
    table: ScenarioTable,
    population: PopulationServed,
}

// ─── Inputs ─────────────────────────────────────────────────────────────────

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(workers) = cli.workers {
        config.max_workers = workers;
    }
    config.validate().context("invalid engine configuration")?;
    Ok(config)
}

fn supplied_batch(cli: &Cli, network: &Path, table: &Path) -> Result<Batch> {
    let wn = WaterNetwork::from_json_file(network)
        .with_context(|| format!("loading network {}", network.display()))?;
    let raw = std::fs::read_to_string(table)
        .with_context(|| format!("reading scenario table {}", table.display()))?;
    let table: ScenarioTable = serde_json::from_str(&raw)
        .with_context(|| format!("parsing scenario table {}", table.display()))?;
    let population = match &cli.population {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading population {}", path.display()))?;
            serde_json::from_str(&raw).context("parsing population")?
        }
        None => PopulationServed::default(),
    };
    Ok(Batch {
        name: "CUSTOM".into(),
        label: network.display().to_string(),
        network: wn,
        table,
        population,
    })
}

fn synthetic_batches(cli: &Cli, seed: u64) -> Result<Vec<Batch>> {
    let (network, layout) = grid_network(cli.grid).context("building grid network")?;
    // Roughly 100 000 residents per m3/s of average demand.
    let population: PopulationServed = network
        .junctions()
        .map(|j| (j.id.clone(), (j.base_demand() * 100_000.0).round()))
        .collect();

    let filter = cli.filter.as_ref().map(|f| f.to_lowercase());
    let batches: Vec<Batch> = levels()
        .into_iter()
        .filter(|level| match &filter {
            Some(f) => level.name.to_lowercase().contains(f) || level.label.to_lowercase().contains(f),
            None => true,
        })
        .map(|level| Batch {
            name: level.name.to_string(),
            label: level.label.to_string(),
            network: network.clone(),
            table: synthetic_scenarios(&layout, &level, cli.scenarios, seed),
            population: population.clone(),
        })
        .collect();

    if batches.is_empty() {
        bail!("no intensity level matches filter {:?}", cli.filter);
    }
    Ok(batches)
}

// ─── Main ───────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs, Level::WARN);

    let config = load_config(&cli)?;
    let batches = match (&cli.network, &cli.scenario_table) {
        (Some(network), Some(table)) => vec![supplied_batch(&cli, network, table)?],
        _ => synthetic_batches(&cli, config.seed)?,
    };

    let solver = Arc::new(SurrogateSolver::default());
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        .to_string();
    std::fs::create_dir_all(&cli.out)
        .with_context(|| format!("creating {}", cli.out.display()))?;

    println!("\n  Serviceability Benchmark Runner v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "  PRNG: ChaCha8Rng | Seed: {} | Workers: {} | Timeout: {}s",
        config.seed, config.max_workers, config.scenario_timeout_secs
    );
    println!("  Running {} batch(es)...\n", batches.len());
    println!(
        "  {:<10} {:>6} {:>6} {:>8} {:>16} {:>9} {:>12} {:>8}",
        "Level", "Scen", "Failed", "Records", "Serviceability", "Degraded", "Impacted", "Time"
    );
    println!("  {}", "-".repeat(84));

    for batch in batches {
        let orchestrator = ScenarioOrchestrator::new(batch.network.clone(), solver.clone(), config.clone());
        let outcome = orchestrator
            .run(&batch.table)
            .await
            .with_context(|| format!("batch {} ({})", batch.name, batch.label))?;

        let report = BatchReport::new(&outcome, &config, timestamp.clone());
        let impacts = population_impact(&outcome.table, &batch.population);
        let totals: Vec<f64> = impacted_by_scenario(&impacts).into_iter().map(|(_, t)| t).collect();
        let impacted = Stats::from_samples(&totals);
        let degraded = outcome.table.iter().filter(|r| r.serviceability < 1.0).count();
        let degraded_pct = if outcome.table.is_empty() {
            0.0
        } else {
            degraded as f64 / outcome.table.len() as f64 * 100.0
        };
        let s = &report.network_serviceability;

        println!(
            "  {:<10} {:>6} {:>6} {:>8} {:>9.4}±{:<6.4} {:>8.1}% {:>12.0} {:>6}ms",
            batch.name,
            report.scenarios_total,
            report.scenarios_failed,
            report.records,
            s.mean,
            (s.ci_upper - s.ci_lower) / 2.0,
            degraded_pct,
            impacted.mean,
            report.elapsed_ms,
        );

        let path = cli.out.join(format!("bench-{}-{}.json", timestamp, batch.name.to_lowercase()));
        report
            .write_json(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "report written");

        if cli.features {
            let options = HydraulicOptions::from(&config.hydraulics);
            let baseline = solver
                .solve(&batch.network, &options)
                .context("baseline solve for node features")?;
            let rows = assemble_features(
                &outcome.table,
                &batch.table,
                &impacts,
                &node_features(&batch.network, &baseline),
            );
            let path = cli.out.join(format!("features-{}-{}.json", timestamp, batch.name.to_lowercase()));
            std::fs::write(&path, serde_json::to_string_pretty(&rows)?)
                .with_context(|| format!("writing {}", path.display()))?;
        }
    }

    println!("  {}", "-".repeat(84));
    println!("  Results saved to: {}\n", cli.out.display());
    Ok(())
}
