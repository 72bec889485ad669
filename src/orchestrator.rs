// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Scenario Orchestration

//! Batch execution of seismic scenarios.
//!
//! Each scenario runs `plan → mutate → solve → reduce` on its own network
//! fork and its own RNG stream, inside a blocking task gated by a semaphore
//! of `max_workers` permits and bounded by the per-scenario timeout. Results
//! are partitioned by scenario and concatenated in index order once every
//! task has returned, so no lock is shared between scenarios.
//!
//! A scenario that fails is excluded from the table and listed in the
//! [`BatchManifest`] with the stage it had reached and the reason.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, instrument, warn};

use crate::config::{EngineConfig, UnknownSitePolicy};
use crate::damage::{scenario_rng, DamageError, ScenarioDamagePlanner};
use crate::error::{EngineError, InputError};
use crate::mutator::{LeakWindow, NetworkMutator};
use crate::network::NetworkSnapshot;
use crate::reducer::ServiceabilityReducer;
use crate::solver::{ExpectedDemand, HydraulicOptions, HydraulicSolver, SolverError};
use crate::types::{Scenario, ScenarioTable, ServiceabilityRecord, ServiceabilityTable};

// ─── Scenario Lifecycle ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ScenarioStage {
    Pending = 0,
    Planned = 1,
    Mutated = 2,
    Solved = 3,
    Reduced = 4,
    Merged = 5,
    Failed = 6,
}

impl ScenarioStage {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Pending,
            1 => Self::Planned,
            2 => Self::Mutated,
            3 => Self::Solved,
            4 => Self::Reduced,
            5 => Self::Merged,
            _ => Self::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Merged | Self::Failed)
    }
}

/// Progress marker shared with the blocking task, readable after a timeout.
#[derive(Debug, Clone)]
struct StageTracker(Arc<AtomicU8>);

impl StageTracker {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ScenarioStage::Pending as u8)))
    }

    fn advance(&self, stage: ScenarioStage) {
        self.0.store(stage as u8, Ordering::Release);
    }

    fn current(&self) -> ScenarioStage {
        ScenarioStage::from_u8(self.0.load(Ordering::Acquire))
    }
}

// ─── Manifest ───────────────────────────────────────────────────────────────

/// Why a scenario is missing from the output table.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionReason {
    #[error("pipe '{pipe}' named more than once")]
    DuplicateDamage { pipe: String },

    #[error("damage injection failed: {detail}")]
    Mutation { detail: String },

    #[error("solver diverged: {detail}")]
    Diverged { detail: String },

    #[error("solver exceeded {timeout_secs}s")]
    TimedOut { timeout_secs: u64 },

    #[error("solver error: {detail}")]
    Solver { detail: String },

    #[error("reduction failed: {detail}")]
    Reduction { detail: String },

    #[error("batch cancelled before the scenario ran")]
    Cancelled,

    #[error("scenario task panicked: {detail}")]
    Panicked { detail: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExcludedScenario {
    pub scenario_index: i64,
    /// Last stage completed before the failure.
    pub reached: ScenarioStage,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchManifest {
    pub scenarios_total: usize,
    pub merged: Vec<i64>,
    pub excluded: Vec<ExcludedScenario>,
    pub elapsed_ms: u128,
}

impl BatchManifest {
    pub fn failed_count(&self) -> usize {
        self.excluded.len()
    }

    pub fn excluded_indices(&self) -> Vec<i64> {
        self.excluded.iter().map(|e| e.scenario_index).collect()
    }

    pub fn exclusion(&self, scenario_index: i64) -> Option<&ExcludedScenario> {
        self.excluded.iter().find(|e| e.scenario_index == scenario_index)
    }
}

/// Result of a batch: the long-format table and the exclusion manifest.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub table: ServiceabilityTable,
    pub manifest: BatchManifest,
}

// ─── Cancellation ───────────────────────────────────────────────────────────

/// Cooperative cancellation for a running batch.
///
/// Scenarios that have not started are recorded as cancelled. Solves already
/// running are allowed to finish and their results are merged. The flag is
/// cleared when a run returns, so the orchestrator can run again afterwards.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn reset(&self) {
        self.tx.send_replace(false);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Resolves once the flag is set. Pends forever if the sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ─── Per-Scenario Pipeline ──────────────────────────────────────────────────

/// Everything a scenario task reads. Shared read-only across tasks.
struct ScenarioContext {
    base: NetworkSnapshot,
    solver: Arc<dyn HydraulicSolver>,
    options: HydraulicOptions,
    mutator: NetworkMutator,
    config: EngineConfig,
}

impl ScenarioContext {
    fn run(
        &self,
        scenario: &Scenario,
        baseline: &ExpectedDemand,
        tracker: &StageTracker,
    ) -> Result<Vec<ServiceabilityRecord>, ExclusionReason> {
        let index = scenario.scenario_index;

        let mut rng = scenario_rng(self.config.seed, index);
        let planner = ScenarioDamagePlanner::new(self.base.network(), &self.config.fragility);
        let outcome = planner.plan(scenario, &mut rng).map_err(|e| match e {
            DamageError::DuplicateDamage(pipe) => ExclusionReason::DuplicateDamage { pipe },
        })?;
        tracker.advance(ScenarioStage::Planned);
        debug!(scenario = index, sampled = outcome.draws.len(), failed = outcome.plan.len(), "damage planned");

        let snapshot = self
            .mutator
            .apply(&self.base, &outcome.plan)
            .map_err(|e| ExclusionReason::Mutation { detail: e.to_string() })?;
        tracker.advance(ScenarioStage::Mutated);

        let result = self
            .solver
            .solve(snapshot.network(), &self.options)
            .map_err(|e| match e {
                SolverError::Diverged(detail) => ExclusionReason::Diverged { detail },
                other => ExclusionReason::Solver { detail: other.to_string() },
            })?;
        tracker.advance(ScenarioStage::Solved);

        let records = ServiceabilityReducer::new(baseline)
            .reduce(index, snapshot.network(), &result)
            .map_err(|e| ExclusionReason::Reduction { detail: e.to_string() })?;
        tracker.advance(ScenarioStage::Reduced);
        debug!(scenario = index, records = records.len(), "scenario reduced");

        Ok(records)
    }
}

// ─── Orchestrator ───────────────────────────────────────────────────────────

pub struct ScenarioOrchestrator {
    ctx: Arc<ScenarioContext>,
    cancel: CancelHandle,
}

impl ScenarioOrchestrator {
    pub fn new(
        base: impl Into<NetworkSnapshot>,
        solver: Arc<dyn HydraulicSolver>,
        config: EngineConfig,
    ) -> Self {
        let options = HydraulicOptions::from(&config.hydraulics);
        let mutator = NetworkMutator::new(LeakWindow::from(&config.hydraulics));
        Self {
            ctx: Arc::new(ScenarioContext {
                base: base.into(),
                solver,
                options,
                mutator,
                config,
            }),
            cancel: CancelHandle::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn base(&self) -> &NetworkSnapshot {
        &self.ctx.base
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Validate config and scenario rows, then group rows into scenarios.
    pub fn prepare(&self, table: &ScenarioTable) -> Result<Vec<Scenario>, InputError> {
        let config = &self.ctx.config;
        config.validate()?;

        for row in &table.rows {
            if !row.pga.is_finite() || !row.pgv.is_finite() {
                return Err(InputError::NonFiniteIntensity {
                    scenario_index: row.scenario_index,
                    site_id: row.site_id.clone(),
                });
            }
            if config.unknown_sites == UnknownSitePolicy::Reject && !self.ctx.base.contains(&row.site_id) {
                return Err(InputError::UnknownSite {
                    scenario_index: row.scenario_index,
                    site_id: row.site_id.clone(),
                });
            }
        }

        Ok(table.scenarios())
    }

    /// Required demand of the undamaged network, the reduction denominator.
    pub fn baseline(&self) -> Result<ExpectedDemand, EngineError> {
        self.ctx
            .solver
            .expected_demand(self.ctx.base.network(), &self.ctx.options)
            .map_err(EngineError::Baseline)
    }

    /// Run one scenario synchronously, without timeout or worker limits.
    pub fn run_scenario(
        &self,
        scenario: &Scenario,
        baseline: &ExpectedDemand,
    ) -> Result<Vec<ServiceabilityRecord>, ExcludedScenario> {
        let tracker = StageTracker::new();
        self.ctx
            .run(scenario, baseline, &tracker)
            .map_err(|reason| ExcludedScenario {
                scenario_index: scenario.scenario_index,
                reached: tracker.current(),
                reason,
            })
    }

    /// Run every scenario in `table` and merge the results.
    ///
    /// Input errors reject the batch before any scenario runs. Per-scenario
    /// failures are recorded in the manifest and never abort the batch.
    #[instrument(skip_all, fields(rows = table.rows.len()))]
    pub async fn run(&self, table: &ScenarioTable) -> Result<BatchOutcome, EngineError> {
        let outcome = self.run_batch(table).await;
        self.cancel.reset();
        outcome
    }

    async fn run_batch(&self, table: &ScenarioTable) -> Result<BatchOutcome, EngineError> {
        let start = Instant::now();
        let scenarios = self.prepare(table)?;
        let config = &self.ctx.config;

        let ctx = Arc::clone(&self.ctx);
        let baseline = tokio::task::spawn_blocking(move || {
            ctx.solver.expected_demand(ctx.base.network(), &ctx.options)
        })
        .await
        .map_err(|e| EngineError::Runtime(e.to_string()))?
        .map_err(EngineError::Baseline)?;
        let baseline = Arc::new(baseline);

        info!(
            scenarios = scenarios.len(),
            workers = config.max_workers,
            seed = config.seed,
            "starting serviceability batch"
        );

        let sem = Arc::new(Semaphore::new(config.max_workers));
        let timeout = config.scenario_timeout();
        let timeout_secs = config.scenario_timeout_secs;
        let total = scenarios.len();

        let mut tasks = Vec::with_capacity(total);
        for scenario in scenarios {
            let index = scenario.scenario_index;
            let ctx = Arc::clone(&self.ctx);
            let baseline = Arc::clone(&baseline);
            let sem = Arc::clone(&sem);
            let mut cancel_rx = self.cancel.subscribe();

            let task = tokio::spawn(async move {
                let tracker = StageTracker::new();
                let excluded = |tracker: &StageTracker, reason| ExcludedScenario {
                    scenario_index: index,
                    reached: tracker.current(),
                    reason,
                };

                if *cancel_rx.borrow() {
                    return Err(excluded(&tracker, ExclusionReason::Cancelled));
                }
                let permit = tokio::select! {
                    permit = sem.acquire_owned() => permit,
                    _ = cancelled(&mut cancel_rx) => {
                        return Err(excluded(&tracker, ExclusionReason::Cancelled));
                    }
                };
                let Ok(permit) = permit else {
                    return Err(excluded(&tracker, ExclusionReason::Cancelled));
                };

                // The permit travels with the blocking job, so an abandoned
                // solve keeps its worker slot until it actually returns.
                let job_tracker = tracker.clone();
                let job = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    ctx.run(&scenario, &baseline, &job_tracker)
                });

                // On timeout the blocking job is abandoned; its result is dropped.
                match tokio::time::timeout(timeout, job).await {
                    Err(_) => Err(excluded(&tracker, ExclusionReason::TimedOut { timeout_secs })),
                    Ok(Err(join_err)) => Err(excluded(
                        &tracker,
                        ExclusionReason::Panicked { detail: join_err.to_string() },
                    )),
                    Ok(Ok(result)) => result.map_err(|reason| excluded(&tracker, reason)),
                }
            });
            tasks.push((index, task));
        }

        let mut partitions = Vec::with_capacity(total);
        let mut manifest = BatchManifest { scenarios_total: total, ..BatchManifest::default() };
        for (index, task) in tasks {
            let outcome = task.await.unwrap_or_else(|e| {
                Err(ExcludedScenario {
                    scenario_index: index,
                    reached: ScenarioStage::Pending,
                    reason: ExclusionReason::Panicked { detail: e.to_string() },
                })
            });
            match outcome {
                Ok(records) => {
                    manifest.merged.push(index);
                    partitions.push((index, records));
                }
                Err(exclusion) => {
                    warn!(
                        scenario = index,
                        reached = ?exclusion.reached,
                        reason = %exclusion.reason,
                        "scenario excluded"
                    );
                    manifest.excluded.push(exclusion);
                }
            }
        }

        let table = ServiceabilityTable::from_partitions(partitions);
        manifest.elapsed_ms = start.elapsed().as_millis();
        info!(
            merged = manifest.merged.len(),
            failed = manifest.failed_count(),
            records = table.len(),
            elapsed_ms = manifest.elapsed_ms as u64,
            "serviceability batch finished"
        );

        Ok(BatchOutcome { table, manifest })
    }

    /// [`run`](Self::run) on a dedicated multi-threaded runtime.
    ///
    /// Returns as soon as the batch is merged. Solves abandoned on timeout
    /// keep running on detached threads and their results are dropped.
    /// Must not be called from inside an async context.
    pub fn run_blocking(&self, table: &ScenarioTable) -> Result<BatchOutcome, EngineError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.ctx.config.max_workers.max(1))
            .enable_all()
            .build()
            .map_err(|e| EngineError::Runtime(e.to_string()))?;
        let outcome = runtime.block_on(self.run(table));
        runtime.shutdown_background();
        outcome
    }
}
