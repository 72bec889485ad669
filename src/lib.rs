// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite

//! Monte Carlo damage sampling and serviceability aggregation for water
//! distribution networks under earthquake scenarios.
//!
//! A batch takes a base network, a table of per-site ground motion and a
//! hydraulic solver. Each scenario samples pipe breaks, inserts them as
//! leaks into a private copy of the network, solves it and reports the
//! ratio of delivered to expected demand per junction.

pub mod config;
pub mod damage;
pub mod error;
pub mod features;
pub mod impact;
pub mod mutator;
pub mod network;
pub mod orchestrator;
pub mod reducer;
pub mod solver;
pub mod summary;
pub mod telemetry;
pub mod types;

pub use config::{EngineConfig, HydraulicConfig, UnknownSitePolicy};
pub use damage::{DamagePlan, FragilityModel, ScenarioDamagePlanner};
pub use error::{EngineError, InputError};
pub use mutator::NetworkMutator;
pub use network::{NetworkSnapshot, WaterNetwork};
pub use orchestrator::{
    BatchManifest, BatchOutcome, CancelHandle, ExcludedScenario, ExclusionReason,
    ScenarioOrchestrator, ScenarioStage,
};
pub use reducer::ServiceabilityReducer;
pub use solver::{
    ExpectedDemand, HydraulicOptions, HydraulicSolver, SimulationResult, SolverError,
};
pub use types::{Scenario, ScenarioRow, ScenarioTable, ServiceabilityRecord, ServiceabilityTable};
