// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Batch Errors

use crate::config::ConfigError;
use crate::solver::SolverError;

/// Problems with the batch inputs. Raised before any scenario runs.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("scenario {scenario_index} references unknown site '{site_id}'")]
    UnknownSite { scenario_index: i64, site_id: String },

    #[error("scenario {scenario_index} has a non-finite intensity at site '{site_id}'")]
    NonFiniteIntensity { scenario_index: i64, site_id: String },
}

/// Errors that abort a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("baseline expected demand unavailable: {0}")]
    Baseline(#[source] SolverError),

    #[error("runtime failure: {0}")]
    Runtime(String),
}
