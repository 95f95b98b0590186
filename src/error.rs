//! Errors raised while loading configuration for a run.
//!
//! The simulation core itself never fails; everything here happens before the
//! first particle is spawned.

use thiserror::Error;

/// Errors that can occur while reading soil tables or parameter files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Soil '{referenced}' referenced by '{by}' is not defined")]
    UnknownSoil { referenced: String, by: String },
    #[error("Soil '{0}' is defined more than once")]
    DuplicateSoil(String),
    #[error("Soil table is empty")]
    EmptyTable,
    #[error("Water soil '{0}' is not defined")]
    MissingWater(String),
    #[error("Invalid parameter {name}: {value}")]
    InvalidParam { name: &'static str, value: f64 },
}
