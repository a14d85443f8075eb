use std::{io, path::PathBuf};

use thiserror::Error;

/// Anything wrong with the fan curve file or the curve it describes.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read fan curve file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("fan curve file ends before '{0}'")]
    MissingField(&'static str),

    #[error("'{field}' must be an integer, got '{token}'")]
    InvalidNumber { field: &'static str, token: String },

    #[error("invalid '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("invalid fan curve: {0}")]
    InvalidCurve(String),

    #[error("unexpected data after the last curve point: '{0}'")]
    TrailingData(String),
}

/// Failures reported by a hardware backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HwError {
    /// Control handle could not be acquired or set up
    #[error("hardware init failed: {0}")]
    Init(String),

    /// A single query failed, worth retrying next tick
    #[error("sensor read failed: {0}")]
    Sensor(String),

    /// A write to the device failed
    #[error("fan write failed: {0}")]
    Actuation(String),
}

/// The only errors allowed to end the process.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Hardware(#[from] HwError),
}
