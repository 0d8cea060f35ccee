// src/errors.rs

//! Crate-wide error types.
//!
//! Fatal configuration problems (unknown kinds, dependency cycles, malformed
//! variable expansions) get their own variants so `main` can print a focused
//! diagnostic; everything else flows through `anyhow`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KdeployError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown kind: {0}")]
    UnknownKind(String),

    #[error("Circular dependency: {0}")]
    Cycle(String),

    #[error("Variable expansion failed: {0}")]
    Expansion(String),

    #[error("Argument '{name}' is not a boolean value (1|0|true|false|yes|no): {value}")]
    BadBoolArg { name: String, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, KdeployError>;
