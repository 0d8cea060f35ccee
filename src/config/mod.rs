// src/config/mod.rs

//! Engine configuration and the component definition model.
//!
//! Responsibilities:
//! - Define the JSON-backed definition model and global config (`model.rs`).
//! - Load a definition document from disk, expanding variables (`loader.rs`).
//! - Validate kinds, names and declared dependencies (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{ComponentDefinition, EngineConfig, EngineMode, Kind, ParentRelation};
pub use validate::{validate_definition, ComponentFilters};
