// src/config/loader.rs

use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::config::model::ComponentDefinition;
use crate::config::validate::validate_definition;
use crate::errors::Result;
use crate::vars::{expand_variables, Variables};

/// Read a definition document and parse it without variable expansion.
///
/// This only performs JSON deserialization; it does **not** run semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ComponentDefinition> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading definition file at {:?}", path))?;

    let def: ComponentDefinition = serde_json::from_str(&contents)
        .with_context(|| format!("parsing JSON definition from {:?}", path))?;

    Ok(def)
}

/// Load a definition document for one cluster: read the file, expand
/// `${NAME}` / `${NAME,DEFAULT}` references against the cluster's variables
/// and the process environment, parse, and validate.
///
/// Expansion runs over the raw text before parsing, so variables can appear
/// anywhere in the document, including inside keys.
pub fn load_and_validate(path: impl AsRef<Path>, vars: &Variables) -> Result<ComponentDefinition> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading definition file at {:?}", path))?;

    let expanded = expand_variables(&contents, vars)?;

    let def: ComponentDefinition = serde_json::from_str(&expanded)
        .with_context(|| format!("parsing JSON definition from {:?}", path))?;

    validate_definition(&def)?;
    Ok(def)
}
