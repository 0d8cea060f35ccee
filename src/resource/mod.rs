// src/resource/mod.rs

//! Per-kind resource drivers.
//!
//! The set of kinds is closed and small, so each kind gets a stateless unit
//! driver implementing [`ResourceDriver`]; the engine dispatches on
//! [`Kind`](crate::config::Kind) through [`driver_for`]. Drivers know how to:
//! - populate the kind's resource body (and inject implicit children)
//! - describe the task the scheduler should run for the component
//! - build the create/delete/probe HTTP requests
//! - interpret probe responses into an [`ObjectState`]

pub mod configmap;
pub mod deployment;
pub mod driver;
pub mod generic;
pub mod namespace;
pub mod service;
pub mod workload;

pub use driver::{
    driver_for, empty_body, CompletionPolicy, ObjectState, ResourceDriver, TaskSpec,
};
