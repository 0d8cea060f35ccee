// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - cluster identity and the per-cluster context (`cluster`)
//! - the pure core state machine stepping events into commands (`core`)
//! - the async runtime shell and the multi-cluster `Engine` (`runtime`)

pub mod cluster;
pub mod core;
pub mod runtime;

pub use self::cluster::{Cluster, ClusterContext};
pub use self::core::{ClusterCore, ClusterEvent, ClusterPhase, Command, CoreStep};
pub use self::runtime::{ClusterRuntime, Engine};
