// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod k8s;
pub mod logging;
pub mod resource;
pub mod tree;
pub mod vars;

use std::time::Duration;

use tracing::info;

use crate::cli::CliArgs;
use crate::config::model::{EngineConfig, EngineMode};
use crate::engine::Engine;
use crate::errors::Result;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - engine configuration from the CLI
/// - one cluster per `--cluster` argument
/// - the engine run (deploy / delete / show-dependencies)
pub async fn run(args: CliArgs) -> Result<()> {
    let config = engine_config(&args);

    info!(
        mode = ?config.mode,
        clusters = args.clusters.len(),
        definition = %args.definition,
        "kdeploy starting"
    );

    let engine = Engine::new(config, &args.definition, &args.clusters);
    engine.run().await
}

fn engine_config(args: &CliArgs) -> EngineConfig {
    EngineConfig {
        mode: match args.mode {
            cli::Mode::Deploy => EngineMode::Deploy,
            cli::Mode::Delete => EngineMode::Delete,
            cli::Mode::ShowDependencies => EngineMode::ShowDependencies,
        },
        namespace: args.namespace.clone(),
        exclude_filter: args.exclude_filter.clone(),
        include_filter: args.include_filter.clone(),
        auto_maintain_namespace: args.auto_maintain_namespace,
        dotfile: args.dotfile.clone(),
        task_timeout: args.task_timeout.map(Duration::from_secs),
    }
}
