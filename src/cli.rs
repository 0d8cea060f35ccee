// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `kdeploy`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "kdeploy",
    version,
    about = "Deploy, monitor and tear down trees of Kubernetes workloads.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the component definition (JSON).
    #[arg(short, long, value_name = "PATH", default_value = "kdeploy.json")]
    pub definition: String,

    /// Target cluster: `<kubeconfig>[:<k1=v1,k2=v2,...>]`. Repeat for
    /// multiple clusters.
    #[arg(short = 'k', long = "cluster", value_name = "SPEC", required = true)]
    pub clusters: Vec<String>,

    /// What to do with the tree.
    #[arg(short, long, value_enum, default_value = "deploy")]
    pub mode: Mode,

    /// Default Kubernetes namespace.
    #[arg(short, long, value_name = "NS", default_value = "default")]
    pub namespace: String,

    /// Only components matching this pattern are processed (whole-name
    /// match; subtrees of filtered nodes are pruned).
    #[arg(long, value_name = "REGEX")]
    pub include_filter: Option<String>,

    /// Components matching this pattern are skipped.
    #[arg(long, value_name = "REGEX")]
    pub exclude_filter: Option<String>,

    /// Maintain a `<namespace>-ns` Namespace component under each root.
    #[arg(long)]
    pub auto_maintain_namespace: bool,

    /// File-name suffix for `show-dependencies` output
    /// (`<root-name>-<dotfile>`).
    #[arg(long, value_name = "NAME", default_value = "deps.dot")]
    pub dotfile: String,

    /// Deadline in seconds for a task once its work is dispatched. Without
    /// this, tasks wait for events indefinitely.
    #[arg(long, value_name = "SECS")]
    pub task_timeout: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `KDEPLOY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Engine mode as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Create the tree's resources and monitor them to completion.
    Deploy,
    /// Tear the tree's resources down in reverse dependency order.
    Delete,
    /// Write the dependency graphs as GraphViz DOT files; no cluster access.
    ShowDependencies,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
