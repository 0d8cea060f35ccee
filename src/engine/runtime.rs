// src/engine/runtime.rs

use std::path::PathBuf;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::model::{EngineConfig, EngineMode};
use crate::config::validate::ComponentFilters;
use crate::engine::cluster::{Cluster, ClusterContext};
use crate::engine::core::{ClusterCore, ClusterEvent, Command, CoreStep};
use crate::errors::Result;
use crate::k8s::client::{spawn_event_watch, K8sClient};
use crate::k8s::proxy::start_proxy;
use crate::resource::driver_for;
use crate::tree::component::ComponentTree;
use crate::tree::dot;

/// The async shell around one cluster's [`ClusterCore`].
///
/// All state mutation happens on this loop: events arrive serialized on one
/// mpsc channel, each is stepped through the core, and the resulting commands
/// are dispatched to background tasks that report back onto the same channel.
/// That gives the single-threaded cooperative model the state machines
/// assume, without any locks.
pub struct ClusterRuntime {
    core: ClusterCore,
    client: K8sClient,
    events_rx: mpsc::Receiver<ClusterEvent>,
    events_tx: mpsc::Sender<ClusterEvent>,
}

impl ClusterRuntime {
    pub fn new(core: ClusterCore, client: K8sClient) -> Self {
        let (events_tx, events_rx) = mpsc::channel::<ClusterEvent>(64);
        Self {
            core,
            client,
            events_rx,
            events_tx,
        }
    }

    /// Channel into this runtime, for the event watch and tests.
    pub fn sender(&self) -> mpsc::Sender<ClusterEvent> {
        self.events_tx.clone()
    }

    /// Drive the cluster to a terminal state. Returns whether the root
    /// finished successfully.
    pub async fn run(mut self) -> Result<bool> {
        let step = self.core.start();
        if let Some(ok) = self.finish(step) {
            return Ok(ok);
        }

        while let Some(event) = self.events_rx.recv().await {
            let step = self.core.step(event);
            if let Some(ok) = self.finish(step) {
                return Ok(ok);
            }
        }

        Err(anyhow!("cluster event channel closed before the root settled").into())
    }

    fn finish(&self, step: CoreStep) -> Option<bool> {
        self.dispatch(step.commands);
        step.finished
    }

    /// Execute the core's commands in background tasks; results come back as
    /// events on this runtime's channel.
    fn dispatch(&self, commands: Vec<Command>) {
        for command in commands {
            let tx = self.events_tx.clone();
            match command {
                Command::Http { task, request } => {
                    let client = self.client.clone();
                    tokio::spawn(async move {
                        let outcome = client.perform(&request).await;
                        let _ = tx.send(ClusterEvent::HttpDone { task, outcome }).await;
                    });
                }
                Command::Poll { task, delay } => {
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(ClusterEvent::PollFired { task }).await;
                    });
                }
                Command::Probe {
                    task,
                    kind,
                    mode,
                    request,
                } => {
                    let client = self.client.clone();
                    tokio::spawn(async move {
                        let state = match client.probe(&request).await {
                            Ok(response) => driver_for(kind).interpret_probe(mode, &response),
                            Err(err) => {
                                warn!(error = %err, "probe request failed; will retry");
                                crate::resource::ObjectState::Init
                            }
                        };
                        let _ = tx.send(ClusterEvent::ProbeDone { task, state }).await;
                    });
                }
                Command::Timeout { task, after } => {
                    tokio::spawn(async move {
                        tokio::time::sleep(after).await;
                        let _ = tx.send(ClusterEvent::TimeoutFired { task }).await;
                    });
                }
            }
        }
    }
}

/// The engine: global configuration plus the clusters to operate, in
/// parallel. Each cluster runs on its own task; the engine joins their
/// terminal futures and fails if any cluster failed.
pub struct Engine {
    config: EngineConfig,
    definition: PathBuf,
    clusters: Vec<Cluster>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        definition: impl Into<PathBuf>,
        cluster_args: &[String],
    ) -> Self {
        let clusters = cluster_args
            .iter()
            .map(|arg| Cluster::from_arg(arg))
            .collect();

        Self {
            config,
            definition: definition.into(),
            clusters,
        }
    }

    pub async fn run(self) -> Result<()> {
        let filters = ComponentFilters::from_config(&self.config)?;

        let mut handles = Vec::new();
        for cluster in self.clusters {
            let config = self.config.clone();
            let filters = filters.clone();
            let definition = self.definition.clone();
            let name = cluster.name.clone();

            handles.push((
                name,
                tokio::spawn(run_cluster(config, filters, cluster, definition)),
            ));
        }

        let mut failed = false;
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => info!(cluster = %name, "cluster finished"),
                Ok(Err(err)) => {
                    error!(cluster = %name, error = %err, "cluster failed");
                    failed = true;
                }
                Err(err) => {
                    error!(cluster = %name, error = %err, "cluster task panicked");
                    failed = true;
                }
            }
        }

        if failed {
            return Err(anyhow!("one or more clusters failed").into());
        }
        Ok(())
    }
}

async fn run_cluster(
    config: EngineConfig,
    filters: ComponentFilters,
    cluster: Cluster,
    definition: PathBuf,
) -> Result<()> {
    let def = crate::config::load_and_validate(&definition, &cluster.variables)?;

    match config.mode {
        EngineMode::ShowDependencies => {
            let ctx = ClusterContext::new(&cluster, config, String::new());
            let Some(mut tree) = ComponentTree::build(&def, ctx, &filters)? else {
                warn!(cluster = %cluster.name, "root component filtered out; nothing to do");
                return Ok(());
            };
            tree.prepare()?;
            dot::write_dot(&tree, ".")?;
            Ok(())
        }
        EngineMode::Deploy | EngineMode::Delete => {
            let proxy = start_proxy(&cluster.kubeconfig).await?;
            let ctx = ClusterContext::new(&cluster, config, proxy.base_url());

            let Some(mut tree) = ComponentTree::build(&def, ctx, &filters)? else {
                warn!(cluster = %cluster.name, "root component filtered out; nothing to do");
                return Ok(());
            };
            tree.prepare()?;

            let client = K8sClient::new()?;
            let runtime = ClusterRuntime::new(ClusterCore::new(tree), client.clone());

            spawn_event_watch(client, proxy.base_url(), runtime.sender());

            let ok = runtime.run().await?;

            // The proxy must outlive the run.
            drop(proxy);

            if ok {
                Ok(())
            } else {
                Err(anyhow!("cluster '{}' finished with failures", cluster.name).into())
            }
        }
    }
}
