// src/resource/workload.rs

//! Drivers for the remaining pod-running kinds: StatefulSet, DaemonSet, Job.
//! All of them complete by watching pod creation events, like Deployment.

use crate::config::model::Kind;
use crate::errors::Result;
use crate::k8s::api::ResourceBody;
use crate::resource::driver::{
    namespaced_url, synthesized_container, CompletionPolicy, ResourceDriver, TaskSpec,
};
use crate::tree::component::{ComponentId, ComponentTree};
use crate::tree::task::PodMonitor;

pub struct StatefulSetDriver;
pub struct DaemonSetDriver;
pub struct JobDriver;

pub static STATEFUL_SET: StatefulSetDriver = StatefulSetDriver;
pub static DAEMON_SET: DaemonSetDriver = DaemonSetDriver;
pub static JOB: JobDriver = JobDriver;

fn pod_monitor(tree: &ComponentTree, id: ComponentId, target: usize) -> Option<PodMonitor> {
    let component = tree.component(id);
    let ns = component
        .resource
        .metadata()
        .map(|m| m.namespace_.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| tree.namespace_of(id));

    Some(PodMonitor::new(format!("{}-", component.name), ns, target))
}

impl ResourceDriver for StatefulSetDriver {
    fn kind(&self) -> Kind {
        Kind::StatefulSet
    }

    fn completion(&self) -> CompletionPolicy {
        CompletionPolicy::OnEvents
    }

    fn prepare_deploy(&self, tree: &mut ComponentTree, id: ComponentId) -> Result<()> {
        let name = tree.component(id).name.clone();
        let ns = tree.namespace_of(id);
        let selector = tree.selector(id);
        let replicas = tree
            .get_arg(id, "replicas")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);
        let container = synthesized_container(tree, id)?;

        if let ResourceBody::StatefulSet(body) = &mut tree.component_mut(id).resource {
            if body.metadata.name.is_empty() {
                body.metadata.name = name.clone();
            }
            if body.metadata.namespace_.is_empty() {
                body.metadata.namespace_ = ns;
            }
            body.api_version = "apps/v1".to_string();
            body.kind = "StatefulSet".to_string();

            body.metadata
                .labels
                .entry(selector.0.clone())
                .or_insert_with(|| selector.1.clone());
            body.spec
                .selector
                .match_labels
                .entry(selector.0.clone())
                .or_insert_with(|| selector.1.clone());
            body.spec
                .template_
                .metadata
                .labels
                .entry(selector.0)
                .or_insert(selector.1);

            if body.spec.replicas == 0 {
                body.spec.replicas = replicas;
            }
            if body.spec.service_name.is_empty() {
                body.spec.service_name = format!("{name}-svc");
            }
            if body.spec.template_.spec.containers.is_empty() {
                body.spec.template_.spec.containers.push(container);
            }
        }

        Ok(())
    }

    fn task_spec(&self, tree: &ComponentTree, id: ComponentId) -> Option<TaskSpec> {
        let target = match &tree.component(id).resource {
            ResourceBody::StatefulSet(body) => body.spec.replicas as usize,
            _ => 1,
        };
        Some(TaskSpec {
            name: tree.component(id).name.clone(),
            monitor: pod_monitor(tree, id, target),
        })
    }

    fn collection_url(&self, tree: &ComponentTree, id: ComponentId) -> Option<String> {
        let ns = tree.namespace_of(id);
        Some(namespaced_url(
            &tree.ctx.base_url,
            "apis/apps/v1",
            &ns,
            "statefulsets",
        ))
    }
}

impl ResourceDriver for DaemonSetDriver {
    fn kind(&self) -> Kind {
        Kind::DaemonSet
    }

    fn completion(&self) -> CompletionPolicy {
        CompletionPolicy::OnEvents
    }

    fn prepare_deploy(&self, tree: &mut ComponentTree, id: ComponentId) -> Result<()> {
        let name = tree.component(id).name.clone();
        let ns = tree.namespace_of(id);
        let selector = tree.selector(id);
        let container = synthesized_container(tree, id)?;

        if let ResourceBody::DaemonSet(body) = &mut tree.component_mut(id).resource {
            if body.metadata.name.is_empty() {
                body.metadata.name = name;
            }
            if body.metadata.namespace_.is_empty() {
                body.metadata.namespace_ = ns;
            }
            body.api_version = "apps/v1".to_string();
            body.kind = "DaemonSet".to_string();

            body.metadata
                .labels
                .entry(selector.0.clone())
                .or_insert_with(|| selector.1.clone());
            body.spec
                .selector
                .match_labels
                .entry(selector.0.clone())
                .or_insert_with(|| selector.1.clone());
            body.spec
                .template_
                .metadata
                .labels
                .entry(selector.0)
                .or_insert(selector.1);

            if body.spec.template_.spec.containers.is_empty() {
                body.spec.template_.spec.containers.push(container);
            }
        }

        Ok(())
    }

    fn task_spec(&self, tree: &ComponentTree, id: ComponentId) -> Option<TaskSpec> {
        // Node count is unknown up front; one pod creation is the signal.
        Some(TaskSpec {
            name: tree.component(id).name.clone(),
            monitor: pod_monitor(tree, id, 1),
        })
    }

    fn collection_url(&self, tree: &ComponentTree, id: ComponentId) -> Option<String> {
        let ns = tree.namespace_of(id);
        Some(namespaced_url(
            &tree.ctx.base_url,
            "apis/apps/v1",
            &ns,
            "daemonsets",
        ))
    }
}

impl ResourceDriver for JobDriver {
    fn kind(&self) -> Kind {
        Kind::Job
    }

    fn completion(&self) -> CompletionPolicy {
        CompletionPolicy::OnEvents
    }

    fn prepare_deploy(&self, tree: &mut ComponentTree, id: ComponentId) -> Result<()> {
        let name = tree.component(id).name.clone();
        let ns = tree.namespace_of(id);
        let selector = tree.selector(id);
        let completions = tree
            .get_arg(id, "completions")
            .and_then(|v| v.parse::<u32>().ok());
        let container = synthesized_container(tree, id)?;

        if let ResourceBody::Job(body) = &mut tree.component_mut(id).resource {
            if body.metadata.name.is_empty() {
                body.metadata.name = name.clone();
            }
            if body.metadata.namespace_.is_empty() {
                body.metadata.namespace_ = ns;
            }
            body.api_version = "batch/v1".to_string();
            body.kind = "Job".to_string();

            body.metadata
                .labels
                .entry(selector.0.clone())
                .or_insert_with(|| selector.1.clone());

            if body.spec.template_.metadata.name.is_empty() {
                body.spec.template_.metadata.name = name;
            }
            if let Some(completions) = completions {
                body.spec.completions = Some(completions);
            }
            if body.spec.template_.spec.restart_policy.is_empty() {
                body.spec.template_.spec.restart_policy = "OnFailure".to_string();
            }
            if body.spec.template_.spec.containers.is_empty() {
                body.spec.template_.spec.containers.push(container);
            }
        }

        Ok(())
    }

    fn task_spec(&self, tree: &ComponentTree, id: ComponentId) -> Option<TaskSpec> {
        let target = match &tree.component(id).resource {
            ResourceBody::Job(body) => body.spec.completions.unwrap_or(1) as usize,
            _ => 1,
        };
        Some(TaskSpec {
            name: tree.component(id).name.clone(),
            monitor: pod_monitor(tree, id, target),
        })
    }

    fn collection_url(&self, tree: &ComponentTree, id: ComponentId) -> Option<String> {
        let ns = tree.namespace_of(id);
        Some(namespaced_url(
            &tree.ctx.base_url,
            "apis/batch/v1",
            &ns,
            "jobs",
        ))
    }
}
