// src/resource/deployment.rs

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::model::{ComponentDefinition, Kind};
use crate::errors::{KdeployError, Result};
use crate::k8s::api::{
    ConfigMapVolumeSource, ContainerPort, KeyToPath, ResourceBody, Volume, VolumeMount,
};
use crate::resource::driver::{
    driver_for, namespaced_url, synthesized_container, CompletionPolicy, ResourceDriver, TaskSpec,
};
use crate::tree::component::{ComponentId, ComponentTree};
use crate::tree::task::PodMonitor;

pub struct DeploymentDriver;

pub static DEPLOYMENT: DeploymentDriver = DeploymentDriver;

impl ResourceDriver for DeploymentDriver {
    fn kind(&self) -> Kind {
        Kind::Deployment
    }

    fn completion(&self) -> CompletionPolicy {
        CompletionPolicy::OnEvents
    }

    fn validate(&self, tree: &ComponentTree, id: ComponentId) -> Result<()> {
        if let Some(v) = tree.get_arg(id, "replicas") {
            v.parse::<u32>().map_err(|_| {
                KdeployError::Config(format!(
                    "{}: replicas is not an unsigned integer: {v}",
                    tree.log_name(id)
                ))
            })?;
        }
        Ok(())
    }

    fn prepare_deploy(&self, tree: &mut ComponentTree, id: ComponentId) -> Result<()> {
        let name = tree.component(id).name.clone();
        let ns = tree.namespace_of(id);
        let selector = tree.selector(id);
        let replicas = tree
            .get_arg(id, "replicas")
            .and_then(|v| v.parse::<u32>().ok());
        let container = synthesized_container(tree, id)?;

        if let ResourceBody::Deployment(body) = &mut tree.component_mut(id).resource {
            if body.metadata.name.is_empty() {
                body.metadata.name = name.clone();
            }
            if body.metadata.namespace_.is_empty() {
                body.metadata.namespace_ = ns;
            }
            body.api_version = "apps/v1".to_string();
            body.kind = "Deployment".to_string();

            body.metadata
                .labels
                .entry(selector.0.clone())
                .or_insert_with(|| selector.1.clone());
            body.spec
                .selector
                .match_labels
                .entry(selector.0.clone())
                .or_insert_with(|| selector.1.clone());

            if body.spec.template_.metadata.name.is_empty() {
                body.spec.template_.metadata.name = name.clone();
            }
            body.spec
                .template_
                .metadata
                .labels
                .entry(selector.0)
                .or_insert(selector.1);

            if let Some(replicas) = replicas {
                body.spec.replicas = replicas;
            }
            if body.spec.replicas == 0 {
                body.spec.replicas = 1;
            }

            if body.spec.template_.spec.containers.is_empty() {
                body.spec.template_.spec.containers.push(container);
            }
        }

        self.build_dependencies(tree, id)
    }

    fn task_spec(&self, tree: &ComponentTree, id: ComponentId) -> Option<TaskSpec> {
        let component = tree.component(id);
        let monitor = match &component.resource {
            ResourceBody::Deployment(body) => Some(PodMonitor::new(
                format!("{}-", component.name),
                body.metadata.namespace_.clone(),
                body.spec.replicas as usize,
            )),
            _ => None,
        };

        Some(TaskSpec {
            name: component.name.clone(),
            monitor,
        })
    }

    fn collection_url(&self, tree: &ComponentTree, id: ComponentId) -> Option<String> {
        let ns = match &tree.component(id).resource {
            ResourceBody::Deployment(body) if !body.metadata.namespace_.is_empty() => {
                body.metadata.namespace_.clone()
            }
            _ => tree.namespace_of(id),
        };
        Some(namespaced_url(
            &tree.ctx.base_url,
            "apis/apps/v1",
            &ns,
            "deployments",
        ))
    }

}

impl DeploymentDriver {
    /// Synthesize the implicit children a deployment usually needs: a Service
    /// (when `service.enabled` is set and no Service child exists) and a
    /// ConfigMap mounted at `/config` (when `config.fromFile` is set).
    fn build_dependencies(&self, tree: &mut ComponentTree, id: ComponentId) -> Result<()> {
        if tree.component(id).labels.is_empty() {
            let name = tree.component(id).name.clone();
            tree.component_mut(id).labels.insert("app".to_string(), name);
        }

        let service_enabled = tree.get_bool_arg(id, "service.enabled")?.unwrap_or(false);
        if service_enabled && !tree.has_kind_as_child(id, Kind::Service) {
            debug!(component = %tree.log_name(id), "adding implicit Service child");

            let name = tree.component(id).name.clone();
            let labels = tree.component(id).labels.clone();

            // The synthesized service only inherits the service-relevant
            // arguments.
            let mut svc_args = BTreeMap::new();
            for key in ["service.nodePort", "service.type"] {
                if let Some(v) = tree.component(id).args.get(key) {
                    svc_args.insert(key.to_string(), v.clone());
                }
            }

            let def = ComponentDefinition {
                name: format!("{name}-svc"),
                kind: Kind::Service.as_str().to_string(),
                labels,
                args: svc_args,
                ..ComponentDefinition::default()
            };
            tree.add_child(id, &def)?;
        }

        if let Some(files) = tree.get_arg(id, "config.fromFile").map(str::to_string) {
            debug!(component = %tree.log_name(id), "adding implicit ConfigMap child");

            let name = tree.component(id).name.clone();
            let def = ComponentDefinition {
                name: format!("{name}-conf"),
                kind: Kind::ConfigMap.as_str().to_string(),
                args: BTreeMap::from([("config.fromFile".to_string(), files)]),
                ..ComponentDefinition::default()
            };
            let cf = tree.add_child(id, &def)?;

            // The volume mapping needs the fully populated ConfigMap.
            driver_for(Kind::ConfigMap).prepare_deploy(tree, cf)?;

            let (cm_name, keys) = match &tree.component(cf).resource {
                ResourceBody::ConfigMap(cm) => (
                    cm.metadata.name.clone(),
                    cm.binary_data.keys().cloned().collect::<Vec<_>>(),
                ),
                _ => (String::new(), Vec::new()),
            };

            if let ResourceBody::Deployment(body) = &mut tree.component_mut(id).resource {
                let volume = Volume {
                    name: cm_name.clone(),
                    config_map: Some(ConfigMapVolumeSource {
                        name: cm_name.clone(),
                        items: keys
                            .into_iter()
                            .map(|k| KeyToPath {
                                key: k.clone(),
                                path: k,
                                mode: Some(0o440),
                            })
                            .collect(),
                    }),
                };
                body.spec.template_.spec.volumes.push(volume);

                let mount = VolumeMount {
                    name: cm_name,
                    mount_path: "/config".to_string(),
                    read_only: true,
                };
                for container in &mut body.spec.template_.spec.containers {
                    container.volume_mounts.push(mount.clone());
                }
            }
        }

        Ok(())
    }
}

/// Container ports exposed by a deployment's pod template, used by the
/// Service driver to derive service ports.
pub fn container_ports(tree: &ComponentTree, id: ComponentId) -> Vec<ContainerPort> {
    match &tree.component(id).resource {
        ResourceBody::Deployment(body) => body
            .spec
            .template_
            .spec
            .containers
            .iter()
            .flat_map(|c| c.ports.iter().cloned())
            .collect(),
        _ => Vec::new(),
    }
}
