// src/resource/driver.rs

use crate::config::model::Kind;
use crate::errors::Result;
use crate::k8s::api::{self, ResourceBody};
use crate::k8s::client::{HttpMethod, HttpRequest, ProbeResponse};
use crate::tree::component::{ComponentId, ComponentTree, Mode};
use crate::tree::task::PodMonitor;

/// When is a Create-mode task considered complete?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// A 2xx response finishes the task (Service, ConfigMap, RBAC, ...).
    OnResponse,
    /// Cluster events finish the task (workloads counting pod creations).
    OnEvents,
    /// A probe of the live object finishes the task (Namespace,
    /// PersistentVolume).
    OnProbe,
}

/// Result of probing a live Kubernetes object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    Init,
    Ready,
    Done,
    Failed,
    DontExist,
}

/// What task (if any) a component contributes to the root task list.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    pub monitor: Option<PodMonitor>,
}

/// The uniform capability set the engine needs per kind.
///
/// Defaults suit "plain" namespaced resources that complete on the HTTP
/// response; drivers override the pieces their kind does differently.
pub trait ResourceDriver: Send + Sync {
    fn kind(&self) -> Kind;

    fn completion(&self) -> CompletionPolicy {
        CompletionPolicy::OnResponse
    }

    /// Populate the resource body; may synthesize implicit children.
    fn prepare_deploy(&self, _tree: &mut ComponentTree, _id: ComponentId) -> Result<()> {
        Ok(())
    }

    /// Kind-specific input validation, run at tree init.
    fn validate(&self, _tree: &ComponentTree, _id: ComponentId) -> Result<()> {
        Ok(())
    }

    /// One task per concrete resource by default; `None` for kinds with no
    /// remote object (App).
    fn task_spec(&self, tree: &ComponentTree, id: ComponentId) -> Option<TaskSpec> {
        Some(TaskSpec {
            name: tree.component(id).name.clone(),
            monitor: None,
        })
    }

    /// The collection URL this kind's objects POST to; `None` when the kind
    /// has no remote resource.
    fn collection_url(&self, tree: &ComponentTree, id: ComponentId) -> Option<String>;

    /// Name of the remote object (metadata name, falling back to the
    /// component name).
    fn object_name(&self, tree: &ComponentTree, id: ComponentId) -> String {
        tree.component(id)
            .resource
            .metadata()
            .filter(|m| !m.name.is_empty())
            .map(|m| m.name.clone())
            .unwrap_or_else(|| tree.component(id).name.clone())
    }

    fn deploy_request(&self, tree: &ComponentTree, id: ComponentId) -> Option<HttpRequest> {
        let url = self.collection_url(tree, id)?;
        let body = tree.component(id).resource.to_json()?;
        Some(HttpRequest {
            method: HttpMethod::Post,
            url,
            body: Some(body),
        })
    }

    fn remove_request(&self, tree: &ComponentTree, id: ComponentId) -> Option<HttpRequest> {
        let url = self.collection_url(tree, id)?;
        Some(HttpRequest {
            method: HttpMethod::Delete,
            url: format!("{url}/{}", self.object_name(tree, id)),
            body: None,
        })
    }

    /// Probe the live object; `None` when probing is unsupported.
    fn probe_request(&self, tree: &ComponentTree, id: ComponentId) -> Option<HttpRequest> {
        if self.completion() != CompletionPolicy::OnProbe {
            return None;
        }
        let url = self.collection_url(tree, id)?;
        Some(HttpRequest {
            method: HttpMethod::Get,
            url: format!("{url}/{}", self.object_name(tree, id)),
            body: None,
        })
    }

    /// Map a probe response onto an [`ObjectState`]. The default treats any
    /// 2xx as Ready and keeps polling otherwise.
    fn interpret_probe(&self, _mode: Mode, response: &ProbeResponse) -> ObjectState {
        match response.status {
            404 => ObjectState::DontExist,
            s if (200..300).contains(&s) => ObjectState::Ready,
            _ => ObjectState::Init,
        }
    }
}

/// Build a pod container from a component's arguments: `image` (defaulting
/// to the component name), `port`/`protocol`, `pod.args` and `pod.env`.
pub(crate) fn synthesized_container(
    tree: &ComponentTree,
    id: ComponentId,
) -> Result<api::Container> {
    use crate::vars::{parse_env_list, parse_string_list};

    let name = tree.component(id).name.clone();

    let mut container = api::Container {
        name: name.clone(),
        image: tree.get_arg_or(id, "image", &name),
        ..Default::default()
    };

    if let Some(args) = tree.get_arg(id, "pod.args") {
        container.args = parse_string_list(args);
    }

    if let Some(env) = tree.get_arg(id, "pod.env") {
        container.env = parse_env_list(env)
            .into_iter()
            .map(|e| api::EnvEntry {
                name: e.name,
                value: e.value,
            })
            .collect();
    }

    if let Some(port) = tree.get_int_arg(id, "port")? {
        container.ports.push(api::ContainerPort {
            name: "default".to_string(),
            container_port: port as i32,
            host_port: 0,
            protocol: tree.get_arg(id, "protocol").unwrap_or_default().to_string(),
        });
    }

    Ok(container)
}

/// URL of a namespaced collection, e.g.
/// `{base}/apis/apps/v1/namespaces/{ns}/deployments`.
pub fn namespaced_url(base: &str, group_version: &str, ns: &str, plural: &str) -> String {
    format!("{base}/{group_version}/namespaces/{ns}/{plural}")
}

/// URL of a cluster-scoped collection, e.g. `{base}/api/v1/namespaces`.
pub fn cluster_url(base: &str, group_version: &str, plural: &str) -> String {
    format!("{base}/{group_version}/{plural}")
}

/// Initial (empty) resource body for a kind, populated during
/// `prepare_deploy`.
pub fn empty_body(kind: Kind) -> ResourceBody {
    match kind {
        Kind::App => ResourceBody::App,
        Kind::Deployment => ResourceBody::Deployment(Default::default()),
        Kind::StatefulSet => ResourceBody::StatefulSet(Default::default()),
        Kind::DaemonSet => ResourceBody::DaemonSet(Default::default()),
        Kind::Job => ResourceBody::Job(Default::default()),
        Kind::Service => ResourceBody::Service(Default::default()),
        Kind::ConfigMap => ResourceBody::ConfigMap(Default::default()),
        Kind::Secret => ResourceBody::Secret(Default::default()),
        Kind::Namespace => ResourceBody::Namespace(Default::default()),
        Kind::PersistentVolume
        | Kind::Ingress
        | Kind::Role
        | Kind::ClusterRole
        | Kind::RoleBinding
        | Kind::ClusterRoleBinding
        | Kind::ServiceAccount => ResourceBody::Generic(Box::new(api::GenericResource {
            kind: kind.as_str().to_string(),
            ..Default::default()
        })),
    }
}

/// Dispatch a kind to its driver.
pub fn driver_for(kind: Kind) -> &'static dyn ResourceDriver {
    use crate::resource::{configmap, deployment, generic, namespace, service, workload};

    match kind {
        Kind::App => &generic::APP,
        Kind::Deployment => &deployment::DEPLOYMENT,
        Kind::Service => &service::SERVICE,
        Kind::ConfigMap => &configmap::CONFIG_MAP,
        Kind::Secret => &configmap::SECRET,
        Kind::Namespace => &namespace::NAMESPACE,
        Kind::StatefulSet => &workload::STATEFUL_SET,
        Kind::DaemonSet => &workload::DAEMON_SET,
        Kind::Job => &workload::JOB,
        Kind::PersistentVolume => &generic::PERSISTENT_VOLUME,
        Kind::Ingress => &generic::INGRESS,
        Kind::Role => &generic::ROLE,
        Kind::ClusterRole => &generic::CLUSTER_ROLE,
        Kind::RoleBinding => &generic::ROLE_BINDING,
        Kind::ClusterRoleBinding => &generic::CLUSTER_ROLE_BINDING,
        Kind::ServiceAccount => &generic::SERVICE_ACCOUNT,
    }
}
