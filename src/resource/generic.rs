// src/resource/generic.rs

//! The App pseudo-kind and the pass-through kinds (RBAC, Ingress,
//! ServiceAccount, PersistentVolume) that share one generic driver.

use anyhow::Context;

use crate::config::model::Kind;
use crate::errors::{KdeployError, Result};
use crate::k8s::api::ResourceBody;
use crate::resource::driver::{
    cluster_url, namespaced_url, CompletionPolicy, ResourceDriver, TaskSpec,
};
use crate::tree::component::{ComponentId, ComponentTree, Mode};

/// `App` groups children and carries arguments; it has no remote resource
/// and contributes no tasks.
pub struct AppDriver;

pub static APP: AppDriver = AppDriver;

impl ResourceDriver for AppDriver {
    fn kind(&self) -> Kind {
        Kind::App
    }

    fn task_spec(&self, _tree: &ComponentTree, _id: ComponentId) -> Option<TaskSpec> {
        None
    }

    fn collection_url(&self, _tree: &ComponentTree, _id: ComponentId) -> Option<String> {
        None
    }
}

/// Shared driver for kinds we POST as-is: metadata plus whatever the
/// definition supplies via `spec.fromFile`.
pub struct GenericDriver {
    kind: Kind,
    group_version: &'static str,
    plural: &'static str,
    namespaced: bool,
    completion: CompletionPolicy,
}

pub static PERSISTENT_VOLUME: GenericDriver = GenericDriver {
    kind: Kind::PersistentVolume,
    group_version: "api/v1",
    plural: "persistentvolumes",
    namespaced: false,
    completion: CompletionPolicy::OnProbe,
};

pub static INGRESS: GenericDriver = GenericDriver {
    kind: Kind::Ingress,
    group_version: "apis/networking.k8s.io/v1",
    plural: "ingresses",
    namespaced: true,
    completion: CompletionPolicy::OnResponse,
};

pub static ROLE: GenericDriver = GenericDriver {
    kind: Kind::Role,
    group_version: "apis/rbac.authorization.k8s.io/v1",
    plural: "roles",
    namespaced: true,
    completion: CompletionPolicy::OnResponse,
};

pub static CLUSTER_ROLE: GenericDriver = GenericDriver {
    kind: Kind::ClusterRole,
    group_version: "apis/rbac.authorization.k8s.io/v1",
    plural: "clusterroles",
    namespaced: false,
    completion: CompletionPolicy::OnResponse,
};

pub static ROLE_BINDING: GenericDriver = GenericDriver {
    kind: Kind::RoleBinding,
    group_version: "apis/rbac.authorization.k8s.io/v1",
    plural: "rolebindings",
    namespaced: true,
    completion: CompletionPolicy::OnResponse,
};

pub static CLUSTER_ROLE_BINDING: GenericDriver = GenericDriver {
    kind: Kind::ClusterRoleBinding,
    group_version: "apis/rbac.authorization.k8s.io/v1",
    plural: "clusterrolebindings",
    namespaced: false,
    completion: CompletionPolicy::OnResponse,
};

pub static SERVICE_ACCOUNT: GenericDriver = GenericDriver {
    kind: Kind::ServiceAccount,
    group_version: "api/v1",
    plural: "serviceaccounts",
    namespaced: true,
    completion: CompletionPolicy::OnResponse,
};

impl GenericDriver {
    /// `api/v1` → `v1`, `apis/rbac.authorization.k8s.io/v1` →
    /// `rbac.authorization.k8s.io/v1`.
    fn api_version(&self) -> &'static str {
        self.group_version
            .strip_prefix("apis/")
            .or_else(|| self.group_version.strip_prefix("api/"))
            .unwrap_or(self.group_version)
    }
}

impl ResourceDriver for GenericDriver {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn completion(&self) -> CompletionPolicy {
        self.completion
    }

    fn prepare_deploy(&self, tree: &mut ComponentTree, id: ComponentId) -> Result<()> {
        let name = tree.component(id).name.clone();
        let ns = if self.namespaced {
            tree.namespace_of(id)
        } else {
            String::new()
        };
        let api_version = self.api_version().to_string();
        let kind = self.kind.as_str().to_string();

        // Body fields beyond metadata (rules, subjects, spec, ...) come from
        // an optional side file.
        let extra = match tree.get_arg(id, "spec.fromFile") {
            Some(file) if tree.mode() == Mode::Create => {
                let contents = std::fs::read_to_string(file)
                    .with_context(|| format!("reading spec file {file:?}"))?;
                let value: serde_json::Value = serde_json::from_str(&contents)
                    .with_context(|| format!("parsing spec file {file:?}"))?;
                match value {
                    serde_json::Value::Object(map) => map,
                    _ => {
                        return Err(KdeployError::Config(format!(
                            "{}: spec.fromFile must contain a JSON object",
                            tree.log_name(id)
                        )))
                    }
                }
            }
            _ => serde_json::Map::new(),
        };

        if let ResourceBody::Generic(body) = &mut tree.component_mut(id).resource {
            if body.metadata.name.is_empty() {
                body.metadata.name = name;
            }
            if self.namespaced && body.metadata.namespace_.is_empty() {
                body.metadata.namespace_ = ns;
            }
            body.api_version = api_version;
            body.kind = kind;

            if body.extra.is_empty() {
                body.extra = extra;
            }
        }

        Ok(())
    }

    fn collection_url(&self, tree: &ComponentTree, id: ComponentId) -> Option<String> {
        if self.namespaced {
            let ns = tree.namespace_of(id);
            Some(namespaced_url(
                &tree.ctx.base_url,
                self.group_version,
                &ns,
                self.plural,
            ))
        } else {
            Some(cluster_url(
                &tree.ctx.base_url,
                self.group_version,
                self.plural,
            ))
        }
    }
}
