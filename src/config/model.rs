// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::KdeployError;

/// What the engine does with the component tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    Deploy,
    Delete,
    ShowDependencies,
}

/// Process-wide configuration, threaded through construction and into the
/// per-cluster context. No mutable singletons.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: EngineMode,
    /// Default Kubernetes namespace for components that do not resolve one.
    pub namespace: String,
    /// Components whose name matches are excluded (full-string match, subtree
    /// pruned). `None` excludes nothing.
    pub exclude_filter: Option<String>,
    /// Components must match to be included. `None` includes everything.
    pub include_filter: Option<String>,
    /// Synthesize a `<namespace>-ns` Namespace child under each root.
    pub auto_maintain_namespace: bool,
    /// File-name suffix for `show-dependencies` output
    /// (`<root-name>-<dotfile>`).
    pub dotfile: String,
    /// Optional deadline for a task from the moment its work is dispatched.
    /// `None` waits indefinitely.
    pub task_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: EngineMode::Deploy,
            namespace: "default".to_string(),
            exclude_filter: None,
            include_filter: None,
            auto_maintain_namespace: false,
            dotfile: "deps.dot".to_string(),
            task_timeout: None,
        }
    }
}

/// The closed set of supported Kubernetes resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    App,
    Job,
    Deployment,
    StatefulSet,
    Service,
    ConfigMap,
    Secret,
    PersistentVolume,
    Ingress,
    Namespace,
    DaemonSet,
    Role,
    ClusterRole,
    RoleBinding,
    ClusterRoleBinding,
    ServiceAccount,
}

impl Kind {
    pub const ALL: [Kind; 16] = [
        Kind::App,
        Kind::Job,
        Kind::Deployment,
        Kind::StatefulSet,
        Kind::Service,
        Kind::ConfigMap,
        Kind::Secret,
        Kind::PersistentVolume,
        Kind::Ingress,
        Kind::Namespace,
        Kind::DaemonSet,
        Kind::Role,
        Kind::ClusterRole,
        Kind::RoleBinding,
        Kind::ClusterRoleBinding,
        Kind::ServiceAccount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::App => "App",
            Kind::Job => "Job",
            Kind::Deployment => "Deployment",
            Kind::StatefulSet => "StatefulSet",
            Kind::Service => "Service",
            Kind::ConfigMap => "ConfigMap",
            Kind::Secret => "Secret",
            Kind::PersistentVolume => "PersistentVolume",
            Kind::Ingress => "Ingress",
            Kind::Namespace => "Namespace",
            Kind::DaemonSet => "DaemonSet",
            Kind::Role => "Role",
            Kind::ClusterRole => "ClusterRole",
            Kind::RoleBinding => "RoleBinding",
            Kind::ClusterRoleBinding => "ClusterRoleBinding",
            Kind::ServiceAccount => "ServiceAccount",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = KdeployError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| KdeployError::UnknownKind(s.to_string()))
    }
}

/// How a child's tasks order relative to its parent's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentRelation {
    Before,
    After,
    #[default]
    Independent,
}

/// One node of the user's declarative component tree, as read from the
/// definition document (JSON, camelCase keys):
///
/// ```json
/// {
///   "name": "web",
///   "kind": "App",
///   "children": [
///     {
///       "name": "web-dep",
///       "kind": "Deployment",
///       "args": { "image": "nginx", "replicas": "2", "service.enabled": "true" },
///       "parentRelation": "independent"
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComponentDefinition {
    pub name: String,

    /// One of the closed [`Kind`] set; validated after parsing.
    pub kind: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Arguments for this node.
    #[serde(default)]
    pub args: BTreeMap<String, String>,

    /// Arguments inherited by all descendants.
    #[serde(default)]
    pub default_args: BTreeMap<String, String>,

    /// Names of sibling/cousin components this node depends on.
    #[serde(default)]
    pub depends: Vec<String>,

    #[serde(default)]
    pub parent_relation: ParentRelation,

    #[serde(default)]
    pub children: Vec<ComponentDefinition>,
}
