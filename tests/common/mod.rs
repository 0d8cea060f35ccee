#![allow(dead_code)]

use std::collections::BTreeMap;

use kdeploy::config::model::{ComponentDefinition, EngineConfig, EngineMode};
use kdeploy::config::validate::ComponentFilters;
use kdeploy::engine::ClusterContext;
use kdeploy::k8s::api::Metadata;
use kdeploy::k8s::event::{ObjectReference, WatchedEvent};
use kdeploy::tree::component::ComponentTree;
use kdeploy::vars::Variables;

/// Parse a definition tree from inline JSON.
pub fn definition(json: serde_json::Value) -> ComponentDefinition {
    serde_json::from_value(json).expect("test definition must parse")
}

pub fn context(mode: EngineMode) -> ClusterContext {
    context_with(mode, EngineConfig::default, Variables::new())
}

pub fn context_with(
    mode: EngineMode,
    config: impl FnOnce() -> EngineConfig,
    variables: Variables,
) -> ClusterContext {
    let mut config = config();
    config.mode = mode;
    ClusterContext {
        name: "test".to_string(),
        variables,
        config,
        base_url: "http://127.0.0.1:8001".to_string(),
    }
}

/// Build and prepare a tree; panics when the root is filtered out.
pub fn prepared_tree(def: &ComponentDefinition, ctx: ClusterContext) -> ComponentTree {
    let filters = ComponentFilters::default();
    let mut tree = ComponentTree::build(def, ctx, &filters)
        .expect("tree build")
        .expect("root not filtered");
    tree.prepare().expect("prepare");
    tree
}

/// Index of a component by name.
pub fn component_id(tree: &ComponentTree, name: &str) -> usize {
    tree.ids()
        .find(|&id| tree.component(id).name == name)
        .unwrap_or_else(|| panic!("no component named {name}"))
}

/// Index of a task by name.
pub fn task_id(tree: &ComponentTree, name: &str) -> usize {
    tree.tasks()
        .iter()
        .position(|t| t.name == name)
        .unwrap_or_else(|| panic!("no task named {name}"))
}

/// A pod-creation event like the ones the watch stream delivers.
pub fn pod_created_event(pod_name: &str, namespace: &str) -> WatchedEvent {
    WatchedEvent {
        metadata: Metadata {
            name: format!("{pod_name}.17e3a"),
            namespace_: namespace.to_string(),
            labels: BTreeMap::new(),
        },
        involved_object: ObjectReference {
            kind: "Pod".to_string(),
            name: pod_name.to_string(),
            namespace_: namespace.to_string(),
        },
        reason: "Created".to_string(),
        message: format!("Created container {pod_name}"),
        type_: "Normal".to_string(),
    }
}
