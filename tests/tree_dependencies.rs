mod common;

use std::error::Error;

use kdeploy::config::model::{EngineConfig, EngineMode};
use kdeploy::errors::KdeployError;
use kdeploy::tree::component::{ComponentState, ComponentTree};
use kdeploy::vars::Variables;
use serde_json::json;

use common::{component_id, context, context_with, definition, prepared_tree, task_id};

type TestResult = Result<(), Box<dyn Error>>;

fn web_with_namespace() -> serde_json::Value {
    json!({
        "name": "web",
        "kind": "App",
        "children": [
            { "name": "web-dep", "kind": "Deployment", "args": { "replicas": "2" } }
        ]
    })
}

#[test]
fn auto_namespace_becomes_dependency_of_workloads() -> TestResult {
    let ctx = context_with(
        EngineMode::Deploy,
        || EngineConfig {
            namespace: "prod".to_string(),
            auto_maintain_namespace: true,
            ..EngineConfig::default()
        },
        Variables::new(),
    );

    let tree = prepared_tree(&definition(web_with_namespace()), ctx);

    let ns = component_id(&tree, "prod-ns");
    let dep = component_id(&tree, "web-dep");

    assert!(
        tree.component(dep).depends_on.contains(&ns),
        "deployment must depend on its namespace component"
    );
    assert!(tree.component(ns).depends_on.is_empty());

    Ok(())
}

#[test]
fn auto_namespace_dependency_reverses_under_delete() -> TestResult {
    let ctx = context_with(
        EngineMode::Delete,
        || EngineConfig {
            namespace: "prod".to_string(),
            auto_maintain_namespace: true,
            ..EngineConfig::default()
        },
        Variables::new(),
    );

    let tree = prepared_tree(&definition(web_with_namespace()), ctx);

    let ns = component_id(&tree, "prod-ns");
    let dep = component_id(&tree, "web-dep");

    assert!(
        tree.component(ns).depends_on.contains(&dep),
        "under delete the namespace must wait for its occupants"
    );
    assert!(!tree.component(dep).depends_on.contains(&ns));

    Ok(())
}

#[test]
fn sibling_dependency_cycle_is_rejected() -> TestResult {
    let def = definition(json!({
        "name": "root",
        "kind": "App",
        "children": [
            { "name": "a", "kind": "Service", "depends": ["b"] },
            { "name": "b", "kind": "Service", "depends": ["a"] }
        ]
    }));

    let filters = kdeploy::config::validate::ComponentFilters::default();
    let mut tree = ComponentTree::build(&def, context(EngineMode::Deploy), &filters)?
        .expect("root not filtered");

    let err = tree.prepare().expect_err("cycle must be fatal");
    assert!(matches!(err, KdeployError::Cycle(_)), "got: {err}");

    Ok(())
}

#[test]
fn declared_dependencies_link_all_matching_names() -> TestResult {
    let def = definition(json!({
        "name": "root",
        "kind": "App",
        "children": [
            { "name": "db", "kind": "Service" },
            { "name": "api", "kind": "Service", "depends": ["db"] }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Deploy));
    let api = component_id(&tree, "api");
    let db = component_id(&tree, "db");

    assert!(tree.component(api).depends_on.contains(&db));

    Ok(())
}

#[test]
fn after_relation_wires_child_tasks_behind_parent_tasks() -> TestResult {
    let def = definition(json!({
        "name": "root",
        "kind": "App",
        "children": [
            {
                "name": "dep",
                "kind": "Deployment",
                "children": [
                    { "name": "svc", "kind": "Service", "parentRelation": "after" }
                ]
            }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Deploy));

    let svc_task = task_id(&tree, "svc");
    let dep_task = task_id(&tree, "dep");

    assert!(
        tree.task(svc_task).depends_on.contains(&dep_task),
        "AFTER: child tasks depend on parent tasks"
    );
    assert!(tree.task(dep_task).depends_on.is_empty());

    Ok(())
}

#[test]
fn before_relation_wires_parent_tasks_behind_child_tasks() -> TestResult {
    let def = definition(json!({
        "name": "root",
        "kind": "App",
        "children": [
            {
                "name": "dep",
                "kind": "Deployment",
                "children": [
                    { "name": "cfg", "kind": "ConfigMap", "parentRelation": "before" }
                ]
            }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Deploy));

    let cfg_task = task_id(&tree, "cfg");
    let dep_task = task_id(&tree, "dep");

    assert!(
        tree.task(dep_task).depends_on.contains(&cfg_task),
        "BEFORE: parent tasks depend on child tasks"
    );

    Ok(())
}

#[test]
fn reverse_swaps_before_and_after() -> TestResult {
    let def = definition(json!({
        "name": "root",
        "kind": "App",
        "children": [
            {
                "name": "dep",
                "kind": "Deployment",
                "children": [
                    { "name": "svc", "kind": "Service", "parentRelation": "after" }
                ]
            }
        ]
    }));

    let filters = kdeploy::config::validate::ComponentFilters::default();
    let mut tree = ComponentTree::build(&def, context(EngineMode::Deploy), &filters)?
        .expect("root not filtered");
    tree.prepare_deploy(tree.root())?;
    tree.add_deployment_tasks(tree.root());
    tree.prepare_tasks(true)?;

    let svc_task = task_id(&tree, "svc");
    let dep_task = task_id(&tree, "dep");

    assert!(
        tree.task(dep_task).depends_on.contains(&svc_task),
        "reversed AFTER behaves like BEFORE"
    );

    Ok(())
}

#[test]
fn delete_mode_suppresses_parent_relation_task_edges() -> TestResult {
    let def = definition(json!({
        "name": "root",
        "kind": "App",
        "children": [
            {
                "name": "dep",
                "kind": "Deployment",
                "children": [
                    { "name": "svc", "kind": "Service", "parentRelation": "after" }
                ]
            }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Delete));

    for task in tree.tasks() {
        assert!(
            task.depends_on.is_empty(),
            "no relation-based task edges under delete"
        );
    }

    Ok(())
}

#[test]
fn effective_args_inherit_and_concatenate() -> TestResult {
    let def = definition(json!({
        "name": "root",
        "kind": "App",
        "defaultArgs": {
            "image": "busybox",
            "pod.args": "--root-flag"
        },
        "children": [
            {
                "name": "dep",
                "kind": "Deployment",
                "args": {
                    "pod.args": "--child-flag",
                    "replicas": "3"
                }
            }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Deploy));
    let dep = component_id(&tree, "dep");
    let args = &tree.component(dep).effective_args;

    // Non-special keys: descendant wins, ancestors fill gaps.
    assert_eq!(args.get("image").map(String::as_str), Some("busybox"));
    assert_eq!(args.get("replicas").map(String::as_str), Some("3"));

    // pod.args concatenates descendant-first.
    assert_eq!(
        args.get("pod.args").map(String::as_str),
        Some("--child-flag --root-flag")
    );

    Ok(())
}

#[test]
fn deployment_synthesizes_service_and_configmap_children() -> TestResult {
    let dir = tempfile::tempdir()?;
    let conf_file = dir.path().join("app.conf");
    std::fs::write(&conf_file, "listen 8080\n")?;

    let def = definition(json!({
        "name": "web",
        "kind": "App",
        "children": [
            {
                "name": "web-dep",
                "kind": "Deployment",
                "args": {
                    "replicas": "2",
                    "service.enabled": "true",
                    "config.fromFile": conf_file.to_string_lossy()
                }
            }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Deploy));

    let svc = component_id(&tree, "web-dep-svc");
    let conf = component_id(&tree, "web-dep-conf");
    let dep = component_id(&tree, "web-dep");

    assert_eq!(tree.component(svc).parent, Some(dep));
    assert_eq!(tree.component(conf).parent, Some(dep));

    // One task per concrete resource.
    assert!(tree.tasks().len() >= 3);

    // The synthesized service task has no dependency on the deployment task
    // (default relation is independent).
    let svc_task = task_id(&tree, "web-dep-svc");
    assert!(tree.task(svc_task).depends_on.is_empty());

    // The pod template mounts the config map read-only at /config.
    match &tree.component(dep).resource {
        kdeploy::k8s::api::ResourceBody::Deployment(body) => {
            let mount = &body.spec.template_.spec.containers[0].volume_mounts[0];
            assert_eq!(mount.mount_path, "/config");
            assert!(mount.read_only);
            assert_eq!(body.spec.template_.spec.volumes.len(), 1);
        }
        other => panic!("unexpected resource body: {other:?}"),
    }

    Ok(())
}

#[test]
fn exclude_filter_prunes_subtrees() -> TestResult {
    let ctx = context_with(
        EngineMode::Deploy,
        || EngineConfig {
            exclude_filter: Some("skipped".to_string()),
            ..EngineConfig::default()
        },
        Variables::new(),
    );

    let def = definition(json!({
        "name": "root",
        "kind": "App",
        "children": [
            {
                "name": "skipped",
                "kind": "Service",
                "children": [
                    { "name": "nested", "kind": "ConfigMap" }
                ]
            },
            { "name": "kept", "kind": "Service" }
        ]
    }));

    let filters = kdeploy::config::validate::ComponentFilters::from_config(&ctx.config)?;
    let tree = ComponentTree::build(&def, ctx, &filters)?.expect("root not filtered");

    assert!(tree.ids().all(|id| tree.component(id).name != "skipped"));
    assert!(
        tree.ids().all(|id| tree.component(id).name != "nested"),
        "children of filtered nodes are pruned with them"
    );
    assert!(tree.ids().any(|id| tree.component(id).name == "kept"));

    Ok(())
}

#[test]
fn fresh_tree_components_start_creating() -> TestResult {
    let tree = prepared_tree(&definition(web_with_namespace()), context(EngineMode::Deploy));

    for id in tree.ids() {
        assert_eq!(tree.component(id).state, ComponentState::Creating);
    }

    Ok(())
}
