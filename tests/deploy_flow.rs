mod common;

use std::error::Error;

use kdeploy::config::model::{EngineConfig, EngineMode};
use kdeploy::engine::{ClusterCore, ClusterEvent, ClusterPhase, Command};
use kdeploy::k8s::client::{HttpMethod, HttpOutcome};
use kdeploy::resource::ObjectState;
use kdeploy::tree::component::ComponentState;
use kdeploy::tree::task::TaskState;
use kdeploy::vars::Variables;
use serde_json::json;

use common::{component_id, context, context_with, definition, pod_created_event, prepared_tree, task_id};

type TestResult = Result<(), Box<dyn Error>>;

fn http_tasks(commands: &[Command]) -> Vec<usize> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Http { task, .. } => Some(*task),
            _ => None,
        })
        .collect()
}

#[test]
fn minimal_deploy_completes_on_pod_events() -> TestResult {
    let def = definition(json!({
        "name": "web",
        "kind": "App",
        "children": [
            {
                "name": "web-dep",
                "kind": "Deployment",
                "args": { "replicas": "2", "service.enabled": "true" }
            }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Deploy));

    // The implicit service child exists before execution starts.
    let svc = component_id(&tree, "web-dep-svc");
    assert_eq!(tree.component(svc).parent, Some(component_id(&tree, "web-dep")));
    assert!(tree.tasks().len() >= 2);

    let dep_task = task_id(&tree, "web-dep");
    let svc_task = task_id(&tree, "web-dep-svc");

    let mut core = ClusterCore::new(tree);
    let step = core.start();
    assert!(step.finished.is_none());

    // Both tasks dispatch immediately; neither depends on the other.
    let dispatched = http_tasks(&step.commands);
    assert!(dispatched.contains(&dep_task));
    assert!(dispatched.contains(&svc_task));

    // The service concludes on its response.
    let step = core.step(ClusterEvent::HttpDone {
        task: svc_task,
        outcome: HttpOutcome::Status(201),
    });
    assert!(step.finished.is_none());
    assert_eq!(core.tree().task(svc_task).state, TaskState::Done);

    // The deployment stays waiting for events after its response.
    let step = core.step(ClusterEvent::HttpDone {
        task: dep_task,
        outcome: HttpOutcome::Status(201),
    });
    assert!(step.finished.is_none());
    assert_eq!(core.tree().task(dep_task).state, TaskState::Waiting);

    // First pod: still waiting (replicas = 2).
    let step = core.step(ClusterEvent::Watch(Box::new(pod_created_event(
        "web-dep-6b9cd", "default",
    ))));
    assert!(step.finished.is_none());
    assert_eq!(core.tree().task(dep_task).state, TaskState::Waiting);

    // Second pod: the deployment is done and the tree completes.
    let step = core.step(ClusterEvent::Watch(Box::new(pod_created_event(
        "web-dep-8f1aa", "default",
    ))));
    assert_eq!(step.finished, Some(true));
    assert_eq!(core.phase(), ClusterPhase::Done);

    let root = core.tree().root();
    assert_eq!(core.tree().component(root).state, ComponentState::Done);

    Ok(())
}

#[test]
fn pod_events_from_other_namespaces_are_ignored() -> TestResult {
    let def = definition(json!({
        "name": "web",
        "kind": "App",
        "children": [
            { "name": "web-dep", "kind": "Deployment", "args": { "replicas": "1" } }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Deploy));
    let dep_task = task_id(&tree, "web-dep");

    let mut core = ClusterCore::new(tree);
    core.start();
    core.step(ClusterEvent::HttpDone {
        task: dep_task,
        outcome: HttpOutcome::Status(201),
    });

    // Wrong namespace, wrong prefix: no effect.
    core.step(ClusterEvent::Watch(Box::new(pod_created_event(
        "web-dep-abc", "staging",
    ))));
    core.step(ClusterEvent::Watch(Box::new(pod_created_event(
        "other-abc", "default",
    ))));
    assert_eq!(core.tree().task(dep_task).state, TaskState::Waiting);

    let step = core.step(ClusterEvent::Watch(Box::new(pod_created_event(
        "web-dep-abc", "default",
    ))));
    assert_eq!(step.finished, Some(true));

    Ok(())
}

#[test]
fn namespace_settles_before_dependents_run() -> TestResult {
    let ctx = context_with(
        EngineMode::Deploy,
        || EngineConfig {
            namespace: "prod".to_string(),
            auto_maintain_namespace: true,
            ..EngineConfig::default()
        },
        Variables::new(),
    );

    let def = definition(json!({
        "name": "web",
        "kind": "App",
        "children": [
            { "name": "web-dep", "kind": "Deployment", "args": { "replicas": "1" } }
        ]
    }));

    let tree = prepared_tree(&def, ctx);
    let ns_task = task_id(&tree, "prod-ns");
    let dep_task = task_id(&tree, "web-dep");
    let ns = component_id(&tree, "prod-ns");
    let dep = component_id(&tree, "web-dep");

    let mut core = ClusterCore::new(tree);
    let step = core.start();

    // Only the namespace dispatches; the deployment is gated.
    assert_eq!(http_tasks(&step.commands), vec![ns_task]);
    assert_eq!(core.tree().task(dep_task).state, TaskState::Blocked);
    assert_eq!(core.tree().component(dep).state, ComponentState::Creating);

    // Namespace created; it polls until the object is Active.
    let step = core.step(ClusterEvent::HttpDone {
        task: ns_task,
        outcome: HttpOutcome::Status(201),
    });
    assert!(step
        .commands
        .iter()
        .any(|c| matches!(c, Command::Poll { task, .. } if *task == ns_task)));

    let step = core.step(ClusterEvent::PollFired { task: ns_task });
    let probe = step.commands.iter().find_map(|c| match c {
        Command::Probe { task, request, .. } if *task == ns_task => Some(request),
        _ => None,
    });
    let probe = probe.expect("namespace task must probe");
    assert_eq!(probe.method, HttpMethod::Get);
    assert!(probe.url.ends_with("/api/v1/namespaces/prod"));

    // Probe says Active: the namespace is done strictly before the
    // deployment starts running.
    let step = core.step(ClusterEvent::ProbeDone {
        task: ns_task,
        state: ObjectState::Ready,
    });
    assert_eq!(core.tree().component(ns).state, ComponentState::Done);
    assert_eq!(core.tree().component(dep).state, ComponentState::Running);
    assert_eq!(http_tasks(&step.commands), vec![dep_task]);

    let step = core.step(ClusterEvent::HttpDone {
        task: dep_task,
        outcome: HttpOutcome::Status(201),
    });
    assert!(step.finished.is_none());

    let step = core.step(ClusterEvent::Watch(Box::new(pod_created_event(
        "web-dep-1", "prod",
    ))));
    assert_eq!(step.finished, Some(true));

    Ok(())
}

#[test]
fn delete_of_absent_resource_counts_as_done() -> TestResult {
    let def = definition(json!({
        "name": "web",
        "kind": "App",
        "children": [
            { "name": "web-svc", "kind": "Service" }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Delete));
    let svc_task = task_id(&tree, "web-svc");

    let mut core = ClusterCore::new(tree);
    let step = core.start();

    let delete = step.commands.iter().find_map(|c| match c {
        Command::Http { task, request } if *task == svc_task => Some(request),
        _ => None,
    });
    let delete = delete.expect("delete must dispatch");
    assert_eq!(delete.method, HttpMethod::Delete);
    assert!(delete.url.ends_with("/api/v1/namespaces/default/services/web-svc"));

    let step = core.step(ClusterEvent::HttpDone {
        task: svc_task,
        outcome: HttpOutcome::Status(404),
    });
    assert_eq!(core.tree().task(svc_task).state, TaskState::Done);
    assert_eq!(step.finished, Some(true));

    Ok(())
}

#[test]
fn namespace_teardown_finishes_after_occupants() -> TestResult {
    let ctx = context_with(
        EngineMode::Delete,
        || EngineConfig {
            namespace: "prod".to_string(),
            auto_maintain_namespace: true,
            ..EngineConfig::default()
        },
        Variables::new(),
    );

    let def = definition(json!({
        "name": "web",
        "kind": "App",
        "children": [
            { "name": "web-dep", "kind": "Deployment" }
        ]
    }));

    let tree = prepared_tree(&def, ctx);
    let ns_task = task_id(&tree, "prod-ns");
    let dep_task = task_id(&tree, "web-dep");
    let ns = component_id(&tree, "prod-ns");

    let mut core = ClusterCore::new(tree);
    core.start();

    // Both deletes fire, but the namespace component cannot settle before
    // its former occupants are gone.
    let step = core.step(ClusterEvent::HttpDone {
        task: ns_task,
        outcome: HttpOutcome::Status(200),
    });
    assert!(step.finished.is_none());
    assert_ne!(core.tree().component(ns).state, ComponentState::Done);

    let step = core.step(ClusterEvent::HttpDone {
        task: dep_task,
        outcome: HttpOutcome::Status(200),
    });
    assert_eq!(core.tree().component(ns).state, ComponentState::Done);
    assert_eq!(step.finished, Some(true));

    Ok(())
}

#[test]
fn http_failure_fails_component_and_root() -> TestResult {
    let def = definition(json!({
        "name": "web",
        "kind": "App",
        "children": [
            { "name": "web-svc", "kind": "Service" }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Deploy));
    let svc_task = task_id(&tree, "web-svc");
    let svc = component_id(&tree, "web-svc");

    let mut core = ClusterCore::new(tree);
    core.start();

    let step = core.step(ClusterEvent::HttpDone {
        task: svc_task,
        outcome: HttpOutcome::Status(500),
    });
    assert_eq!(core.tree().task(svc_task).state, TaskState::Failed);
    assert_eq!(core.tree().component(svc).state, ComponentState::Failed);
    assert_eq!(step.finished, Some(false));
    assert_eq!(core.phase(), ClusterPhase::Failed);

    Ok(())
}

#[test]
fn ignore_errors_lets_the_tree_finish() -> TestResult {
    let def = definition(json!({
        "name": "web",
        "kind": "App",
        "children": [
            { "name": "web-svc", "kind": "Service", "args": { "ignoreErrors": "true" } }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Deploy));
    let svc_task = task_id(&tree, "web-svc");

    let mut core = ClusterCore::new(tree);
    core.start();

    let step = core.step(ClusterEvent::HttpDone {
        task: svc_task,
        outcome: HttpOutcome::Transport("connection refused".to_string()),
    });
    assert_eq!(core.tree().task(svc_task).state, TaskState::Done);
    assert_eq!(step.finished, Some(true));

    Ok(())
}

#[test]
fn upstream_failure_sinks_dependents() -> TestResult {
    let def = definition(json!({
        "name": "root",
        "kind": "App",
        "children": [
            {
                "name": "dep",
                "kind": "Deployment",
                "children": [
                    { "name": "late", "kind": "Service", "parentRelation": "after" }
                ]
            }
        ]
    }));

    let tree = prepared_tree(&def, context(EngineMode::Deploy));
    let dep_task = task_id(&tree, "dep");
    let late_task = task_id(&tree, "late");

    let mut core = ClusterCore::new(tree);
    core.start();

    let step = core.step(ClusterEvent::HttpDone {
        task: dep_task,
        outcome: HttpOutcome::Status(503),
    });

    assert_eq!(core.tree().task(dep_task).state, TaskState::Failed);
    assert_eq!(
        core.tree().task(late_task).state,
        TaskState::DependencyFailed
    );
    assert_eq!(step.finished, Some(false));

    Ok(())
}

#[test]
fn task_deadline_aborts_stuck_work() -> TestResult {
    let ctx = context_with(
        EngineMode::Deploy,
        || EngineConfig {
            task_timeout: Some(std::time::Duration::from_secs(300)),
            ..EngineConfig::default()
        },
        Variables::new(),
    );

    let def = definition(json!({
        "name": "web",
        "kind": "App",
        "children": [
            { "name": "web-dep", "kind": "Deployment" }
        ]
    }));

    let tree = prepared_tree(&def, ctx);
    let dep_task = task_id(&tree, "web-dep");

    let mut core = ClusterCore::new(tree);
    let step = core.start();

    assert!(step
        .commands
        .iter()
        .any(|c| matches!(c, Command::Timeout { task, .. } if *task == dep_task)));

    core.step(ClusterEvent::HttpDone {
        task: dep_task,
        outcome: HttpOutcome::Status(201),
    });

    // No pod events ever arrive; the deadline sinks the task.
    let step = core.step(ClusterEvent::TimeoutFired { task: dep_task });
    assert_eq!(core.tree().task(dep_task).state, TaskState::Aborted);
    assert_eq!(step.finished, Some(false));

    Ok(())
}
