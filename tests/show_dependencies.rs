mod common;

use std::error::Error;

use kdeploy::config::model::{EngineConfig, EngineMode};
use kdeploy::tree::dot;
use kdeploy::vars::Variables;
use serde_json::json;

use common::{context_with, definition, prepared_tree};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn dot_dump_contains_both_subgraphs_and_edges() -> TestResult {
    let ctx = context_with(
        EngineMode::ShowDependencies,
        || EngineConfig {
            namespace: "prod".to_string(),
            auto_maintain_namespace: true,
            dotfile: "deps.dot".to_string(),
            ..EngineConfig::default()
        },
        Variables::new(),
    );

    let def = definition(json!({
        "name": "web",
        "kind": "App",
        "children": [
            {
                "name": "web-dep",
                "kind": "Deployment",
                "children": [
                    { "name": "late", "kind": "Service", "parentRelation": "after" }
                ]
            }
        ]
    }));

    let tree = prepared_tree(&def, ctx);
    let rendered = dot::render(&tree);

    assert!(rendered.starts_with("digraph {"));
    assert!(rendered.contains("label=\"Components\";"));
    assert!(rendered.contains("label=\"Tasks\";"));

    // Component edge: the deployment depends on its namespace.
    assert!(
        rendered.contains("\"test/Deployment/web-dep\" -> \"test/Namespace/prod-ns\""),
        "missing namespace edge in:\n{rendered}"
    );

    // Task edge from the AFTER relation.
    assert!(
        rendered.contains("\"test/Service/late.late\" -> \"test/Deployment/web-dep.web-dep\""),
        "missing task edge in:\n{rendered}"
    );

    Ok(())
}

#[test]
fn dot_file_is_named_after_root_and_dotfile() -> TestResult {
    let dir = tempfile::tempdir()?;

    let ctx = context_with(
        EngineMode::ShowDependencies,
        || EngineConfig {
            dotfile: "graph.dot".to_string(),
            ..EngineConfig::default()
        },
        Variables::new(),
    );

    let def = definition(json!({
        "name": "web",
        "kind": "App",
        "children": [
            { "name": "web-svc", "kind": "Service" }
        ]
    }));

    let tree = prepared_tree(&def, ctx);
    let path = dot::write_dot(&tree, dir.path())?;

    assert_eq!(path.file_name().unwrap().to_string_lossy(), "web-graph.dot");
    assert!(std::fs::read_to_string(&path)?.contains("digraph {"));

    Ok(())
}
