// src/tree/dot.rs

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use crate::errors::Result;
use crate::tree::component::ComponentTree;

/// Render the component and task dependency graphs as GraphViz DOT.
///
/// Two subgraphs: "Components" (component -> dependency) and "Tasks"
/// (task -> dependency), with `<cluster>/<Kind>/<name>` node labels.
pub fn render(tree: &ComponentTree) -> String {
    let mut out = String::new();

    out.push_str("digraph {\n");
    out.push_str("   subgraph components {\n");
    out.push_str("      label=\"Components\";\n");

    for id in tree.ids() {
        for &dep in &tree.component(id).depends_on {
            let _ = writeln!(
                out,
                "      \"{}\" -> \"{}\"",
                tree.log_name(id),
                tree.log_name(dep)
            );
        }
    }

    out.push_str("   }\n");
    out.push_str("   subgraph tasks {\n");
    out.push_str("      label=\"Tasks\";\n");

    for task in tree.tasks() {
        for &dep in &task.depends_on {
            let dep_task = tree.task(dep);
            let _ = writeln!(
                out,
                "      \"{}.{}\" -> \"{}.{}\"",
                tree.log_name(task.component),
                task.name,
                tree.log_name(dep_task.component),
                dep_task.name
            );
        }
    }

    out.push_str("   }\n");
    out.push_str("}\n");

    out
}

/// Write the DOT dump for this tree into `dir`, named
/// `<root-name>-<dotfile>`. Returns the path written.
pub fn write_dot(tree: &ComponentTree, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let file_name = format!(
        "{}-{}",
        tree.component(tree.root()).name,
        tree.ctx.config.dotfile
    );
    let path = dir.as_ref().join(file_name);

    info!(path = %path.display(), "dumping dependency graph");

    std::fs::write(&path, render(tree))
        .with_context(|| format!("writing dependency dump to {:?}", path))?;

    Ok(path)
}
