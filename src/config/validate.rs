// src/config/validate.rs

use std::collections::BTreeSet;
use std::str::FromStr;

use regex::Regex;

use crate::config::model::{ComponentDefinition, EngineConfig, Kind};
use crate::errors::{KdeployError, Result};

/// Run basic semantic validation on a parsed definition tree.
///
/// This checks:
/// - every node names a known [`Kind`]
/// - node names are non-empty
/// - no node lists itself in `depends`
/// - `depends` entries refer to a name that exists somewhere in the tree
///
/// Dependency cycles are rejected later, when the runtime graph is wired
/// (`depends` may legally point at names that filtering prunes, so cycle
/// checking on the raw definition would be premature).
pub fn validate_definition(def: &ComponentDefinition) -> Result<()> {
    let mut names = BTreeSet::new();
    collect_names(def, &mut names);
    walk(def, &names)
}

fn collect_names<'a>(def: &'a ComponentDefinition, names: &mut BTreeSet<&'a str>) {
    names.insert(def.name.as_str());
    for child in &def.children {
        collect_names(child, names);
    }
}

fn walk(def: &ComponentDefinition, names: &BTreeSet<&str>) -> Result<()> {
    if def.name.is_empty() {
        return Err(KdeployError::Config(
            "component with empty name in definition".to_string(),
        ));
    }

    // Surfaces unknown kinds before any HTTP work starts.
    Kind::from_str(&def.kind)?;

    for dep in &def.depends {
        if dep == &def.name {
            return Err(KdeployError::Config(format!(
                "component '{}' cannot depend on itself",
                def.name
            )));
        }
        if !names.contains(dep.as_str()) {
            return Err(KdeployError::Config(format!(
                "component '{}' depends on unknown component '{}'",
                def.name, dep
            )));
        }
    }

    for child in &def.children {
        walk(child, names)?;
    }

    Ok(())
}

/// Compiled include/exclude filters from [`EngineConfig`].
///
/// Patterns match the whole component name, like the original filters.
#[derive(Debug, Clone, Default)]
pub struct ComponentFilters {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl ComponentFilters {
    pub fn from_config(cfg: &EngineConfig) -> Result<Self> {
        Ok(Self {
            include: compile(cfg.include_filter.as_deref(), "include-filter")?,
            exclude: compile(cfg.exclude_filter.as_deref(), "exclude-filter")?,
        })
    }

    /// Returns true if the named component survives filtering.
    pub fn matches(&self, name: &str) -> bool {
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(name) {
                return false;
            }
        }
        if let Some(include) = &self.include {
            return include.is_match(name);
        }
        true
    }
}

fn compile(pattern: Option<&str>, what: &str) -> Result<Option<Regex>> {
    match pattern {
        None => Ok(None),
        Some(p) => {
            let anchored = format!("^(?:{p})$");
            let re = Regex::new(&anchored)
                .map_err(|e| KdeployError::Config(format!("invalid {what} '{p}': {e}")))?;
            Ok(Some(re))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(json: &str) -> ComponentDefinition {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn accepts_known_kinds() {
        let d = def(r#"{"name": "a", "kind": "App",
                        "children": [{"name": "b", "kind": "Deployment"}]}"#);
        assert!(validate_definition(&d).is_ok());
    }

    #[test]
    fn rejects_unknown_kind() {
        let d = def(r#"{"name": "a", "kind": "Blob"}"#);
        assert!(matches!(
            validate_definition(&d),
            Err(KdeployError::UnknownKind(_))
        ));
    }

    #[test]
    fn rejects_self_dependency() {
        let d = def(r#"{"name": "a", "kind": "App", "depends": ["a"]}"#);
        assert!(validate_definition(&d).is_err());
    }

    #[test]
    fn rejects_unknown_dependency_name() {
        let d = def(r#"{"name": "a", "kind": "App", "depends": ["ghost"]}"#);
        assert!(validate_definition(&d).is_err());
    }

    #[test]
    fn filters_match_whole_names() {
        let cfg = EngineConfig {
            include_filter: Some("web.*".to_string()),
            exclude_filter: Some("web-old".to_string()),
            ..EngineConfig::default()
        };
        let filters = ComponentFilters::from_config(&cfg).unwrap();
        assert!(filters.matches("web-dep"));
        assert!(!filters.matches("web-old"));
        assert!(!filters.matches("db"));
        // Anchored: a substring match is not enough.
        assert!(!filters.matches("my-web-dep"));
    }
}
