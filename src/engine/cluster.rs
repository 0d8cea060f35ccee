// src/engine/cluster.rs

use std::path::Path;

use tracing::trace;

use crate::config::model::EngineConfig;
use crate::vars::Variables;

/// One target cluster, parsed from a `<kubeconfig>[:<k1=v1,k2=v2,...>]`
/// argument.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub name: String,
    pub kubeconfig: String,
    pub variables: Variables,
}

impl Cluster {
    /// Parse a cluster argument. When `name` is not given as a variable, it
    /// defaults to the kubeconfig filename's stem (the portion before the
    /// first `.`), else `"default"`.
    pub fn from_arg(arg: &str) -> Self {
        let (kubeconfig, vars) = split_once_or(arg, ':');

        let mut variables = Variables::new();
        for pair in vars.split(',') {
            if pair.is_empty() {
                continue;
            }
            let (k, v) = split_once_or(pair, '=');
            variables.insert(k.to_string(), v.to_string());
        }

        let name = match variables.get("name").filter(|n| !n.is_empty()) {
            Some(n) => n.clone(),
            None => {
                let stem = Path::new(kubeconfig)
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let stem = split_once_or(&stem, '.').0.to_string();
                if stem.is_empty() {
                    "default".to_string()
                } else {
                    stem
                }
            }
        };
        variables.insert("name".to_string(), name.clone());

        trace!(cluster = %name, ?variables, "parsed cluster argument");

        Self {
            name,
            kubeconfig: kubeconfig.to_string(),
            variables,
        }
    }
}

fn split_once_or(s: &str, ch: char) -> (&str, &str) {
    match s.split_once(ch) {
        Some((a, b)) => (a, b),
        None => (s, ""),
    }
}

/// Per-cluster data threaded into the tree and drivers: identity, variables,
/// the engine configuration and the API base URL (through the local proxy).
#[derive(Debug, Clone)]
pub struct ClusterContext {
    pub name: String,
    pub variables: Variables,
    pub config: EngineConfig,
    pub base_url: String,
}

impl ClusterContext {
    pub fn new(cluster: &Cluster, config: EngineConfig, base_url: String) -> Self {
        Self {
            name: cluster.name.clone(),
            variables: cluster.variables.clone(),
            config,
            base_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kubeconfig_and_variables() {
        let c = Cluster::from_arg("prod.conf:namespace=prod,replicas=3");
        assert_eq!(c.kubeconfig, "prod.conf");
        assert_eq!(c.name, "prod");
        assert_eq!(c.variables.get("namespace").map(String::as_str), Some("prod"));
        assert_eq!(c.variables.get("replicas").map(String::as_str), Some("3"));
    }

    #[test]
    fn explicit_name_variable_wins() {
        let c = Cluster::from_arg("prod.conf:name=blue");
        assert_eq!(c.name, "blue");
    }

    #[test]
    fn name_defaults_to_kubeconfig_stem() {
        let c = Cluster::from_arg("/etc/kube/staging.yaml");
        assert_eq!(c.name, "staging");
    }

    #[test]
    fn empty_kubeconfig_yields_default_name() {
        let c = Cluster::from_arg(":a=b");
        assert_eq!(c.name, "default");
        assert_eq!(c.kubeconfig, "");
    }

    #[test]
    fn bare_kubeconfig_without_variables() {
        let c = Cluster::from_arg("kubeconf");
        assert_eq!(c.name, "kubeconf");
        assert!(c.variables.get("namespace").is_none());
    }
}
