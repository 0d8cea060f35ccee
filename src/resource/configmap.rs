// src/resource/configmap.rs

use std::path::Path;

use anyhow::Context;

use crate::config::model::Kind;
use crate::errors::Result;
use crate::k8s::api::{base64_encode, ResourceBody};
use crate::resource::driver::{namespaced_url, ResourceDriver};
use crate::tree::component::{ComponentId, ComponentTree, Mode};
use crate::vars::parse_string_list;

pub struct ConfigMapDriver;
pub struct SecretDriver;

pub static CONFIG_MAP: ConfigMapDriver = ConfigMapDriver;
pub static SECRET: SecretDriver = SecretDriver;

/// Load the files named by a `*.fromFile` argument into `(basename, base64)`
/// pairs.
fn load_files(files: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();

    for file in parse_string_list(files) {
        let bytes =
            std::fs::read(&file).with_context(|| format!("reading content file {file:?}"))?;
        let key = Path::new(&file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.clone());
        out.push((key, base64_encode(&bytes)));
    }

    Ok(out)
}

impl ResourceDriver for ConfigMapDriver {
    fn kind(&self) -> Kind {
        Kind::ConfigMap
    }

    fn prepare_deploy(&self, tree: &mut ComponentTree, id: ComponentId) -> Result<()> {
        let name = tree.component(id).name.clone();
        let ns = tree.namespace_of(id);

        // File contents only matter when creating; teardown just needs the
        // object name.
        let entries = match tree.get_arg(id, "config.fromFile") {
            Some(files) if tree.mode() == Mode::Create => load_files(files)?,
            _ => Vec::new(),
        };

        if let ResourceBody::ConfigMap(body) = &mut tree.component_mut(id).resource {
            if body.metadata.name.is_empty() {
                body.metadata.name = name;
            }
            if body.metadata.namespace_.is_empty() {
                body.metadata.namespace_ = ns;
            }
            body.api_version = "v1".to_string();
            body.kind = "ConfigMap".to_string();

            if body.binary_data.is_empty() {
                body.binary_data.extend(entries);
            }
        }

        Ok(())
    }

    fn collection_url(&self, tree: &ComponentTree, id: ComponentId) -> Option<String> {
        let ns = tree.namespace_of(id);
        Some(namespaced_url(
            &tree.ctx.base_url,
            "api/v1",
            &ns,
            "configmaps",
        ))
    }
}

impl ResourceDriver for SecretDriver {
    fn kind(&self) -> Kind {
        Kind::Secret
    }

    fn prepare_deploy(&self, tree: &mut ComponentTree, id: ComponentId) -> Result<()> {
        let name = tree.component(id).name.clone();
        let ns = tree.namespace_of(id);
        let secret_type = tree.get_arg_or(id, "secret.type", "Opaque");

        let entries = match tree.get_arg(id, "secret.fromFile") {
            Some(files) if tree.mode() == Mode::Create => load_files(files)?,
            _ => Vec::new(),
        };

        if let ResourceBody::Secret(body) = &mut tree.component_mut(id).resource {
            if body.metadata.name.is_empty() {
                body.metadata.name = name;
            }
            if body.metadata.namespace_.is_empty() {
                body.metadata.namespace_ = ns;
            }
            body.api_version = "v1".to_string();
            body.kind = "Secret".to_string();
            if body.type_.is_empty() {
                body.type_ = secret_type;
            }

            if body.data.is_empty() {
                body.data.extend(entries);
            }
        }

        Ok(())
    }

    fn collection_url(&self, tree: &ComponentTree, id: ComponentId) -> Option<String> {
        let ns = tree.namespace_of(id);
        Some(namespaced_url(&tree.ctx.base_url, "api/v1", &ns, "secrets"))
    }
}
