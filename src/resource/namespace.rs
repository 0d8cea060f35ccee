// src/resource/namespace.rs

use crate::config::model::Kind;
use crate::errors::Result;
use crate::k8s::api::ResourceBody;
use crate::k8s::client::ProbeResponse;
use crate::resource::driver::{cluster_url, CompletionPolicy, ObjectState, ResourceDriver};
use crate::tree::component::{ComponentId, ComponentTree, Mode};

pub struct NamespaceDriver;

pub static NAMESPACE: NamespaceDriver = NamespaceDriver;

impl ResourceDriver for NamespaceDriver {
    fn kind(&self) -> Kind {
        Kind::Namespace
    }

    fn completion(&self) -> CompletionPolicy {
        // Namespace creation emits no usable events; poll the object until
        // its phase settles.
        CompletionPolicy::OnProbe
    }

    fn prepare_deploy(&self, tree: &mut ComponentTree, id: ComponentId) -> Result<()> {
        let managed = tree
            .get_arg(id, "namespace.name")
            .map(str::to_string)
            .unwrap_or_else(|| tree.component(id).name.clone());

        if let ResourceBody::Namespace(body) = &mut tree.component_mut(id).resource {
            if body.metadata.name.is_empty() {
                body.metadata.name = managed;
            }
            body.api_version = "v1".to_string();
            body.kind = "Namespace".to_string();
        }

        Ok(())
    }

    fn collection_url(&self, tree: &ComponentTree, _id: ComponentId) -> Option<String> {
        Some(cluster_url(&tree.ctx.base_url, "api/v1", "namespaces"))
    }

    fn interpret_probe(&self, _mode: Mode, response: &ProbeResponse) -> ObjectState {
        if response.status == 404 {
            return ObjectState::DontExist;
        }
        if !(200..300).contains(&response.status) {
            return ObjectState::Init;
        }

        let phase = serde_json::from_str::<serde_json::Value>(&response.body)
            .ok()
            .and_then(|v| {
                v.get("status")
                    .and_then(|s| s.get("phase"))
                    .and_then(|p| p.as_str())
                    .map(str::to_string)
            });

        match phase.as_deref() {
            Some("Active") => ObjectState::Ready,
            // Terminating namespaces are still going away; keep polling.
            Some("Terminating") => ObjectState::Init,
            _ => ObjectState::Init,
        }
    }
}
