// src/resource/service.rs

use tracing::trace;

use crate::config::model::Kind;
use crate::errors::Result;
use crate::k8s::api::{IntOrString, ResourceBody, ServicePort};
use crate::resource::deployment::container_ports;
use crate::resource::driver::{namespaced_url, ResourceDriver};
use crate::tree::component::{ComponentId, ComponentTree};

pub struct ServiceDriver;

pub static SERVICE: ServiceDriver = ServiceDriver;

impl ResourceDriver for ServiceDriver {
    fn kind(&self) -> Kind {
        Kind::Service
    }

    fn prepare_deploy(&self, tree: &mut ComponentTree, id: ComponentId) -> Result<()> {
        let name = tree.component(id).name.clone();
        let ns = tree.namespace_of(id);
        let selector = tree.selector(id);

        let arg_type = tree.get_arg(id, "service.type").map(str::to_string);
        let node_port = tree.get_int_arg(id, "service.nodePort")?.unwrap_or(0) as i32;
        let ext_port = tree.get_int_arg(id, "port")?;

        // A service under a Deployment derives its ports from the pod
        // template's container ports.
        let parent_ports = tree
            .component(id)
            .parent
            .map(|p| container_ports(tree, p))
            .unwrap_or_default();

        if let ResourceBody::Service(body) = &mut tree.component_mut(id).resource {
            if body.metadata.name.is_empty() {
                body.metadata.name = name.clone();
            }
            if body.metadata.namespace_.is_empty() {
                body.metadata.namespace_ = ns;
            }
            body.api_version = "v1".to_string();
            body.kind = "Service".to_string();

            body.metadata
                .labels
                .entry(selector.0.clone())
                .or_insert_with(|| selector.1.clone());
            body.spec
                .selector
                .entry(selector.0)
                .or_insert(selector.1);

            if let Some(t) = arg_type {
                body.spec.type_ = t;
            }
            if body.spec.type_.is_empty() && node_port > 0 {
                body.spec.type_ = "NodePort".to_string();
            }

            if body.spec.ports.is_empty() {
                for (cnt, dp) in parent_ports.iter().enumerate() {
                    let mut sport = ServicePort {
                        protocol: dp.protocol.clone(),
                        ..Default::default()
                    };

                    let mut ext = dp.host_port;
                    if cnt == 0 && ext <= 0 {
                        ext = ext_port.map(|p| p as i32).unwrap_or(dp.container_port);
                    }
                    if ext <= 0 {
                        ext = dp.container_port;
                    }
                    sport.port = ext;

                    if !dp.name.is_empty() {
                        sport.target_port = Some(IntOrString::String(dp.name.clone()));
                        sport.name = dp.name.clone();
                    } else {
                        sport.target_port = Some(IntOrString::Int(dp.container_port));
                        sport.name = format!("sport-{}", cnt + 1);
                    }

                    if cnt == 0 && node_port > 0 {
                        sport.node_port = node_port;
                    }

                    trace!(
                        component = %name,
                        port = %sport.name,
                        "added service port"
                    );
                    body.spec.ports.push(sport);
                }
            }
        }

        Ok(())
    }

    fn collection_url(&self, tree: &ComponentTree, id: ComponentId) -> Option<String> {
        let ns = match &tree.component(id).resource {
            ResourceBody::Service(body) if !body.metadata.namespace_.is_empty() => {
                body.metadata.namespace_.clone()
            }
            _ => tree.namespace_of(id),
        };
        Some(namespaced_url(&tree.ctx.base_url, "api/v1", &ns, "services"))
    }
}
