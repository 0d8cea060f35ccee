// src/k8s/api.rs

//! Minimal typed model of the Kubernetes resources we create.
//!
//! Field names that collide with reserved identifiers are stored under a
//! trailing-underscore name and remapped on (de)serialization:
//! `namespace_`, `template_`, `operator_`, `continue_` (and Rust's own
//! `type_`). Every HTTP payload flows through these mappings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

fn is_zero(n: &i32) -> bool {
    *n == 0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(rename = "namespace", skip_serializing_if = "String::is_empty")]
    pub namespace_: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelSelector {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    #[serde(rename = "matchExpressions", skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelSelectorRequirement {
    pub key: String,

    #[serde(rename = "operator")]
    pub operator_: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvEntry {
    pub name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerPort {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    pub container_port: i32,

    #[serde(skip_serializing_if = "is_zero")]
    pub host_port: i32,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,

    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyToPath {
    pub key: String,
    pub path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigMapVolumeSource {
    pub name: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<KeyToPath>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Volume {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapVolumeSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Container {
    pub name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvEntry>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ContainerPort>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodSpec {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub restart_policy: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PodTemplateSpec {
    pub metadata: Metadata,
    pub spec: PodSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeploymentSpec {
    pub replicas: u32,
    pub selector: LabelSelector,

    #[serde(rename = "template")]
    pub template_: PodTemplateSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deployment {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,

    pub metadata: Metadata,
    pub spec: DeploymentSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatefulSetSpec {
    pub replicas: u32,
    pub selector: LabelSelector,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_name: String,

    #[serde(rename = "template")]
    pub template_: PodTemplateSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatefulSet {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,

    pub metadata: Metadata,
    pub spec: StatefulSetSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DaemonSetSpec {
    pub selector: LabelSelector,

    #[serde(rename = "template")]
    pub template_: PodTemplateSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DaemonSet {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,

    pub metadata: Metadata,
    pub spec: DaemonSetSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobSpec {
    #[serde(rename = "template")]
    pub template_: PodTemplateSpec,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Job {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,

    pub metadata: Metadata,
    pub spec: JobSpec,
}

/// `targetPort` and friends accept either an integer or a named port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrString {
    Int(i32),
    String(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServicePort {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,

    pub port: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<IntOrString>,

    #[serde(skip_serializing_if = "is_zero")]
    pub node_port: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceSpec {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub selector: BTreeMap<String, String>,

    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,

    pub metadata: Metadata,
    pub spec: ServiceSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigMap {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,

    pub metadata: Metadata,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub binary_data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Secret {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,

    pub metadata: Metadata,

    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,

    /// Values are base64-encoded on insertion.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamespaceResource {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,

    pub metadata: Metadata,
}

/// Pass-through body for kinds we do not model field-by-field (RBAC, Ingress,
/// PersistentVolume, ServiceAccount). The `extra` map carries whatever the
/// definition supplied, e.g. `rules` or `subjects`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenericResource {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub kind: String,

    pub metadata: Metadata,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Tagged per-kind resource body owned by a component. `App` has no remote
/// resource.
#[derive(Debug, Clone)]
pub enum ResourceBody {
    App,
    Deployment(Box<Deployment>),
    StatefulSet(Box<StatefulSet>),
    DaemonSet(Box<DaemonSet>),
    Job(Box<Job>),
    Service(Box<Service>),
    ConfigMap(Box<ConfigMap>),
    Secret(Box<Secret>),
    Namespace(Box<NamespaceResource>),
    Generic(Box<GenericResource>),
}

impl ResourceBody {
    /// The object's metadata, when it has one.
    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            ResourceBody::App => None,
            ResourceBody::Deployment(r) => Some(&r.metadata),
            ResourceBody::StatefulSet(r) => Some(&r.metadata),
            ResourceBody::DaemonSet(r) => Some(&r.metadata),
            ResourceBody::Job(r) => Some(&r.metadata),
            ResourceBody::Service(r) => Some(&r.metadata),
            ResourceBody::ConfigMap(r) => Some(&r.metadata),
            ResourceBody::Secret(r) => Some(&r.metadata),
            ResourceBody::Namespace(r) => Some(&r.metadata),
            ResourceBody::Generic(r) => Some(&r.metadata),
        }
    }

    pub fn metadata_mut(&mut self) -> Option<&mut Metadata> {
        match self {
            ResourceBody::App => None,
            ResourceBody::Deployment(r) => Some(&mut r.metadata),
            ResourceBody::StatefulSet(r) => Some(&mut r.metadata),
            ResourceBody::DaemonSet(r) => Some(&mut r.metadata),
            ResourceBody::Job(r) => Some(&mut r.metadata),
            ResourceBody::Service(r) => Some(&mut r.metadata),
            ResourceBody::ConfigMap(r) => Some(&mut r.metadata),
            ResourceBody::Secret(r) => Some(&mut r.metadata),
            ResourceBody::Namespace(r) => Some(&mut r.metadata),
            ResourceBody::Generic(r) => Some(&mut r.metadata),
        }
    }

    /// Serialize the body for an HTTP payload. `App` has nothing to send.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        let value = match self {
            ResourceBody::App => return None,
            ResourceBody::Deployment(r) => serde_json::to_value(r),
            ResourceBody::StatefulSet(r) => serde_json::to_value(r),
            ResourceBody::DaemonSet(r) => serde_json::to_value(r),
            ResourceBody::Job(r) => serde_json::to_value(r),
            ResourceBody::Service(r) => serde_json::to_value(r),
            ResourceBody::ConfigMap(r) => serde_json::to_value(r),
            ResourceBody::Secret(r) => serde_json::to_value(r),
            ResourceBody::Namespace(r) => serde_json::to_value(r),
            ResourceBody::Generic(r) => serde_json::to_value(r),
        };
        value.ok()
    }
}

/// Plain base64 without padding tricks, used for Secret values and ConfigMap
/// binary data.
pub fn base64_encode(input: &[u8]) -> String {
    const ALPHABET: &[u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

    let mut out = String::with_capacity((input.len() + 2) / 3 * 4);

    for chunk in input.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        out.push(ALPHABET[(triple >> 18) as usize & 0x3f] as char);
        out.push(ALPHABET[(triple >> 12) as usize & 0x3f] as char);
        if chunk.len() > 1 {
            out.push(ALPHABET[(triple >> 6) as usize & 0x3f] as char);
        } else {
            out.push('=');
        }
        if chunk.len() > 2 {
            out.push(ALPHABET[triple as usize & 0x3f] as char);
        } else {
            out.push('=');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_namespace_serializes_under_mapped_name() {
        let m = Metadata {
            name: "web".into(),
            namespace_: "prod".into(),
            labels: BTreeMap::new(),
        };
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["namespace"], "prod");
        assert!(v.get("namespace_").is_none());
    }

    #[test]
    fn deployment_template_round_trips_under_mapped_name() {
        let mut d = Deployment::default();
        d.spec.template_.metadata.name = "pod".into();
        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(v["spec"]["template"]["metadata"]["name"], "pod");

        let back: Deployment = serde_json::from_value(v).unwrap();
        assert_eq!(back.spec.template_.metadata.name, "pod");
    }

    #[test]
    fn service_type_uses_reserved_word() {
        let mut s = Service::default();
        s.spec.type_ = "NodePort".into();
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["spec"]["type"], "NodePort");
    }

    #[test]
    fn base64_matches_known_vectors() {
        assert_eq!(base64_encode(b""), "");
        assert_eq!(base64_encode(b"f"), "Zg==");
        assert_eq!(base64_encode(b"fo"), "Zm8=");
        assert_eq!(base64_encode(b"foo"), "Zm9v");
        assert_eq!(base64_encode(b"foobar"), "Zm9vYmFy");
    }
}
