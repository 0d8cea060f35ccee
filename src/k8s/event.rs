// src/k8s/event.rs

//! The event objects delivered by `GET /api/v1/events?watch=true`.

use serde::Deserialize;

use crate::k8s::api::Metadata;

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectReference {
    pub kind: String,
    pub name: String,

    #[serde(rename = "namespace")]
    pub namespace_: String,
}

/// A single Kubernetes `Event` object from the watch stream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchedEvent {
    pub metadata: Metadata,
    pub involved_object: ObjectReference,
    pub reason: String,
    pub message: String,

    #[serde(rename = "type")]
    pub type_: String,
}

/// One line of the watch response: `{"type": "ADDED", "object": {...}}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WatchEnvelope {
    #[serde(rename = "type")]
    pub type_: String,
    pub object: WatchedEvent,
}
