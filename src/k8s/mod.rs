// src/k8s/mod.rs

//! Kubernetes API surface consumed by the engine.
//!
//! - [`api`] models the resource bodies we POST, with the reserved-word
//!   field remaps (`namespace`, `template`, `operator`, `continue`).
//! - [`event`] models the objects delivered by the watch stream.
//! - [`client`] wraps the HTTP client and the long-lived event watch.
//! - [`proxy`] manages the local `kubectl proxy` port-forward process.

pub mod api;
pub mod client;
pub mod event;
pub mod proxy;

pub use api::{Metadata, ResourceBody};
pub use client::{HttpMethod, HttpOutcome, HttpRequest, K8sClient, ProbeResponse};
pub use event::{WatchEnvelope, WatchedEvent};
pub use proxy::{start_proxy, ProxyHandle};
