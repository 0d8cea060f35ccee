// src/k8s/client.rs

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::ClusterEvent;
use crate::k8s::event::WatchEnvelope;

/// HTTP method subset the drivers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

/// One request a driver wants performed against the cluster.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

/// How a dispatched request ended, as seen by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome {
    /// The server answered; the status code decides success.
    Status(u16),
    /// The request never produced a response (connect/reset/decode).
    Transport(String),
}

/// Response to a probe request: status plus body for driver interpretation.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

/// Thin wrapper over `reqwest` bound to one cluster's proxy endpoint.
///
/// The inner client is built without a global timeout so the watch stream can
/// stay open indefinitely.
#[derive(Debug, Clone)]
pub struct K8sClient {
    http: reqwest::Client,
}

impl K8sClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("building HTTP client")?;
        Ok(Self { http })
    }

    /// Perform a request, returning the response status, or a transport
    /// error description if no response arrived.
    pub async fn perform(&self, request: &HttpRequest) -> HttpOutcome {
        let builder = match request.method {
            HttpMethod::Get => self.http.get(&request.url),
            HttpMethod::Post => self.http.post(&request.url),
            HttpMethod::Delete => self.http.delete(&request.url),
        };

        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        match builder.send().await {
            Ok(response) => HttpOutcome::Status(response.status().as_u16()),
            Err(err) => HttpOutcome::Transport(err.to_string()),
        }
    }

    /// Perform a probe request and keep the body for interpretation.
    pub async fn probe(&self, request: &HttpRequest) -> std::result::Result<ProbeResponse, String> {
        let response = self
            .http
            .get(&request.url)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(ProbeResponse { status, body })
    }
}

/// Open the long-lived event watch and forward every decoded event into the
/// cluster's runtime channel.
///
/// This is fire-and-forget: it spawns a background task that lives until the
/// stream or the channel closes, then reports `WatchClosed`.
pub fn spawn_event_watch(
    client: K8sClient,
    base_url: String,
    runtime_tx: mpsc::Sender<ClusterEvent>,
) {
    tokio::spawn(async move {
        let url = format!("{base_url}/api/v1/events");
        info!(url = %url, "opening cluster event watch");

        let error = watch_loop(&client, &url, &runtime_tx).await.err();
        if let Some(ref e) = error {
            warn!(error = %e, "event watch terminated");
        }

        let _ = runtime_tx.send(ClusterEvent::WatchClosed { error }).await;
    });
}

async fn watch_loop(
    client: &K8sClient,
    url: &str,
    runtime_tx: &mpsc::Sender<ClusterEvent>,
) -> std::result::Result<(), String> {
    let response = client
        .http
        .get(url)
        .query(&[("watch", "true")])
        .header("X-Client", "k8deployer")
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("watch request failed: HTTP {}", response.status()));
    }

    // The stream is newline-delimited JSON; chunks do not align with lines,
    // so buffer and split ourselves.
    let mut stream = response.bytes_stream();
    let mut buffer = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        buffer.extend_from_slice(&chunk);

        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            let line = &line[..line.len() - 1];
            if line.is_empty() {
                continue;
            }

            match serde_json::from_slice::<WatchEnvelope>(line) {
                Ok(envelope) => {
                    debug!(
                        event = %envelope.object.metadata.name,
                        reason = %envelope.object.reason,
                        "got cluster event"
                    );
                    if runtime_tx
                        .send(ClusterEvent::Watch(Box::new(envelope.object)))
                        .await
                        .is_err()
                    {
                        // Runtime is gone; nothing left to feed.
                        return Ok(());
                    }
                }
                Err(err) => {
                    warn!(error = %err, "undecodable watch line; skipping");
                }
            }
        }
    }

    Ok(())
}
