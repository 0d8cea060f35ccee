// src/k8s/proxy.rs

use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// Handle for a running `kubectl proxy` process.
///
/// The child is killed when the handle drops, closing the port-forward.
#[derive(Debug)]
pub struct ProxyHandle {
    _child: Child,
    port: u16,
}

impl ProxyHandle {
    /// Local port the proxy is serving on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Base URL for API requests through this proxy.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

/// Start `kubectl proxy` for the given kubeconfig and wait until it reports
/// its listen address on stdout.
///
/// `kubectl proxy --port 0` picks a free port and prints a line like
/// `Starting to serve on 127.0.0.1:42113`; we parse the port out of that.
pub async fn start_proxy(kubeconfig: &str) -> Result<ProxyHandle> {
    let mut cmd = Command::new("kubectl");
    cmd.arg("proxy").arg("--port").arg("0");

    if !kubeconfig.is_empty() {
        cmd.arg("--kubeconfig").arg(kubeconfig);
    }

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .context("spawning kubectl proxy (is kubectl on PATH?)")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("kubectl proxy stdout not captured"))?;

    let mut lines = BufReader::new(stdout).lines();
    let line = lines
        .next_line()
        .await
        .context("reading kubectl proxy startup line")?
        .ok_or_else(|| anyhow!("kubectl proxy exited before reporting its port"))?;

    let port = parse_proxy_port(&line)
        .ok_or_else(|| anyhow!("could not parse proxy port from: {line}"))?;

    // Keep draining stdout so the child never blocks on a full pipe.
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("kubectl proxy: {line}");
        }
    });

    info!(port, "kubectl proxy started");

    Ok(ProxyHandle {
        _child: child,
        port,
    })
}

fn parse_proxy_port(line: &str) -> Option<u16> {
    let after_colon = line.rsplit(':').next()?;
    after_colon.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_startup_line() {
        assert_eq!(
            parse_proxy_port("Starting to serve on 127.0.0.1:42113"),
            Some(42113)
        );
        assert_eq!(parse_proxy_port("garbage"), None);
    }
}
