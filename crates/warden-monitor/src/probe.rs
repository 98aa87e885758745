//! Endpoint probes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;
use warden_config::EndpointKind;

use crate::error::ProbeError;
use crate::types::Endpoint;

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;

/// A single reachability check. Timeouts are enforced by the caller.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Endpoint kind this probe handles.
    fn kind(&self) -> EndpointKind;

    /// Probe the endpoint once, returning a short success detail.
    async fn probe(&self, endpoint: &Endpoint) -> Result<String, ProbeError>;
}

/// HTTP GET probe. Any 2xx response is reachable.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Http
    }

    async fn probe(&self, endpoint: &Endpoint) -> Result<String, ProbeError> {
        let response = self
            .client
            .get(&endpoint.target)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProbeError::Connect(e.to_string())
                } else {
                    ProbeError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        debug!("HTTP probe {} -> {}", endpoint.name, status);
        if status.is_success() {
            Ok(format!("HTTP {}", status.as_u16()))
        } else {
            Err(ProbeError::Status(status.as_u16()))
        }
    }
}

/// TCP connect probe.
#[derive(Default)]
pub struct TcpProbe;

#[async_trait]
impl Probe for TcpProbe {
    fn kind(&self) -> EndpointKind {
        EndpointKind::Tcp
    }

    async fn probe(&self, endpoint: &Endpoint) -> Result<String, ProbeError> {
        let stream = TcpStream::connect(&endpoint.target)
            .await
            .map_err(|e| ProbeError::Connect(e.to_string()))?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| endpoint.target.clone());
        Ok(format!("connected to {}", peer))
    }
}

/// Probes keyed by endpoint kind.
#[derive(Clone, Default)]
pub struct ProbeSet {
    probes: HashMap<EndpointKind, Arc<dyn Probe>>,
}

impl ProbeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP and TCP probes.
    pub fn standard() -> Self {
        Self::new()
            .with_probe(Arc::new(HttpProbe::new()))
            .with_probe(Arc::new(TcpProbe))
    }

    /// Register a probe, replacing any existing one for the same kind.
    pub fn with_probe(mut self, probe: Arc<dyn Probe>) -> Self {
        self.probes.insert(probe.kind(), probe);
        self
    }

    pub fn get(&self, kind: EndpointKind) -> Result<&Arc<dyn Probe>, ProbeError> {
        self.probes
            .get(&kind)
            .ok_or_else(|| ProbeError::Unsupported(kind.to_string()))
    }
}
