// src/health/probe.rs
use crate::config::HealthCheckConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use url::Url;

const USER_AGENT: &str = "Health-Checker/1.0";

/// Why a probe judged a service unhealthy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("Request timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },
}

/// What a healthy service told us about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub uptime: f64,
    pub body: Option<Value>,
}

/// Outcome of a single probe. Failures are values, never panics or
/// propagated errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub response_time: Duration,
    pub outcome: std::result::Result<ProbeReport, ProbeError>,
}

impl ProbeResult {
    pub fn is_healthy(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    /// Check the service rooted at `service_url`.
    async fn probe(&self, service_url: &Url) -> ProbeResult;
}

/// Probes `GET <service_url><path>` over HTTP with a hard deadline.
pub struct HttpProbe {
    client: Client,
    timeout: Duration,
    path: String,
}

impl HttpProbe {
    pub fn new(config: &HealthCheckConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            timeout: config.timeout(),
            path: config.path.clone(),
        })
    }

    fn health_url(&self, service_url: &Url) -> String {
        format!("{}{}", service_url.as_str().trim_end_matches('/'), self.path)
    }

    async fn fetch(&self, url: &str) -> std::result::Result<ProbeReport, ProbeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        // Any 2xx counts; an unreadable or non-JSON body only loses the uptime.
        let body = match response.bytes().await {
            Ok(bytes) => serde_json::from_slice::<Value>(&bytes).ok(),
            Err(_) => None,
        };
        let uptime = body
            .as_ref()
            .and_then(|b| b.get("uptime"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);

        Ok(ProbeReport { uptime, body })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, service_url: &Url) -> ProbeResult {
        let url = self.health_url(service_url);
        let start = Instant::now();

        let outcome = match timeout(self.timeout, self.fetch(&url)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        };

        ProbeResult {
            response_time: start.elapsed(),
            outcome,
        }
    }
}
