// src/config/models.rs
use crate::health::ServiceId;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub targets: TargetsConfig,
    pub health_check: HealthCheckConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Name reported by every API response.
    pub name: String,
}

/// Base URLs of the two monitored services. Probes go to `<url>/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsConfig {
    pub primary: Url,
    pub backup: Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub path: String,
}

impl TargetsConfig {
    pub fn url(&self, service: ServiceId) -> &Url {
        match service {
            ServiceId::Primary => &self.primary,
            ServiceId::Backup => &self.backup,
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_ms: super::DEFAULT_CHECK_INTERVAL_MS,
            timeout_ms: super::DEFAULT_PROBE_TIMEOUT_MS,
            path: "/health".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [("primary", &self.targets.primary), ("backup", &self.targets.backup)] {
            if !matches!(url.scheme(), "http" | "https") {
                bail!("{} target must be an http(s) URL, got {}", name, url);
            }
        }

        if self.health_check.interval_ms == 0 {
            bail!("health_check.interval_ms must be greater than zero");
        }
        if self.health_check.timeout_ms == 0 {
            bail!("health_check.timeout_ms must be greater than zero");
        }
        if !self.health_check.path.starts_with('/') {
            bail!("health_check.path must start with '/'");
        }

        if self.metrics.enabled {
            if self.metrics.port == self.server.port {
                bail!(
                    "metrics.port ({}) must differ from server.port",
                    self.metrics.port
                );
            }
            if !self.metrics.path.starts_with('/') {
                bail!("metrics.path must start with '/'");
            }
        }

        Ok(())
    }
}
