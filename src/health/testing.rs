// src/health/testing.rs
//! Scriptable in-process probe for exercising the checker without sockets.

use super::probe::{Probe, ProbeError, ProbeReport, ProbeResult};
use super::ServiceId;
use crate::config::{HealthCheckConfig, TargetsConfig};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use url::Url;

pub fn targets() -> TargetsConfig {
    TargetsConfig {
        primary: Url::parse("http://primary.test").unwrap(),
        backup: Url::parse("http://backup.test").unwrap(),
    }
}

pub fn check_config(interval_ms: u64) -> HealthCheckConfig {
    HealthCheckConfig {
        interval_ms,
        ..HealthCheckConfig::default()
    }
}

#[derive(Default)]
pub struct FakeProbe {
    primary_up: AtomicBool,
    backup_up: AtomicBool,
    delay: Mutex<Duration>,
    slow: Mutex<Option<(ServiceId, Duration)>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeProbe {
    pub fn new(primary_up: bool, backup_up: bool) -> Self {
        let probe = Self::default();
        probe.set(ServiceId::Primary, primary_up);
        probe.set(ServiceId::Backup, backup_up);
        probe
    }

    pub fn set(&self, service: ServiceId, up: bool) {
        match service {
            ServiceId::Primary => self.primary_up.store(up, Ordering::SeqCst),
            ServiceId::Backup => self.backup_up.store(up, Ordering::SeqCst),
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Extra latency for a single service, on top of `set_delay`.
    pub fn slow_down(&self, service: ServiceId, extra: Duration) {
        *self.slow.lock().unwrap() = Some((service, extra));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for FakeProbe {
    async fn probe(&self, service_url: &Url) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let service = if service_url.host_str() == Some("primary.test") {
            ServiceId::Primary
        } else {
            ServiceId::Backup
        };

        let mut delay = *self.delay.lock().unwrap();
        if let Some((slow, extra)) = *self.slow.lock().unwrap() {
            if slow == service {
                delay += extra;
            }
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let up = match service {
            ServiceId::Primary => self.primary_up.load(Ordering::SeqCst),
            ServiceId::Backup => self.backup_up.load(Ordering::SeqCst),
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        ProbeResult {
            response_time: delay,
            outcome: if up {
                Ok(ProbeReport {
                    uptime: 60.0,
                    body: Some(serde_json::json!({ "status": "healthy", "uptime": 60 })),
                })
            } else {
                Err(ProbeError::Network("connection refused".to_string()))
            },
        }
    }
}
