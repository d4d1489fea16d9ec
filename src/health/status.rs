// src/health/status.rs
use super::probe::ProbeResult;
use crate::recommendation::{self, Evaluation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Identifier of one of the two monitored services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceId {
    Primary,
    Backup,
}

impl ServiceId {
    pub const ALL: [ServiceId; 2] = [ServiceId::Primary, ServiceId::Backup];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Primary => "primary",
            ServiceId::Backup => "backup",
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown service identifier {0:?}")]
pub struct UnknownService(pub String);

impl FromStr for ServiceId {
    type Err = UnknownService;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(ServiceId::Primary),
            "backup" => Ok(ServiceId::Backup),
            other => Err(UnknownService(other.to_string())),
        }
    }
}

/// Health record for one monitored service.
///
/// Invariant: when `is_healthy` is set, `consecutive_failures` is zero and
/// `last_error` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub is_healthy: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    #[serde(rename = "uptime")]
    pub reported_uptime: f64,
    #[serde(serialize_with = "serialize_millis")]
    pub response_time: Duration,
    #[serde(rename = "error")]
    pub last_error: Option<String>,
    /// Body of the last successful `/health` response, if it was JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_data: Option<serde_json::Value>,
}

impl ServiceHealth {
    pub fn unknown() -> Self {
        Self {
            is_healthy: false,
            last_check: None,
            consecutive_failures: 0,
            reported_uptime: 0.0,
            response_time: Duration::ZERO,
            last_error: None,
            server_data: None,
        }
    }

    /// Fold one probe outcome into the record. No I/O; `now` is the probe
    /// completion time.
    pub fn apply(&mut self, result: &ProbeResult, now: DateTime<Utc>) {
        self.last_check = Some(now);
        self.response_time = result.response_time;

        match &result.outcome {
            Ok(report) => {
                self.is_healthy = true;
                self.consecutive_failures = 0;
                self.last_error = None;
                self.reported_uptime = report.uptime;
                self.server_data = report.body.clone();
            }
            Err(error) => {
                // uptime and server_data keep their last known good values
                self.is_healthy = false;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                self.last_error = Some(error.to_string());
            }
        }
    }
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

/// The fixed pair of monitored services.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Services {
    pub primary: ServiceHealth,
    pub backup: ServiceHealth,
}

impl Services {
    pub fn get(&self, id: ServiceId) -> &ServiceHealth {
        match id {
            ServiceId::Primary => &self.primary,
            ServiceId::Backup => &self.backup,
        }
    }

    fn get_mut(&mut self, id: ServiceId) -> &mut ServiceHealth {
        match id {
            ServiceId::Primary => &mut self.primary,
            ServiceId::Backup => &mut self.backup,
        }
    }
}

/// Process-wide checker state. Owned by the `HealthChecker`, which guards it
/// behind a lock; readers get cloned snapshots.
#[derive(Debug, Clone)]
pub struct CheckerState {
    services: Services,
    recommendation: ServiceId,
    check_count: u64,
    started_at: DateTime<Utc>,
}

impl CheckerState {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            services: Services {
                primary: ServiceHealth::unknown(),
                backup: ServiceHealth::unknown(),
            },
            recommendation: ServiceId::Primary,
            check_count: 0,
            started_at,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn service(&self, id: ServiceId) -> &ServiceHealth {
        self.services.get(id)
    }

    pub fn recommendation(&self) -> ServiceId {
        self.recommendation
    }

    pub fn check_count(&self) -> u64 {
        self.check_count
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whole seconds since the state was created, rounded to nearest.
    pub fn uptime_secs(&self, now: DateTime<Utc>) -> i64 {
        let millis = (now - self.started_at).num_milliseconds().max(0);
        (millis + 500) / 1000
    }

    pub fn apply(&mut self, id: ServiceId, result: &ProbeResult, now: DateTime<Utc>) {
        self.services.get_mut(id).apply(result, now);
    }

    /// Close out a check cycle: re-derive the recommendation from the
    /// current service records and count the cycle.
    pub fn finish_cycle(&mut self) -> Evaluation {
        let evaluation = recommendation::evaluate(
            self.recommendation,
            self.services.primary.is_healthy,
            self.services.backup.is_healthy,
        );
        self.recommendation = evaluation.recommendation;
        self.check_count += 1;
        evaluation
    }

    /// Manual override. Returns the previous recommendation.
    pub fn override_recommendation(&mut self, id: ServiceId) -> ServiceId {
        std::mem::replace(&mut self.recommendation, id)
    }
}
