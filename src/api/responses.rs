// src/api/responses.rs
//! JSON bodies served by the status API.

use super::error::ApiError;
use crate::health::{CheckerState, ServiceHealth, ServiceId, Services};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const AVAILABLE_ENDPOINTS: [&str; 5] = [
    "/api/status",
    "/api/health-report",
    "/api/force-check",
    "/api/set-recommendation",
    "/health",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub recommendation: ServiceId,
    pub should_use_backup: bool,
    pub check_count: u64,
    pub uptime: i64,
    pub timestamp: DateTime<Utc>,
    pub health_checker: CheckerInfo,
    pub services: ServiceViews,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckerInfo {
    pub server: String,
    pub uptime: i64,
    pub check_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceViews {
    pub primary: ServiceView,
    pub backup: ServiceView,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceView {
    #[serde(flatten)]
    pub health: ServiceHealth,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub health_checker: ReportInfo,
    pub current_recommendation: ServiceId,
    pub services: Services,
    pub urls: Urls,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInfo {
    pub status: &'static str,
    pub server: String,
    pub uptime: i64,
    pub check_count: u64,
    pub check_interval: u64,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Urls {
    pub primary: String,
    pub backup: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceCheckResponse {
    pub message: &'static str,
    pub check_count: u64,
    pub current_recommendation: ServiceId,
    pub timestamp: DateTime<Utc>,
    pub status: StatusResponse,
}

#[derive(Debug, Default, Deserialize)]
pub struct SetRecommendationRequest {
    #[serde(default)]
    pub recommendation: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRecommendationResponse {
    pub message: String,
    pub old_recommendation: ServiceId,
    pub new_recommendation: ServiceId,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessResponse {
    pub status: &'static str,
    pub server: String,
    pub uptime: i64,
    pub role: &'static str,
    pub check_count: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub server: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_endpoints: Option<Vec<&'static str>>,
}

impl ErrorBody {
    pub fn new(error: &ApiError, server: &str) -> Self {
        let (path, available_endpoints) = match error {
            ApiError::NotFound(path) => (Some(path.clone()), Some(AVAILABLE_ENDPOINTS.to_vec())),
            _ => (None, None),
        };

        Self {
            error: error.to_string(),
            server: server.to_string(),
            timestamp: Utc::now(),
            path,
            available_endpoints,
        }
    }
}

impl StatusResponse {
    pub fn from_state(state: &CheckerState, server: &str, urls: &Urls, now: DateTime<Utc>) -> Self {
        let uptime = state.uptime_secs(now);
        let recommendation = state.recommendation();

        Self {
            recommendation,
            should_use_backup: recommendation == ServiceId::Backup,
            check_count: state.check_count(),
            uptime,
            timestamp: now,
            health_checker: CheckerInfo {
                server: server.to_string(),
                uptime,
                check_count: state.check_count(),
            },
            services: ServiceViews {
                primary: ServiceView {
                    health: state.service(ServiceId::Primary).clone(),
                    url: urls.primary.clone(),
                },
                backup: ServiceView {
                    health: state.service(ServiceId::Backup).clone(),
                    url: urls.backup.clone(),
                },
            },
        }
    }
}
