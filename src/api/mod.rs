// src/api/mod.rs
//! Status API: read-only views of the checker state plus the force-check and
//! manual-override controls.

mod error;
mod responses;

pub use error::ApiError;
pub use responses::*;

use crate::health::{HealthChecker, ServiceId};
use chrono::Utc;
use hyper::body::HttpBody;
use hyper::header::{self, HeaderValue};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Largest request body accepted by the control endpoints.
const MAX_BODY_BYTES: usize = 16 * 1024;

pub struct StatusApi {
    checker: Arc<HealthChecker>,
    server_name: String,
}

impl StatusApi {
    pub fn new(checker: Arc<HealthChecker>, server_name: impl Into<String>) -> Self {
        Self {
            checker,
            server_name: server_name.into(),
        }
    }

    fn urls(&self) -> Urls {
        let targets = self.checker.targets();
        Urls {
            primary: display_url(targets.url(ServiceId::Primary)),
            backup: display_url(targets.url(ServiceId::Backup)),
        }
    }

    pub async fn status(&self) -> StatusResponse {
        let state = self.checker.snapshot().await;
        StatusResponse::from_state(&state, &self.server_name, &self.urls(), Utc::now())
    }

    pub async fn health_report(&self) -> HealthReport {
        let state = self.checker.snapshot().await;
        let now = Utc::now();

        HealthReport {
            health_checker: ReportInfo {
                status: "healthy",
                server: self.server_name.clone(),
                uptime: state.uptime_secs(now),
                check_count: state.check_count(),
                check_interval: self.checker.config().interval_ms,
                start_time: state.started_at(),
            },
            current_recommendation: state.recommendation(),
            services: state.services().clone(),
            urls: self.urls(),
        }
    }

    /// Run one check cycle and report the refreshed state.
    pub async fn force_check(&self) -> ForceCheckResponse {
        info!("Forcing health check");
        let report = self.checker.run_once().await;
        let status = self.status().await;

        ForceCheckResponse {
            message: "Health check forced",
            check_count: report.check_count,
            current_recommendation: report.evaluation.recommendation,
            timestamp: Utc::now(),
            status,
        }
    }

    /// Override the recommendation. `raw` must be `"primary"` or `"backup"`;
    /// anything else is rejected without touching the state.
    pub async fn set_recommendation(
        &self,
        raw: &str,
    ) -> Result<SetRecommendationResponse, ApiError> {
        let requested: ServiceId = raw
            .parse()
            .map_err(|_| ApiError::InvalidArgument(raw.to_string()))?;

        let previous = self.checker.set_recommendation(requested).await;

        Ok(SetRecommendationResponse {
            message: format!(
                "Recommendation changed from {} to {}",
                previous, requested
            ),
            old_recommendation: previous,
            new_recommendation: requested,
            timestamp: Utc::now(),
        })
    }

    pub async fn liveness(&self) -> LivenessResponse {
        let state = self.checker.snapshot().await;
        let now = Utc::now();

        LivenessResponse {
            status: "healthy",
            server: self.server_name.clone(),
            uptime: state.uptime_secs(now),
            role: "health-checker",
            check_count: state.check_count(),
            timestamp: now,
        }
    }

    /// Route an HTTP request. Errors are rendered as JSON responses, so this
    /// never fails.
    pub async fn handle(&self, req: Request<Body>) -> Response<Body> {
        debug!(method = %req.method(), path = %req.uri().path(), "api request");

        let mut response = match self.route(req).await {
            Ok(response) => response,
            Err(err) => err.into_response(&self.server_name),
        };
        apply_cors(&mut response);
        response
    }

    async fn route(&self, req: Request<Body>) -> Result<Response<Body>, ApiError> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        if method == Method::OPTIONS {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::NO_CONTENT;
            return Ok(response);
        }

        match (&method, path.as_str()) {
            (&Method::GET, "/api/status") => json(StatusCode::OK, &self.status().await),
            (&Method::GET, "/api/health-report") => {
                json(StatusCode::OK, &self.health_report().await)
            }
            (&Method::POST, "/api/force-check") => json(StatusCode::OK, &self.force_check().await),
            (&Method::POST, "/api/set-recommendation") => {
                let request = read_override(req).await?;
                let raw = match &request.recommendation {
                    Some(serde_json::Value::String(value)) => value.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                json(StatusCode::OK, &self.set_recommendation(&raw).await?)
            }
            (&Method::GET, "/health") => json(StatusCode::OK, &self.liveness().await),
            (_, known) if AVAILABLE_ENDPOINTS.contains(&known) => Err(ApiError::MethodNotAllowed {
                method: method.to_string(),
                path: path.clone(),
            }),
            _ => Err(ApiError::NotFound(path.clone())),
        }
    }
}

/// Read the override body, giving up as soon as it is known to exceed
/// `MAX_BODY_BYTES`. An empty body reads as a request with no value.
async fn read_override(req: Request<Body>) -> Result<SetRecommendationRequest, ApiError> {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);
    let mut body = req.into_body();

    if declared.max(body.size_hint().lower()) > MAX_BODY_BYTES as u64 {
        return Err(body_too_large());
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.map_err(|e| ApiError::MalformedBody(e.to_string()))?;
        if bytes.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(body_too_large());
        }
        bytes.extend_from_slice(&chunk);
    }

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(SetRecommendationRequest::default());
    }

    serde_json::from_slice(&bytes)
        .map_err(|_| ApiError::InvalidArgument(String::from_utf8_lossy(&bytes).into_owned()))
}

fn body_too_large() -> ApiError {
    ApiError::MalformedBody(format!("body exceeds {} bytes", MAX_BODY_BYTES))
}

fn json<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<Body>, ApiError> {
    let payload = serde_json::to_vec(body).map_err(|e| ApiError::Internal(e.to_string()))?;

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload))
        .map_err(|e| ApiError::Internal(e.to_string()))
}

fn apply_cors(response: &mut Response<Body>) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

fn display_url(url: &url::Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}
