// src/api/error.rs
use super::responses::ErrorBody;
use hyper::{Body, Response, StatusCode};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Recommendation must be \"primary\" or \"backup\"")]
    InvalidArgument(String),

    /// The body could not be read or is over the size limit. Bodies that
    /// arrive intact but are not a valid override are `InvalidArgument`.
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Endpoint not found")]
    NotFound(String),

    #[error("Method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("Internal health checker error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidArgument(_) | ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as a JSON error response attributed to `server`.
    pub fn into_response(self, server: &str) -> Response<Body> {
        let status = self.status();
        let body = ErrorBody::new(&self, server);
        let payload = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());

        let mut response = Response::new(Body::from(payload));
        *response.status_mut() = status;
        response.headers_mut().insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("application/json"),
        );
        response
    }
}
