//! REST API endpoints.
//!
//! Axum-based HTTP API over the snapshot store: periods, names, usage rankings,
//! profiles, name candidates and meta distributions, plus a local-only cache refresh.

pub mod routes;
pub mod state;

use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::models::parse_period;
use crate::storage::StorageError;
use state::AppState;

/// Period value selecting the all-time view.
pub const ALL_TIME: &str = "all";

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result-count parameter with bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(pub usize);

impl Limit {
    pub const DEFAULT: usize = 20;
    pub const MAX: usize = 200;

    pub fn new(limit: Option<usize>) -> Self {
        Self(limit.unwrap_or(Self::DEFAULT).clamp(1, Self::MAX))
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// A `period` query parameter: absent or "all" selects the all-time view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodSelector {
    AllTime,
    Period(String),
}

impl PeriodSelector {
    pub fn parse(period: Option<&str>) -> Result<Self, ApiError> {
        match period.map(str::trim) {
            None | Some("") => Ok(PeriodSelector::AllTime),
            Some(p) if p.eq_ignore_ascii_case(ALL_TIME) => Ok(PeriodSelector::AllTime),
            Some(p) => {
                parse_period(p).map_err(|e| ApiError::BadRequest(e.to_string()))?;
                Ok(PeriodSelector::Period(p.to_string()))
            }
        }
    }

    pub fn as_period(&self) -> Option<&str> {
        match self {
            PeriodSelector::AllTime => None,
            PeriodSelector::Period(p) => Some(p),
        }
    }

    pub fn label(&self) -> &str {
        self.as_period().unwrap_or(ALL_TIME)
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods([Method::GET, Method::POST]).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!("Invalid CORS origin {:?}, allowing any", origin);
            layer.allow_origin(Any)
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors_origin);

    Router::new()
        .route("/health", get(health))
        .route("/api/periods", get(routes::usage::list_periods))
        .route("/api/names", get(routes::usage::list_names))
        .route("/api/usage", get(routes::usage::usage))
        .route("/api/profile/:name", get(routes::profiles::profile))
        .route("/api/candidates", get(routes::profiles::candidates))
        .route("/api/meta/:dimension", get(routes::meta::meta))
        .route("/api/refresh", post(routes::refresh::refresh))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
