use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::api::state::AppState;
use crate::api::ApiError;

/// Reject requests proxied in from a public tunnel, which always carry this header.
fn require_local(headers: &HeaderMap) -> Result<(), ApiError> {
    if headers.contains_key("cf-connecting-ip") {
        return Err(ApiError::Forbidden(
            "Refresh is only available on localhost".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub status: &'static str,
    /// Cached results dropped by this refresh
    pub cleared: usize,
    /// Periods visible after the refresh
    pub periods: Vec<String>,
}

/// Drop cached query results and report what the store now holds.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, ApiError> {
    require_local(&headers)?;

    let cleared = state.queries.invalidate();
    let periods = state.queries.list_periods()?;
    info!("Query cache refreshed, {} entries cleared", cleared);

    Ok(Json(RefreshResponse {
        status: "ok",
        cleared,
        periods,
    }))
}
