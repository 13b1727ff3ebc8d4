use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::{ApiError, Limit, PeriodSelector};
use crate::models::{AggregatedProfile, UsageSummary};

#[derive(Debug, Serialize)]
pub struct PeriodsResponse {
    pub periods: Vec<String>,
}

pub async fn list_periods(
    State(state): State<AppState>,
) -> Result<Json<PeriodsResponse>, ApiError> {
    let periods = state.queries.list_periods()?;
    Ok(Json(PeriodsResponse { periods }))
}

#[derive(Debug, Deserialize)]
pub struct NamesParams {
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NamesResponse {
    pub period: String,
    pub names: Vec<String>,
}

pub async fn list_names(
    State(state): State<AppState>,
    Query(params): Query<NamesParams>,
) -> Result<Json<NamesResponse>, ApiError> {
    let selector = PeriodSelector::parse(params.period.as_deref())?;
    let names = state.queries.list_names(selector.as_period())?;
    Ok(Json(NamesResponse {
        period: selector.label().to_string(),
        names,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UsageParams {
    pub period: Option<String>,
    pub limit: Option<usize>,
}

/// Ranked rows: per-record summaries for a period, rollups for all time.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UsageRows {
    Period(Vec<UsageSummary>),
    AllTime(Vec<AggregatedProfile>),
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub period: String,
    pub rows: UsageRows,
}

pub async fn usage(
    State(state): State<AppState>,
    Query(params): Query<UsageParams>,
) -> Result<Json<UsageResponse>, ApiError> {
    let selector = PeriodSelector::parse(params.period.as_deref())?;
    let limit = Limit::new(params.limit);

    let rows = match &selector {
        PeriodSelector::AllTime => UsageRows::AllTime(state.queries.top_n_all_time(limit.0)?),
        PeriodSelector::Period(period) => {
            if !state.queries.list_periods()?.contains(period) {
                return Err(ApiError::NotFound(format!("Period {}", period)));
            }
            let records = state.queries.top_n(period, limit.0)?;
            UsageRows::Period(records.iter().map(UsageSummary::from).collect())
        }
    };

    Ok(Json(UsageResponse {
        period: selector.label().to_string(),
        rows,
    }))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::routes::testing::{get_json, setup_test_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_list_periods() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        let (status, json) = get_json(app, "/api/periods").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["periods"], serde_json::json!(["2025-01", "2025-03"]));
    }

    #[tokio::test]
    async fn test_list_names_by_period() {
        let tmp = tempfile::tempdir().unwrap();
        let state = setup_test_state(tmp.path());

        let (status, json) = get_json(build_router(state.clone()), "/api/names?period=2025-03").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["names"], serde_json::json!(["Flutter Mane", "Incineroar"]));

        let (_, json) = get_json(build_router(state), "/api/names").await;
        assert_eq!(json["period"], "all");
        assert_eq!(json["names"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_usage_for_period() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        let (status, json) = get_json(app, "/api/usage?period=2025-01&limit=2").await;

        assert_eq!(status, StatusCode::OK);
        let rows = json["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Incineroar");
        assert_eq!(rows[0]["usage_pct"], 50.0);
        assert_eq!(rows[0]["item_pct"], 50.0);
        assert_eq!(rows[0]["moves"][0]["name"], "Protect");
    }

    #[tokio::test]
    async fn test_usage_all_time() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        let (status, json) = get_json(app, "/api/usage?period=all").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["period"], "all");
        let rows = json["rows"].as_array().unwrap();
        assert_eq!(rows[0]["name"], "Incineroar");
        assert_eq!(rows[0]["usage_pct"], 45.0);
        assert_eq!(rows[0]["period_count"], 2);
    }

    #[tokio::test]
    async fn test_usage_unknown_period() {
        let tmp = tempfile::tempdir().unwrap();
        let state = setup_test_state(tmp.path());

        let (status, json) = get_json(build_router(state.clone()), "/api/usage?period=2024-01").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");

        let (status, _) = get_json(build_router(state), "/api/usage?period=January").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        let (status, json) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }
}
