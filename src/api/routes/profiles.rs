use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::{ApiError, PeriodSelector};
use crate::models::{AggregatedProfile, CandidateMatch, UsageRecord, UsageSummary};

#[derive(Debug, Deserialize)]
pub struct ProfileParams {
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PeriodProfile {
    pub summary: UsageSummary,
    pub record: UsageRecord,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ProfileBody {
    Period(PeriodProfile),
    AllTime(AggregatedProfile),
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub query: String,
    pub requested_period: String,
    pub name: String,
    pub period: String,
    /// The shown profile is for another name or period than requested
    pub substituted: bool,
    pub profile: ProfileBody,
}

pub async fn profile(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ProfileParams>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let selector = PeriodSelector::parse(params.period.as_deref())?;

    let response = match &selector {
        PeriodSelector::AllTime => {
            let resolved = state
                .queries
                .resolve_profile_all_time(&name)?
                .ok_or_else(|| ApiError::NotFound(format!("No profile for {} across all periods", name)))?;
            ProfileResponse {
                query: name,
                requested_period: selector.label().to_string(),
                name: resolved.profile.summary.name.clone(),
                period: selector.label().to_string(),
                substituted: resolved.substituted,
                profile: ProfileBody::AllTime(resolved.profile),
            }
        }
        PeriodSelector::Period(period) => {
            let resolved = state
                .queries
                .resolve_profile(&name, period)?
                .ok_or_else(|| {
                    ApiError::NotFound(format!("No profile for {} in {} or other periods", name, period))
                })?;
            ProfileResponse {
                query: name,
                requested_period: resolved.requested_period,
                name: resolved.name,
                period: resolved.period,
                substituted: resolved.substituted,
                profile: ProfileBody::Period(PeriodProfile {
                    summary: UsageSummary::from(&resolved.record),
                    record: resolved.record,
                }),
            }
        }
    };

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct CandidatesParams {
    pub q: Option<String>,
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CandidatesResponse {
    pub query: String,
    pub candidates: Vec<CandidateMatch>,
}

pub async fn candidates(
    State(state): State<AppState>,
    Query(params): Query<CandidatesParams>,
) -> Result<Json<CandidatesResponse>, ApiError> {
    let query = params.q.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query parameter 'q' is required".to_string()));
    }
    let selector = PeriodSelector::parse(params.period.as_deref())?;

    let candidates = state.queries.candidates(&query, selector.as_period())?;
    Ok(Json(CandidatesResponse { query, candidates }))
}

#[cfg(test)]
mod tests {
    use crate::api::build_router;
    use crate::api::routes::testing::{get_json, setup_test_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_profile_exact() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        let (status, json) = get_json(app, "/api/profile/incineroar?period=2025-03").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["name"], "Incineroar");
        assert_eq!(json["period"], "2025-03");
        assert_eq!(json["substituted"], false);
        assert_eq!(json["profile"]["summary"]["top_item"], "Sitrus Berry");
        assert_eq!(json["profile"]["record"]["usage_fraction"], 0.4);
    }

    #[tokio::test]
    async fn test_profile_falls_back_to_other_period() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        let (status, json) = get_json(app, "/api/profile/Yveltal?period=2025-03").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["period"], "2025-01");
        assert_eq!(json["requested_period"], "2025-03");
        assert_eq!(json["substituted"], true);
    }

    #[tokio::test]
    async fn test_profile_all_time() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        let (status, json) = get_json(app, "/api/profile/flutter%20mane").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["period"], "all");
        assert_eq!(json["profile"]["name"], "Flutter Mane");
        assert_eq!(json["profile"]["period_count"], 1);
    }

    #[tokio::test]
    async fn test_profile_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(setup_test_state(tmp.path()));

        let (status, json) = get_json(app, "/api/profile/qqqqqq?period=2025-01").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        let state = setup_test_state(tmp.path());

        let (status, json) = get_json(build_router(state.clone()), "/api/candidates?q=fluter%20mane").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["candidates"][0]["name"], "Flutter Mane");
        assert_eq!(json["candidates"][0]["kind"], "fuzzy");

        let (status, _) = get_json(build_router(state), "/api/candidates?q=").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
