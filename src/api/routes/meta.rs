use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::aggregate::MetaDimension;
use crate::api::state::AppState;
use crate::api::{ApiError, Limit, PeriodSelector};
use crate::models::LabelCount;

#[derive(Debug, Deserialize)]
pub struct MetaParams {
    pub period: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MetaResponse {
    pub dimension: String,
    pub period: String,
    /// Number of records each label is the top pick of
    pub counts: Vec<LabelCount>,
}

pub async fn meta(
    State(state): State<AppState>,
    Path(dimension): Path<String>,
    Query(params): Query<MetaParams>,
) -> Result<Json<MetaResponse>, ApiError> {
    let dimension: MetaDimension = dimension.parse().map_err(ApiError::BadRequest)?;
    let selector = PeriodSelector::parse(params.period.as_deref())?;
    let limit = Limit::new(params.limit);

    let counts = state
        .queries
        .top_value_counts(dimension, selector.as_period(), limit.0)?;

    Ok(Json(MetaResponse {
        dimension: dimension.to_string(),
        period: selector.label().to_string(),
        counts,
    }))
}
