use std::str::FromStr;

use axum::Json;
use axum::extract::{Extension, Query, State};
use chrono::{DateTime, Utc};
use nodeconductor_application::CreationTimeQuery;
use nodeconductor_core::{AppError, UserIdentity};
use nodeconductor_domain::ScopeLevel;
use serde::Deserialize;
use uuid::Uuid;

use crate::dto::{CustomerStatsResponse, QuotaStatsResponse, TimeSegmentResponse};
use crate::error::ApiResult;
use crate::state::AppState;


#[derive(Debug, Default, Deserialize)]
pub struct QuotaStatsParams {
    pub aggregate: Option<String>,
    pub uuid: Option<Uuid>,
}

/// Creation-time histogram parameters; `from` and `to` are unix seconds.
#[derive(Debug, Default, Deserialize)]
pub struct CreationTimeParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub datapoints: Option<u32>,
}

impl CreationTimeParams {
    fn into_query(self, now: DateTime<Utc>) -> Result<CreationTimeQuery, AppError> {
        let defaults = CreationTimeQuery::last_month(now);
        Ok(CreationTimeQuery {
            level: parse_level(self.kind.as_deref())?.unwrap_or(defaults.level),
            from: self
                .from
                .map(timestamp)
                .transpose()?
                .unwrap_or(defaults.from),
            to: self.to.map(timestamp).transpose()?.unwrap_or(defaults.to),
            datapoints: self.datapoints.unwrap_or(defaults.datapoints),
        })
    }
}

pub async fn customer_stats_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
) -> ApiResult<Json<Vec<CustomerStatsResponse>>> {
    let stats = state
        .stats_service
        .customer_stats(&user)
        .await?
        .into_iter()
        .map(CustomerStatsResponse::from)
        .collect();

    Ok(Json(stats))
}

pub async fn quota_stats_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<QuotaStatsParams>,
) -> ApiResult<Json<QuotaStatsResponse>> {
    let aggregate = parse_level(params.aggregate.as_deref())?.unwrap_or(ScopeLevel::Customer);
    let totals = state
        .stats_service
        .quota_stats(&user, aggregate, params.uuid)
        .await?;

    Ok(Json(QuotaStatsResponse::from(totals)))
}

pub async fn creation_time_stats_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(params): Query<CreationTimeParams>,
) -> ApiResult<Json<Vec<TimeSegmentResponse>>> {
    let query = params.into_query(Utc::now())?;
    let segments = state
        .stats_service
        .creation_time_stats(&user, query)
        .await?
        .into_iter()
        .map(TimeSegmentResponse::from)
        .collect();

    Ok(Json(segments))
}

fn parse_level(value: Option<&str>) -> Result<Option<ScopeLevel>, AppError> {
    value
        .filter(|value| !value.trim().is_empty())
        .map(ScopeLevel::from_str)
        .transpose()
}

fn timestamp(seconds: i64) -> Result<DateTime<Utc>, AppError> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| AppError::Validation(format!("timestamp {seconds} is out of range")))
}
