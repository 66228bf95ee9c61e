use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::activity::{clamp_days, DailyBucket};
use crate::rest::require_repo;
use crate::AppContext;

#[derive(Deserialize)]
pub struct DailyParams {
    pub owner: Option<String>,
    pub repo: Option<String>,
    /// Kept as a raw string: anything unparseable falls back to the default
    /// window instead of failing the request.
    pub days: Option<String>,
}

/// `GET /daily?owner=&repo=&days=` — exactly `days` `{date, count}` entries
/// in chronological order. Upstream failure still answers 200 with the
/// zero-filled window.
pub async fn daily(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<DailyParams>,
) -> Result<Json<Vec<DailyBucket>>, (StatusCode, Json<Value>)> {
    let (owner, repo) = require_repo(&params.owner, &params.repo)?;
    let days = clamp_days(params.days.as_deref());

    let sample = ctx
        .refresher
        .cache()
        .daily_buckets(owner, repo, days, false)
        .await;
    Ok(Json(sample.value))
}
