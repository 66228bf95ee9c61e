use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::SecondsFormat;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::rest::require_repo;
use crate::AppContext;

#[derive(Deserialize)]
pub struct LastCommitParams {
    pub owner: Option<String>,
    pub repo: Option<String>,
}

/// `GET /last-commit?owner=&repo=` — `{"iso": string|null}`. Upstream
/// failure answers 200 with `{"iso": null}`.
pub async fn last_commit(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<LastCommitParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let (owner, repo) = require_repo(&params.owner, &params.repo)?;

    let sample = ctx.refresher.cache().latest_commit(owner, repo, false).await;
    let iso = sample
        .value
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));
    Ok(Json(json!({ "iso": iso })))
}
