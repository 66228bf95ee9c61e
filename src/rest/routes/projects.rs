// rest/routes/projects.rs — Tracked-project routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::activity;
use crate::github::parse_repo_ref;
use crate::refresh::ProjectSample;
use crate::store::TrackedProject;
use crate::AppContext;

/// Join a stored project with its latest snapshot into the response shape.
/// Status, streak, and recency are derived from the current clock, not the
/// snapshot's.
fn project_view(
    project: &TrackedProject,
    sample: Option<&ProjectSample>,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Value {
    let last_commit = sample.and_then(|s| s.last_commit);
    let daily = sample.map(|s| s.daily.as_slice()).unwrap_or_default();
    json!({
        "id": project.id,
        "name": project.name,
        "repoUrl": project.repo_url,
        "owner": project.owner,
        "repo": project.repo,
        "username": project.username,
        "addedAt": project.added_at,
        "status": activity::classify(now, last_commit),
        "streak": activity::streak(today, daily),
        "lastCommit": last_commit.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
        "recency": activity::describe_recency(now, last_commit),
        "daily": daily,
        "degraded": sample.map(|s| s.last_commit_degraded || s.daily_degraded).unwrap_or(false),
        "sampledAt": sample.map(|s| s.sampled_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
    })
}

pub async fn list_projects(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let now = Utc::now();
    let today = now.date_naive();

    let projects = ctx.store.list().await;
    let mut list = Vec::with_capacity(projects.len());
    for project in &projects {
        let sample = ctx.refresher.snapshot(&project.id).await;
        list.push(project_view(project, sample.as_ref(), now, today));
    }
    Json(json!({ "projects": list }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddProjectRequest {
    pub repo_url: String,
    pub name: Option<String>,
    pub username: Option<String>,
}

pub async fn add_project(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<AddProjectRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let Some(reference) = parse_repo_ref(body.repo_url.trim()) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Enter a valid GitHub repo URL or \"owner/repo\"" })),
        ));
    };

    let project = TrackedProject::new(&reference, body.name, body.username);
    let stored = ctx.store.add(project).await;

    // Warm the snapshot without holding up the response.
    {
        let refresher = ctx.refresher.clone();
        let project = stored.clone();
        tokio::spawn(async move {
            refresher.sample_project(&project, false).await;
        });
    }

    Ok((StatusCode::CREATED, Json(json!(stored))))
}

pub async fn remove_project(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    if !ctx.store.remove(&id).await {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Project not found" })),
        ));
    }
    ctx.refresher.evict(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Awaited fresh sample of both queries; returns the updated view.
pub async fn refresh_project(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(project) = ctx.store.get(&id).await else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Project not found" })),
        ));
    };

    let sample = ctx.refresher.sample_project(&project, true).await;
    let now = Utc::now();
    Ok(Json(project_view(
        &project,
        Some(&sample),
        now,
        now.date_naive(),
    )))
}
