// rest/mod.rs — Local REST API server.
//
// Axum HTTP server on {bind_address}:{port} (default 127.0.0.1:4310).
//
// Endpoints:
//   GET    /daily?owner=&repo=&days=     proxy: daily commit histogram
//   GET    /last-commit?owner=&repo=     proxy: newest commit instant
//   GET    /projects                     tracked projects + derived activity
//   POST   /projects                     track a repository
//   DELETE /projects/{id}
//   POST   /projects/{id}/refresh        awaited fresh sample
//   GET    /health

pub mod routes;

use anyhow::Result;
use axum::{
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        // Proxy surface over the GitHub API
        .route("/daily", get(routes::daily::daily))
        .route("/last-commit", get(routes::last_commit::last_commit))
        // Tracked projects
        .route(
            "/projects",
            get(routes::projects::list_projects).post(routes::projects::add_project),
        )
        .route("/projects/{id}", delete(routes::projects::remove_project))
        .route(
            "/projects/{id}/refresh",
            post(routes::projects::refresh_project),
        )
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Shared query validation for the two proxy endpoints: both `owner` and
/// `repo` must be present and non-empty.
pub(crate) fn require_repo<'a>(
    owner: &'a Option<String>,
    repo: &'a Option<String>,
) -> Result<(&'a str, &'a str), (StatusCode, Json<Value>)> {
    match (owner.as_deref(), repo.as_deref()) {
        (Some(o), Some(r)) if !o.is_empty() && !r.is_empty() => Ok((o, r)),
        _ => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Missing owner or repo" })),
        )),
    }
}
