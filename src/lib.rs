pub mod activity;
pub mod config;
pub mod github;
pub mod refresh;
pub mod rest;
pub mod store;

use std::sync::Arc;

use config::WatchConfig;
use refresh::Refresher;
use store::ProjectStore;

/// Shared application state passed to every REST handler and background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<WatchConfig>,
    /// Persisted list of tracked projects.
    pub store: Arc<ProjectStore>,
    /// Commit sampler: in-flight coalescing, dedupe cache, project snapshots.
    pub refresher: Arc<Refresher>,
    pub started_at: std::time::Instant,
}
