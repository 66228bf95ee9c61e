//! Persisted list of tracked projects.
//!
//! One JSON array at `{data_dir}/projects.json` — the whole system has a
//! single list. Corrupt or missing state loads as an empty list; write
//! failures are logged and swallowed, never surfaced to the caller.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::github::RepoRef;

const STORE_FILE: &str = "projects.json";

/// A repository the user is watching. Serialized in camelCase — the on-disk
/// document is the same shape the web client persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedProject {
    pub id: String,
    pub name: String,
    pub repo_url: String,
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub added_at: String,
}

impl TrackedProject {
    /// Create a project from a parsed reference. `name` defaults to
    /// `owner/repo`; the browse URL is normalized from the reference.
    pub fn new(reference: &RepoRef, name: Option<String>, username: Option<String>) -> Self {
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{}/{}", reference.owner, reference.repo));
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            repo_url: reference.html_url(),
            owner: reference.owner.clone(),
            repo: reference.repo.clone(),
            username: username.filter(|u| !u.trim().is_empty()),
            added_at: Utc::now().to_rfc3339(),
        }
    }
}

pub struct ProjectStore {
    path: PathBuf,
    projects: RwLock<Vec<TrackedProject>>,
}

impl ProjectStore {
    /// Open the store at `{data_dir}/projects.json`, loading whatever state
    /// exists. Missing file or unparseable content both start empty.
    pub fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(STORE_FILE);
        let projects = load_from(&path);
        Self {
            path,
            projects: RwLock::new(projects),
        }
    }

    pub async fn list(&self) -> Vec<TrackedProject> {
        self.projects.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<TrackedProject> {
        self.projects.read().await.iter().find(|p| p.id == id).cloned()
    }

    /// Append a project and persist. Returns the stored copy.
    pub async fn add(&self, project: TrackedProject) -> TrackedProject {
        let mut projects = self.projects.write().await;
        projects.push(project.clone());
        self.persist(&projects);
        project
    }

    /// Remove by id. Returns `false` when the id was unknown.
    pub async fn remove(&self, id: &str) -> bool {
        let mut projects = self.projects.write().await;
        let before = projects.len();
        projects.retain(|p| p.id != id);
        let removed = projects.len() != before;
        if removed {
            self.persist(&projects);
        }
        removed
    }

    /// Write the list to disk. Failures (quota, permissions, serialization)
    /// are logged and swallowed.
    fn persist(&self, projects: &[TrackedProject]) {
        let json = match serde_json::to_string_pretty(projects) {
            Ok(j) => j,
            Err(e) => {
                warn!(err = %e, "failed to serialize project list — save skipped");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, json) {
            warn!(path = %self.path.display(), err = %e, "failed to save project list");
        }
    }
}

fn load_from(path: &Path) -> Vec<TrackedProject> {
    let raw = match std::fs::read_to_string(path) {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };
    match serde_json::from_str::<Vec<TrackedProject>>(&raw) {
        Ok(projects) => projects,
        Err(e) => {
            warn!(path = %path.display(), err = %e, "unparseable project list — starting empty");
            Vec::new()
        }
    }
}
