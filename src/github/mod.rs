//! GitHub REST API client and repo reference parsing.
//!
//! The client issues two read-only queries against `/repos/{owner}/{repo}/commits`:
//! the single newest commit (`per_page=1`) and a single page of commits inside
//! a UTC day window (`since`/`until`, `per_page=100` — one page is enough for
//! this scope, no pagination). An optional bearer token raises rate limits;
//! its absence is never an error.
//!
//! Failures are typed here and absorbed by callers: every consumer degrades
//! to a safe default (`None` timestamp, zero-filled histogram) and marks the
//! sample as degraded rather than propagating the error.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::activity::DayWindow;
use crate::config::WatchConfig;

// ─── Repo references ─────────────────────────────────────────────────────────

/// A validated (owner, repo) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Canonical browse URL for the repository.
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.repo)
    }
}

fn strip_git_suffix(repo: &str) -> &str {
    repo.strip_suffix(".git").unwrap_or(repo)
}

/// Parse a user-supplied repo reference.
///
/// Accepts a full URL whose host is exactly `github.com` (owner/repo taken
/// from the first two path segments, trailing `.git` stripped) or a bare
/// `owner/repo` string. Anything else — wrong host, missing segments,
/// malformed URL — yields `None`. No percent-decoding or case folding.
pub fn parse_repo_ref(input: &str) -> Option<RepoRef> {
    if input.contains("http") {
        let url = url::Url::parse(input).ok()?;
        if url.host_str() != Some("github.com") {
            return None;
        }
        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let owner = segments.next()?;
        let repo = segments.next()?;
        Some(RepoRef {
            owner: owner.to_string(),
            repo: strip_git_suffix(repo).to_string(),
        })
    } else {
        let mut parts = input.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
                Some(RepoRef {
                    owner: owner.to_string(),
                    repo: strip_git_suffix(repo).to_string(),
                })
            }
            _ => None,
        }
    }
}

// ─── Errors & samples ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("GitHub API returned {status} for {url}")]
    Status { status: StatusCode, url: String },
    #[error("GitHub API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A fetched value that remembers whether it is live upstream data or a safe
/// default substituted after an upstream failure. The REST proxy collapses
/// both to the same payload; `/projects` surfaces the distinction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample<T> {
    pub value: T,
    pub degraded: bool,
}

impl<T> Sample<T> {
    pub fn live(value: T) -> Self {
        Self {
            value,
            degraded: false,
        }
    }

    pub fn fallback(value: T) -> Self {
        Self {
            value,
            degraded: true,
        }
    }
}

// ─── Commit source ───────────────────────────────────────────────────────────

/// Upstream commit queries, abstracted so the refresher and tests can run
/// against a fake.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Instant of the newest commit, or `None` when the repo has no commits
    /// (or the response carries no usable timestamp).
    async fn latest_commit(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<DateTime<Utc>>, GithubError>;

    /// Timestamps of all commits inside the window, one page of up to 100.
    /// Malformed entries are skipped, never an error.
    async fn commits_in_window(
        &self,
        owner: &str,
        repo: &str,
        window: &DayWindow,
    ) -> Result<Vec<DateTime<Utc>>, GithubError>;
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(config: &WatchConfig) -> anyhow::Result<Self> {
        use anyhow::Context as _;
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.github_token.clone(),
        })
    }

    fn commits_url(&self, owner: &str, repo: &str) -> String {
        format!("{}/repos/{owner}/{repo}/commits", self.base_url)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header(
                "User-Agent",
                format!("repowatchd/{}", env!("CARGO_PKG_VERSION")),
            );
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn fetch_commits(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Value>, GithubError> {
        let res = self.get(url).query(query).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(GithubError::Status {
                status,
                url: url.to_string(),
            });
        }
        let body: Value = res.json().await?;
        // A non-array body (e.g. an error object that slipped through with a
        // 2xx) is tolerated as "no commits".
        Ok(body.as_array().cloned().unwrap_or_default())
    }
}

/// Pull the commit instant out of one raw commit object: author date first,
/// committer date as fallback. Missing or malformed values yield `None`.
pub fn extract_timestamp(entry: &Value) -> Option<DateTime<Utc>> {
    let iso = entry
        .pointer("/commit/author/date")
        .and_then(Value::as_str)
        .or_else(|| entry.pointer("/commit/committer/date").and_then(Value::as_str))?;
    DateTime::parse_from_rfc3339(iso)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[async_trait]
impl CommitSource for GithubClient {
    async fn latest_commit(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<DateTime<Utc>>, GithubError> {
        let url = self.commits_url(owner, repo);
        let commits = self
            .fetch_commits(&url, &[("per_page", "1".to_string())])
            .await?;
        Ok(commits.first().and_then(extract_timestamp))
    }

    async fn commits_in_window(
        &self,
        owner: &str,
        repo: &str,
        window: &DayWindow,
    ) -> Result<Vec<DateTime<Utc>>, GithubError> {
        let url = self.commits_url(owner, repo);
        let query = [
            (
                "since",
                window.since.to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            (
                "until",
                window.until.to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            ("per_page", "100".to_string()),
        ];
        let commits = self.fetch_commits(&url, &query).await?;
        Ok(commits.iter().filter_map(extract_timestamp).collect())
    }
}
