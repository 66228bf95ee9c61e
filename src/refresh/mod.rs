//! Background sampling of tracked repositories.
//!
//! A fixed-interval loop (default 60 s) re-samples every tracked project;
//! manual refreshes and the proxy endpoints go through the same
//! [`SampleCache`]. Concurrent requests for the same `(owner, repo, query)`
//! coalesce onto one in-flight fetch via a per-key async mutex, and results
//! younger than the dedupe window (default 10 s) are reused without touching
//! the network. Upstream failures never propagate: they degrade to `None` /
//! an all-zero histogram with `degraded` set on the sample.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, warn};

use crate::activity::{empty_buckets, DailyBucket, DayWindow};
use crate::config::WatchConfig;
use crate::github::{CommitSource, Sample};
use crate::store::TrackedProject;
use crate::AppContext;

// ─── Sample cache ────────────────────────────────────────────────────────────

/// Coalescing, short-lived cache in front of a [`CommitSource`].
pub struct SampleCache {
    source: Arc<dyn CommitSource>,
    dedupe_window: Duration,
    latest: Mutex<HashMap<String, (Instant, Sample<Option<DateTime<Utc>>>)>>,
    daily: Mutex<HashMap<String, (Instant, Sample<Vec<DailyBucket>>)>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SampleCache {
    pub fn new(source: Arc<dyn CommitSource>, dedupe_window: Duration) -> Self {
        Self {
            source,
            dedupe_window,
            latest: Mutex::new(HashMap::new()),
            daily: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Serialize callers on the same query key: whoever holds the guard is
    /// the one allowed to fetch; late arrivals wait and then hit the cache.
    async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Newest commit instant for a repo. `force` skips the freshness window
    /// (manual refresh) but still coalesces with an in-flight fetch.
    pub async fn latest_commit(
        &self,
        owner: &str,
        repo: &str,
        force: bool,
    ) -> Sample<Option<DateTime<Utc>>> {
        let key = format!("last:{owner}/{repo}");
        let _guard = self.acquire(&key).await;

        if !force {
            if let Some((at, sample)) = self.latest.lock().await.get(&key) {
                if at.elapsed() <= self.dedupe_window {
                    return sample.clone();
                }
            }
        }

        let sample = match self.source.latest_commit(owner, repo).await {
            Ok(instant) => Sample::live(instant),
            Err(e) => {
                warn!(owner, repo, err = %e, "last-commit fetch failed — no timestamp known");
                Sample::fallback(None)
            }
        };
        self.latest
            .lock()
            .await
            .insert(key, (Instant::now(), sample.clone()));
        sample
    }

    /// Daily histogram for a repo over a window of `days` days ending today.
    pub async fn daily_buckets(
        &self,
        owner: &str,
        repo: &str,
        days: u32,
        force: bool,
    ) -> Sample<Vec<DailyBucket>> {
        let key = format!("daily:{owner}/{repo}:{days}");
        let _guard = self.acquire(&key).await;

        if !force {
            if let Some((at, sample)) = self.daily.lock().await.get(&key) {
                if at.elapsed() <= self.dedupe_window {
                    return sample.clone();
                }
            }
        }

        let window = DayWindow::ending_today(days);
        let sample = match self.source.commits_in_window(owner, repo, &window).await {
            Ok(timestamps) => Sample::live(crate::activity::bucket_daily(&window, &timestamps)),
            Err(e) => {
                warn!(owner, repo, days, err = %e, "daily fetch failed — zero-filled window");
                Sample::fallback(empty_buckets(&window))
            }
        };
        self.daily
            .lock()
            .await
            .insert(key, (Instant::now(), sample.clone()));
        sample
    }
}

// ─── Project snapshots ───────────────────────────────────────────────────────

/// Latest derived view of one project, recomputed on every sample and never
/// persisted.
#[derive(Debug, Clone)]
pub struct ProjectSample {
    pub last_commit: Option<DateTime<Utc>>,
    pub last_commit_degraded: bool,
    pub daily: Vec<DailyBucket>,
    pub daily_degraded: bool,
    pub sampled_at: DateTime<Utc>,
}

pub struct Refresher {
    cache: SampleCache,
    window_days: u32,
    snapshots: RwLock<HashMap<String, ProjectSample>>,
}

impl Refresher {
    pub fn new(source: Arc<dyn CommitSource>, config: &WatchConfig) -> Self {
        Self {
            cache: SampleCache::new(
                source,
                Duration::from_secs(config.dedupe_window_secs),
            ),
            window_days: config.window_days,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &SampleCache {
        &self.cache
    }

    /// Sample both queries for a project concurrently and record the result
    /// as its current snapshot. Last write wins — a manual refresh racing an
    /// automatic one simply overwrites.
    pub async fn sample_project(&self, project: &TrackedProject, force: bool) -> ProjectSample {
        let (last, daily) = tokio::join!(
            self.cache.latest_commit(&project.owner, &project.repo, force),
            self.cache
                .daily_buckets(&project.owner, &project.repo, self.window_days, force),
        );
        let sample = ProjectSample {
            last_commit: last.value,
            last_commit_degraded: last.degraded,
            daily: daily.value,
            daily_degraded: daily.degraded,
            sampled_at: Utc::now(),
        };
        self.snapshots
            .write()
            .await
            .insert(project.id.clone(), sample.clone());
        sample
    }

    pub async fn snapshot(&self, project_id: &str) -> Option<ProjectSample> {
        self.snapshots.read().await.get(project_id).cloned()
    }

    /// Drop the snapshot of a removed project.
    pub async fn evict(&self, project_id: &str) {
        self.snapshots.write().await.remove(project_id);
    }
}

/// Spawn the background refresh loop. The first tick fires immediately, so
/// snapshots are warm shortly after startup.
pub fn spawn(ctx: Arc<AppContext>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(Duration::from_secs(ctx.config.refresh_interval_secs.max(1)));
        loop {
            interval.tick().await;
            let projects = ctx.store.list().await;
            if projects.is_empty() {
                continue;
            }
            debug!(count = projects.len(), "refresh cycle");
            let mut handles = Vec::with_capacity(projects.len());
            for project in projects {
                let refresher = ctx.refresher.clone();
                handles.push(tokio::spawn(async move {
                    refresher.sample_project(&project, false).await;
                }));
            }
            for handle in handles {
                let _ = handle.await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{GithubError, RepoRef};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeSource {
        calls: AtomicU32,
        fail: bool,
        last: Option<DateTime<Utc>>,
        commits: Vec<DateTime<Utc>>,
    }

    impl FakeSource {
        fn live(last: Option<DateTime<Utc>>, commits: Vec<DateTime<Utc>>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: false,
                last,
                commits,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail: true,
                last: None,
                commits: Vec::new(),
            }
        }

        fn err() -> GithubError {
            GithubError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                url: "https://api.github.com/repos/foo/bar/commits".to_string(),
            }
        }
    }

    #[async_trait]
    impl CommitSource for FakeSource {
        async fn latest_commit(
            &self,
            _owner: &str,
            _repo: &str,
        ) -> Result<Option<DateTime<Utc>>, GithubError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(Self::err());
            }
            Ok(self.last)
        }

        async fn commits_in_window(
            &self,
            _owner: &str,
            _repo: &str,
            _window: &DayWindow,
        ) -> Result<Vec<DateTime<Utc>>, GithubError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(Self::err());
            }
            Ok(self.commits.clone())
        }
    }

    fn test_config() -> WatchConfig {
        WatchConfig {
            port: 0,
            bind_address: "127.0.0.1".into(),
            data_dir: std::env::temp_dir(),
            log: "error".into(),
            log_format: "pretty".into(),
            github_token: None,
            api_base_url: "http://127.0.0.1:0".into(),
            refresh_interval_secs: 60,
            dedupe_window_secs: 10,
            window_days: 7,
        }
    }

    #[tokio::test]
    async fn concurrent_same_key_requests_collapse_to_one_fetch() {
        let now = Utc::now();
        let source = Arc::new(FakeSource::live(Some(now), vec![]));
        let cache = SampleCache::new(source.clone(), Duration::from_secs(10));

        let (a, b) = tokio::join!(
            cache.latest_commit("foo", "bar", false),
            cache.latest_commit("foo", "bar", false),
        );
        assert_eq!(a.value, Some(now));
        assert_eq!(b.value, Some(now));
        assert_eq!(source.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let source = Arc::new(FakeSource::live(None, vec![]));
        let cache = SampleCache::new(source.clone(), Duration::from_secs(10));

        tokio::join!(
            cache.latest_commit("foo", "bar", false),
            cache.latest_commit("foo", "baz", false),
        );
        assert_eq!(source.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn force_bypasses_freshness_window() {
        let source = Arc::new(FakeSource::live(None, vec![]));
        let cache = SampleCache::new(source.clone(), Duration::from_secs(10));

        cache.latest_commit("foo", "bar", false).await;
        cache.latest_commit("foo", "bar", false).await; // cache hit
        assert_eq!(source.calls.load(Ordering::Relaxed), 1);

        cache.latest_commit("foo", "bar", true).await; // forced
        assert_eq!(source.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn upstream_failure_degrades_to_defaults() {
        let source = Arc::new(FakeSource::failing());
        let cache = SampleCache::new(source, Duration::ZERO);

        let last = cache.latest_commit("foo", "bar", false).await;
        assert_eq!(last.value, None);
        assert!(last.degraded);

        let daily = cache.daily_buckets("foo", "bar", 7, false).await;
        assert!(daily.degraded);
        assert_eq!(daily.value.len(), 7);
        assert!(daily.value.iter().all(|b| b.count == 0));
    }

    #[tokio::test]
    async fn sample_project_records_snapshot_and_evicts() {
        let now = Utc::now();
        let source = Arc::new(FakeSource::live(Some(now), vec![now]));
        let refresher = Refresher::new(source, &test_config());

        let project =
            TrackedProject::new(&RepoRef { owner: "foo".into(), repo: "bar".into() }, None, None);
        let sample = refresher.sample_project(&project, false).await;
        assert_eq!(sample.last_commit, Some(now));
        assert!(!sample.daily_degraded);
        // Today's bucket holds the single commit.
        assert_eq!(sample.daily.last().map(|b| b.count), Some(1));

        assert!(refresher.snapshot(&project.id).await.is_some());
        refresher.evict(&project.id).await;
        assert!(refresher.snapshot(&project.id).await.is_none());
    }
}
