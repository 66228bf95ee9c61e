use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 4310;
const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;
const DEFAULT_DEDUPE_WINDOW_SECS: u64 = 10;
const DEFAULT_WINDOW_DAYS: u32 = 7;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// REST server port (default: 4310).
    port: Option<u16>,
    /// Bind address for the REST server (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Log level filter string, e.g. "debug", "info,repowatch=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured for log aggregators).
    log_format: Option<String>,
    /// GitHub bearer token for higher rate limits. Omit to call unauthenticated.
    github_token: Option<String>,
    /// Override the GitHub API base URL (default: https://api.github.com).
    api_base_url: Option<String>,
    /// Seconds between background refresh cycles (default: 60).
    refresh_interval_secs: Option<u64>,
    /// Seconds a sample stays fresh for request de-duplication (default: 10).
    dedupe_window_secs: Option<u64>,
    /// Histogram window in days used by the background refresher (default: 7, max: 31).
    window_days: Option<u32>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── WatchConfig ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub port: u16,
    pub bind_address: String,
    pub data_dir: PathBuf,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Optional GitHub bearer token (GITHUB_TOKEN env var).
    /// None means unauthenticated requests — lower rate limits, never an error.
    pub github_token: Option<String>,
    /// GitHub API base URL (REPOWATCH_API_URL env var, default: https://api.github.com).
    pub api_base_url: String,
    /// Seconds between background refresh cycles.
    pub refresh_interval_secs: u64,
    /// Freshness window for sample de-duplication, in seconds.
    pub dedupe_window_secs: u64,
    /// Histogram window in days for the background refresher.
    pub window_days: u32,
}

impl WatchConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        data_dir: Option<PathBuf>,
        log: Option<String>,
        bind_address: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let bind_address = bind_address
            .or(std::env::var("REPOWATCH_BIND").ok().filter(|s| !s.is_empty()))
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log_format = std::env::var("REPOWATCH_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let github_token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .or(toml.github_token);

        let api_base_url = std::env::var("REPOWATCH_API_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let refresh_interval_secs = toml
            .refresh_interval_secs
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
        let dedupe_window_secs = toml
            .dedupe_window_secs
            .unwrap_or(DEFAULT_DEDUPE_WINDOW_SECS);
        let window_days = toml
            .window_days
            .unwrap_or(DEFAULT_WINDOW_DAYS)
            .clamp(1, crate::activity::MAX_WINDOW_DAYS);

        Self {
            port,
            bind_address,
            data_dir,
            log,
            log_format,
            github_token,
            api_base_url,
            refresh_interval_secs,
            dedupe_window_secs,
            window_days,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/repowatch
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("repowatch");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/repowatch or ~/.local/share/repowatch
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("repowatch");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("repowatch");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\repowatch
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("repowatch");
        }
    }
    // Fallback
    PathBuf::from(".repowatch")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "port = 9999\nrefresh_interval_secs = 5\nwindow_days = 14\n",
        )
        .unwrap();

        let cfg = WatchConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, 9999);
        assert_eq!(cfg.refresh_interval_secs, 5);
        assert_eq!(cfg.window_days, 14);
    }

    #[test]
    fn cli_beats_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "port = 9999\n").unwrap();

        let cfg = WatchConfig::new(
            Some(4000),
            Some(dir.path().to_path_buf()),
            Some("debug".to_string()),
            None,
        );
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.log, "debug");
    }

    #[test]
    fn malformed_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "port = \"not a number").unwrap();

        let cfg = WatchConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.window_days, DEFAULT_WINDOW_DAYS);
    }

    #[test]
    fn window_days_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "window_days = 90\n").unwrap();

        let cfg = WatchConfig::new(None, Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.window_days, 31);
    }
}
