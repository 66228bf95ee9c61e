use anyhow::{Context as _, Result};
use clap::Parser;
use repowatch::{
    config::WatchConfig, github::GithubClient, refresh, refresh::Refresher, rest,
    store::ProjectStore, AppContext,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "repowatchd",
    about = "repowatch — GitHub repository activity watchdog daemon",
    version
)]
struct Args {
    /// REST API server port
    #[arg(long, env = "REPOWATCH_PORT")]
    port: Option<u16>,

    /// Data directory for the project list and config
    #[arg(long, env = "REPOWATCH_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "REPOWATCH_LOG")]
    log: Option<String>,

    /// Bind address for the REST server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "REPOWATCH_BIND")]
    bind_address: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "REPOWATCH_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Arc::new(WatchConfig::new(
        args.port,
        args.data_dir,
        args.log,
        args.bind_address,
    ));

    // Keep the appender guard alive for the process lifetime.
    let _log_guard = setup_logging(&config.log, args.log_file.as_deref(), &config.log_format);

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("failed to create data directory {}", config.data_dir.display())
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.data_dir.display(),
        api = %config.api_base_url,
        authenticated = config.github_token.is_some(),
        "starting repowatchd"
    );

    let client = Arc::new(GithubClient::new(&config)?);
    let store = Arc::new(ProjectStore::open(&config.data_dir));
    let refresher = Arc::new(Refresher::new(client, &config));

    let ctx = Arc::new(AppContext {
        config,
        store,
        refresher,
        started_at: std::time::Instant::now(),
    });

    let refresh_task = refresh::spawn(ctx.clone());

    tokio::select! {
        res = rest::start_rest_server(ctx.clone()) => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c — shutting down");
        }
    }

    refresh_task.abort();
    Ok(())
}

/// Initialize tracing, optionally teeing into a daily-rotated log file.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("repowatchd.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}
