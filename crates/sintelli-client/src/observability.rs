use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Level/filter override, takes precedence over `RUST_LOG`.
pub const ENV_LOG_LEVEL: &str = "SINTELLI_LOG_LEVEL";
/// When set, logs go to this file as JSON lines.
pub const ENV_JSON_LOG_PATH: &str = "SINTELLI_JSON_LOG_PATH";

const DEFAULT_LOG_FILE: &str = "sintelli.logs.jsonl";

static INIT: OnceCell<()> = OnceCell::new();

fn resolve_env_filter(level: Option<String>) -> EnvFilter {
    if let Some(level) = level
        && let Ok(filter) = EnvFilter::try_new(level)
    {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Installs a global `tracing` subscriber once per process.
///
/// Libraries embedding the client usually install their own subscriber and
/// never call this; binaries and demos do.
///
/// Environment variables:
/// - `SINTELLI_LOG_LEVEL`: optional level/filter (`info`, `sintelli_client=debug`, ...).
/// - `RUST_LOG`: fallback filter. Defaults to `info`.
/// - `SINTELLI_JSON_LOG_PATH`: optional log file. If set, logs are JSONL in that
///   file; otherwise a compact console format is written to stderr.
///
/// If another global subscriber is already installed this is a no-op.
pub fn init_tracing() {
    INIT.get_or_init(|| {
        let env_filter = resolve_env_filter(std::env::var(ENV_LOG_LEVEL).ok());
        if let Ok(path_raw) = std::env::var(ENV_JSON_LOG_PATH) {
            let (dir, file_name) = split_log_path(Path::new(&path_raw));
            let _ = std::fs::create_dir_all(&dir);
            let writer = tracing_appender::rolling::never(dir, file_name);
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(true)
                .with_writer(writer);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(json_layer)
                .try_init();
        } else {
            let console_layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init();
        }
    });
}
