// src/logging.rs

//! Logging setup for `taskflow` using `tracing` + `tracing-subscriber`.
//!
//! The filter is resolved in this order:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `TASKFLOW_LOG`: either a bare level ("debug") or full filter
//!    directives ("info,taskflow::forward=trace")
//! 3. `info`
//!
//! A bare level expands through [`default_directives`]: the forward and
//! dataset modules log once per merge and per sample at `debug`, so a
//! `debug` run keeps them at `info`. Ask for `trace` or name them in
//! `TASKFLOW_LOG` to see those events.
//!
//! Logs go to STDERR; the graph description is printed on STDOUT.

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

const ENV_VAR: &str = "TASKFLOW_LOG";

/// Per-batch modules held at `info` in a `debug` run.
const CHATTY_MODULES: [&str; 2] = ["taskflow::forward", "taskflow::dataset"];

/// Initialise the global logging subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let filter = match cli_level {
        Some(lvl) => EnvFilter::try_new(default_directives(level_from_log_level(lvl)))?,
        None => filter_from_env(std::env::var(ENV_VAR).ok().as_deref())?,
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(())
}

/// Filter for a raw `TASKFLOW_LOG` value.
pub fn filter_from_env(value: Option<&str>) -> Result<EnvFilter> {
    let directives = match value.map(str::trim) {
        None | Some("") => default_directives(Level::INFO),
        Some(raw) => match parse_level_str(raw) {
            Some(level) => default_directives(level),
            None => raw.to_string(),
        },
    };
    EnvFilter::try_new(&directives)
        .map_err(|e| anyhow::anyhow!("invalid {ENV_VAR} value '{directives}': {e}"))
}

/// Directives for a single global level.
pub fn default_directives(level: Level) -> String {
    let mut directives = level.to_string().to_lowercase();
    if level != Level::DEBUG {
        return directives;
    }
    for module in CHATTY_MODULES {
        directives.push_str(&format!(",{module}=info"));
    }
    directives
}

fn level_from_log_level(lvl: LogLevel) -> Level {
    match lvl {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

pub fn parse_level_str(s: &str) -> Option<Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}
