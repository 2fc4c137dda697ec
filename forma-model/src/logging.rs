//! Logging setup.
//!
//! Forma logs through `tracing`. Nothing is printed unless a subscriber is
//! installed, either by the application or by [`init`] when the
//! `tracing-subscriber` feature is enabled.
//!
//! # Environment Variables
//!
//! - `FORMA_DEBUG=true|1|yes` - Enable debug logging
//! - `FORMA_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific level
//! - `FORMA_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use forma_model::logging;
//!
//! logging::init();
//! ```

use forma_schema::config::DebugConfig;
use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

const DEBUG_VAR: &str = "FORMA_DEBUG";
const LEVEL_VAR: &str = "FORMA_LOG_LEVEL";
const FORMAT_VAR: &str = "FORMA_LOG_FORMAT";

/// Check if `FORMA_DEBUG` enables debug logging.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var(DEBUG_VAR)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Normalize a level name. Unknown names fall back to `debug` when debugging
/// is enabled and `warn` otherwise.
pub fn parse_level(level: Option<&str>, debug: bool) -> &'static str {
    match level.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ if debug => "debug",
        _ => "warn",
    }
}

/// Normalize a format name. Defaults to `json`.
pub fn parse_format(format: Option<&str>) -> &'static str {
    match format.map(str::to_lowercase).as_deref() {
        Some("pretty") => "pretty",
        Some("compact") => "compact",
        _ => "json",
    }
}

/// Level configured through `FORMA_LOG_LEVEL` and `FORMA_DEBUG`.
pub fn get_log_level() -> &'static str {
    parse_level(env::var(LEVEL_VAR).ok().as_deref(), is_debug_enabled())
}

/// Format configured through `FORMA_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    parse_format(env::var(FORMAT_VAR).ok().as_deref())
}

/// Initialize logging from the environment.
///
/// Does nothing unless `FORMA_DEBUG` or `FORMA_LOG_LEVEL` is set. Subsequent
/// calls are no-ops.
pub fn init() {
    if !is_debug_enabled() && env::var(LEVEL_VAR).is_err() {
        return;
    }
    install(get_log_level(), get_log_format());
}

/// Initialize logging with an explicit level.
pub fn init_with_level(level: &str) {
    install(parse_level(Some(level), true), get_log_format());
}

/// Initialize logging from the `[debug]` section of `forma.toml`.
///
/// Environment variables take precedence over the file.
pub fn init_from_config(config: &DebugConfig) {
    let level = env::var(LEVEL_VAR).ok().or_else(|| config.log_level.clone());
    if level.is_none() && !is_debug_enabled() {
        return;
    }
    let format = env::var(FORMAT_VAR).ok().or_else(|| config.log_format.clone());
    install(
        parse_level(level.as_deref(), is_debug_enabled()),
        parse_format(format.as_deref()),
    );
}

#[allow(unused_variables)]
fn install(level: &'static str, format: &'static str) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(format!(
                "forma={level},forma_model={level},forma_schema={level}"
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match format {
                "json" => registry.with(fmt::layer().json()).try_init(),
                "compact" => registry.with(fmt::layer().compact()).try_init(),
                _ => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level, format, "Forma logging initialized");
            }
        }
    });
}
