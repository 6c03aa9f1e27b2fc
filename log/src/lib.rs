//! Logging setup for redline.
//!
//! Diagnostics go to stderr; stdout is reserved for document output. An
//! optional file layer can be enabled with `REDLINE_LOG_FILE`.
//!
//! ## Environment Variables
//!
//! 1. **`REDLINE_LOG`** (highest priority) - redline-specific logging control
//! 2. **`RUST_LOG`** - standard tracing environment variable
//! 3. **Default** - `warn` globally, `info` for redline crates
//!
//! `REDLINE_LOG=debug` expands to debug for all redline crates; module
//! syntax like `REDLINE_LOG=redline=trace,redline_markup=debug` is passed
//! through as-is.

use std::{env, path::PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

const CRATES: &[&str] = &["redline", "redline_markup", "redline_log", "redline_bin"];

/// Returned from [`init`]; must be held alive so the optional file writer
/// flushes on exit.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize logging.
///
/// The returned [`LogGuard`] must be held for the lifetime of the program.
/// Safe to call when a subscriber is already installed (the second install
/// is ignored).
pub fn init() -> Result<LogGuard, Box<dyn std::error::Error + Send + Sync>> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_filter(create_filter()?);

    let mut file_guard = None;
    let file_layer = match env::var("REDLINE_LOG_FILE").ok().map(PathBuf::from) {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "redline.log".to_string());
            std::fs::create_dir_all(dir).ok();
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(create_filter()?),
            )
        },
        None => None,
    };

    Registry::default()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .ok();

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Initialize logging for tests: stderr only, never panics when another
/// test already installed a subscriber.
pub fn test() {
    let _ = test_init();
}

fn test_init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = create_filter()?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init()?;
    Ok(())
}

/// Create the [`EnvFilter`]: `REDLINE_LOG` > `RUST_LOG` > defaults.
fn create_filter() -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
    if let Ok(redline_log) = env::var("REDLINE_LOG") {
        return Ok(expand_redline_log(&redline_log));
    }

    if let Ok(rust_log) = env::var("RUST_LOG") {
        return Ok(EnvFilter::new(rust_log));
    }

    Ok(EnvFilter::new(default_filter("info")))
}

/// Expand a bare level like `REDLINE_LOG=debug` to all redline crates;
/// module-specific syntax is used verbatim.
fn expand_redline_log(value: &str) -> EnvFilter {
    if value.contains('=') || value.contains(':') || value.contains(',') {
        return EnvFilter::new(value);
    }
    EnvFilter::new(default_filter(value))
}

fn default_filter(level: &str) -> String {
    let mut filter = String::from("warn");
    for name in CRATES {
        filter.push_str(&format!(",{name}={level}"));
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_all_crates() {
        let filter = default_filter("info");
        assert!(filter.starts_with("warn,"));
        for name in CRATES {
            assert!(filter.contains(&format!("{name}=info")));
        }
    }

    #[test]
    fn bare_level_is_expanded() {
        let filter = expand_redline_log("trace").to_string();
        assert!(filter.contains("redline=trace"));
        assert!(filter.contains("redline_markup=trace"));
    }

    #[test]
    fn module_syntax_is_passed_through() {
        let filter = expand_redline_log("redline=debug,warn").to_string();
        assert!(filter.contains("redline=debug"));
        assert!(!filter.contains("redline_markup"));
    }
}
