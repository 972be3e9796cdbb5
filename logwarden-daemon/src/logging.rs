//! Logging initialization for logwarden-daemon.
//!
//! Configures `tracing-subscriber` based on the `[general]` section
//! of `LogwardenConfig`. Supports JSON structured logging and
//! human-readable pretty format.

use anyhow::Result;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{EnvFilter, fmt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use logwarden_core::config::GeneralConfig;

/// Build the event filter. `RUST_LOG` wins over the configured level.
fn build_filter(config: &GeneralConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Level used while the configuration is loaded, unless `RUST_LOG` is set.
const BOOTSTRAP_LOG_LEVEL: &str = "warn";

/// Install a thread-local stderr subscriber for the configuration-loading phase.
///
/// Config parser warnings are emitted before [`init_tracing`] can run, since the
/// configured level and format are not known yet. Drop the returned guard
/// before calling [`init_tracing`].
pub fn init_bootstrap_tracing(level: Option<&str>) -> DefaultGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.unwrap_or(BOOTSTRAP_LOG_LEVEL)));
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// Diagnostics go to stderr; stdout carries only `[ALERT]` lines.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines
/// * `"pretty"` - Human-readable colored output (default)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(build_filter(config));

    let result = match config.log_format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        "pretty" => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        other => anyhow::bail!("unknown log format '{other}', expected 'json' or 'pretty'"),
    };

    result.map_err(|e| {
        anyhow::anyhow!(
            "failed to initialize {} tracing subscriber: {}",
            config.log_format,
            e
        )
    })
}
