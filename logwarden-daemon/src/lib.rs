//! Logwarden daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `logwarden-daemon` is used as a binary (main.rs).

pub mod cli;
pub mod logging;
pub mod metrics_server;
pub mod orchestrator;

use logwarden_core::config::LogwardenConfig;

/// Apply `--log-level` / `--log-format` overrides on top of the loaded config.
///
/// CLI flags win over both the config file and environment variables.
pub fn apply_cli_overrides(config: &mut LogwardenConfig, cli: &cli::DaemonCli) {
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }
}
