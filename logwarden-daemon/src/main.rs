use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use logwarden_core::config::LogwardenConfig;
use logwarden_daemon::cli::DaemonCli;
use logwarden_daemon::orchestrator::Orchestrator;
use logwarden_daemon::{apply_cli_overrides, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = DaemonCli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("logwarden-daemon: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: DaemonCli) -> Result<()> {
    let config = {
        let _bootstrap = logging::init_bootstrap_tracing(cli.log_level.as_deref());
        load_config(&cli).await?
    };

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "logwarden-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    orchestrator.run().await
}

async fn load_config(cli: &DaemonCli) -> Result<LogwardenConfig> {
    let mut config = LogwardenConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;
    apply_cli_overrides(&mut config, cli);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(config)
}
