//! Pipeline orchestration -- assembly, signal handling, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `logwarden-daemon`.
//! It loads configuration, installs the metrics exporter, builds the
//! [`LogPipeline`], and runs until a shutdown signal arrives.
//!
//! # Startup
//!
//! The pipeline starts its stages consumers first (alert sink, classifier)
//! and producers last (network ingester, file tailers). Any stage failure
//! unwinds the already-started stages and is returned as a startup error.
//!
//! # Shutdown
//!
//! 1. Background tasks (uptime updater) are signalled and joined
//! 2. Producers are cancelled and joined
//! 3. The ingest queue is closed and the classifier drains it
//! 4. The alert queue is closed and the sink drains it
//! 5. Both queues are released

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::broadcast;

use logwarden_core::config::LogwardenConfig;
use logwarden_core::pipeline::{HealthStatus, Pipeline};
use logwarden_pipeline::{LogPipeline, LogPipelineBuilder, PipelineConfig};

use crate::metrics_server;

/// Interval between health checks in the main loop.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Interval between uptime gauge updates.
const UPTIME_UPDATE_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LogwardenConfig,
    /// The assembled log pipeline.
    pipeline: LogPipeline,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or fails
    /// validation, or if the pipeline cannot be assembled.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LogwardenConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// Installs the metrics recorder when `metrics.enabled` is set.
    pub fn build_from_config(config: LogwardenConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let pipeline_config = PipelineConfig::from_core(&config);
        tracing::info!(
            watch_directories = pipeline_config.watch_directories.len(),
            network = pipeline_config.enable_network,
            bind_addr = %pipeline_config.network_bind_addr,
            workers = pipeline_config.workers,
            queue_capacity = pipeline_config.queue_capacity,
            alerts = pipeline_config.alerts_enabled,
            "assembling log pipeline"
        );

        let pipeline = LogPipelineBuilder::new()
            .config(pipeline_config)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build log pipeline: {}", e))?;

        let (shutdown_tx, _) = broadcast::channel(4);

        Ok(Self {
            config,
            pipeline,
            shutdown_tx,
            start_time: Instant::now(),
        })
    }

    /// Start the pipeline and block until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(wait_for_shutdown_signal()).await
    }

    /// Start the pipeline and block until `shutdown` resolves.
    ///
    /// The pipeline is stopped even when `shutdown` resolves to an error;
    /// that error is returned after the shutdown sequence completes.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = Result<&'static str>>,
    {
        self.pipeline
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start log pipeline: {}", e))?;

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!(
            network_addr = ?self.pipeline.network_addr(),
            stages = ?self.pipeline.stage_names(),
            "logwarden-daemon running"
        );

        tokio::pin!(shutdown);
        let mut health_interval = tokio::time::interval(HEALTH_CHECK_INTERVAL);
        health_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let signal = loop {
            tokio::select! {
                signal = &mut shutdown => break signal,
                _ = health_interval.tick() => self.report_health().await,
            }
        };

        match &signal {
            Ok(name) => tracing::info!(signal = name, "shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "shutdown signal handling failed, stopping"),
        }

        let _ = self.shutdown_tx.send(());
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        self.shutdown().await?;
        signal.map(|_| ())
    }

    /// Stop the pipeline and report the final statistics.
    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping log pipeline");
        self.pipeline
            .stop()
            .await
            .map_err(|e| anyhow::anyhow!("failed to stop log pipeline: {}", e))?;

        let stats = self.pipeline.classifier_stats();
        tracing::info!(
            processed = stats.processed,
            alerted = stats.alerted,
            forwarded = stats.forwarded,
            written = self.pipeline.alerts_written().unwrap_or(0),
            uptime_secs = self.start_time.elapsed().as_secs(),
            "logwarden-daemon shut down"
        );
        Ok(())
    }

    /// Current pipeline health.
    pub async fn health(&self) -> HealthStatus {
        if self.config.metrics.enabled {
            metrics_server::record_uptime(self.start_time);
        }
        self.pipeline.health_check().await
    }

    async fn report_health(&self) {
        match self.health().await {
            HealthStatus::Healthy => tracing::debug!("pipeline healthy"),
            HealthStatus::Degraded(reason) => tracing::warn!(reason = %reason, "pipeline degraded"),
            HealthStatus::Unhealthy(reason) => {
                tracing::error!(reason = %reason, "pipeline unhealthy");
            }
        }
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &LogwardenConfig {
        &self.config
    }

    /// Get a reference to the assembled pipeline.
    pub fn pipeline(&self) -> &LogPipeline {
        &self.pipeline
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
pub async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Spawn a background task that periodically updates the uptime metric.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_UPDATE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => metrics_server::record_uptime(start_time),
                _ = shutdown_rx.recv() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
