//! 파이프라인 오케스트레이션 -- 큐와 단계를 조립하고 생명주기를 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Pipeline`] trait을 구현하여
//! `logwarden-daemon`에서 하나의 단위로 시작/정지됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! FileTailer* , NetworkIngester -> ingest queue -> Classifier[N] -> alert queue -> AlertSink
//! ```
//!
//! # 시작 / 정지 순서
//! - 시작: AlertSink -> Classifier -> NetworkIngester -> FileTailer*
//!   (중간에 실패하면 이미 시작한 단계를 역순으로 정지)
//! - 정지: 역순. 생산자를 먼저 취소/join하고, 수집 큐를 닫아 분류기가
//!   남은 엔트리를 모두 처리하게 한 뒤, 알림 큐를 닫아 싱크가 남은 알림을
//!   모두 기록하게 합니다. 모든 태스크가 종료된 뒤에 두 큐를 해제합니다.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};

use logwarden_core::error::{LogwardenError, PipelineError};
use logwarden_core::pipeline::{AlertPolicy, DynPipeline, HealthStatus, Pipeline};
use logwarden_core::types::LogEntry;

use crate::alert::{AlertSink, AlertSinkConfig};
use crate::classifier::{Classifier, ClassifierStats};
use crate::collector::{FileTailer, IngesterConfig, NetworkIngester, TailerConfig};
use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::queue::BoundedQueue;
use crate::rule::ThresholdPolicy;

/// 수집 큐 사용률이 이 값을 넘으면 Degraded
const DEGRADED_UTILIZATION: f64 = 0.9;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨 (큐가 닫혀 재시작 불가)
    Stopped,
}

/// 로그 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use logwarden_pipeline::{LogPipelineBuilder, PipelineConfig};
///
/// let mut pipeline = LogPipelineBuilder::new()
///     .config(PipelineConfig::from_core(&core_config))
///     .build()?;
///
/// pipeline.start().await?;
/// // ...
/// pipeline.stop().await?;
/// ```
pub struct LogPipeline {
    state: PipelineState,
    ingest: Arc<BoundedQueue<LogEntry>>,
    alerts: Option<Arc<BoundedQueue<LogEntry>>>,
    sink: Option<AlertSink>,
    classifier: Classifier,
    network: Option<NetworkIngester>,
    tailers: Vec<FileTailer>,
}

impl LogPipeline {
    /// 시작 순서대로 정렬된 단계 목록
    fn stages_mut(&mut self) -> Vec<&mut dyn DynPipeline> {
        let mut stages: Vec<&mut dyn DynPipeline> = Vec::with_capacity(self.tailers.len() + 3);
        if let Some(sink) = self.sink.as_mut() {
            stages.push(sink);
        }
        stages.push(&mut self.classifier);
        if let Some(network) = self.network.as_mut() {
            stages.push(network);
        }
        for tailer in &mut self.tailers {
            stages.push(tailer);
        }
        stages
    }

    fn stages(&self) -> Vec<&dyn DynPipeline> {
        let mut stages: Vec<&dyn DynPipeline> = Vec::with_capacity(self.tailers.len() + 3);
        if let Some(sink) = self.sink.as_ref() {
            stages.push(sink);
        }
        stages.push(&self.classifier);
        if let Some(network) = self.network.as_ref() {
            stages.push(network);
        }
        for tailer in &self.tailers {
            stages.push(tailer);
        }
        stages
    }

    /// 단계 이름 목록 (시작 순서)
    pub fn stage_names(&self) -> Vec<String> {
        self.stages().iter().map(|s| s.name().to_owned()).collect()
    }

    /// 현재 상태 이름
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 수집 큐
    pub fn ingest_queue(&self) -> &Arc<BoundedQueue<LogEntry>> {
        &self.ingest
    }

    /// 알림 큐 (알림 비활성화 시 `None`)
    pub fn alert_queue(&self) -> Option<&Arc<BoundedQueue<LogEntry>>> {
        self.alerts.as_ref()
    }

    /// 네트워크 수신기가 바인드된 주소 (시작 전이거나 비활성화 시 `None`)
    pub fn network_addr(&self) -> Option<SocketAddr> {
        self.network.as_ref().and_then(NetworkIngester::local_addr)
    }

    /// 분류 통계
    pub fn classifier_stats(&self) -> ClassifierStats {
        self.classifier.stats()
    }

    /// 파일에 기록된 알림 수 (알림 비활성화 시 `None`)
    pub fn alerts_written(&self) -> Option<u64> {
        self.sink.as_ref().map(AlertSink::written)
    }
}

impl Pipeline for LogPipeline {
    fn name(&self) -> &str {
        "log-pipeline"
    }

    async fn start(&mut self) -> Result<(), LogwardenError> {
        match self.state {
            PipelineState::Running => return Err(PipelineError::AlreadyRunning.into()),
            PipelineState::Stopped => {
                return Err(
                    PipelineError::InitFailed("pipeline cannot be restarted".to_owned()).into(),
                );
            }
            PipelineState::Initialized => {}
        }

        info!("starting log pipeline");

        let result = {
            let mut stages = self.stages_mut();
            let mut failure = None;

            for index in 0..stages.len() {
                let stage = &mut stages[index];
                if let Err(e) = stage.start().await {
                    error!(stage = stage.name(), error = %e, "failed to start stage");
                    failure = Some((index, e));
                    break;
                }
                info!(stage = stage.name(), "stage started");
            }

            match failure {
                None => Ok(()),
                Some((index, e)) => {
                    // 이미 시작한 단계를 역순으로 정지
                    for stage in stages[..index].iter_mut().rev() {
                        if let Err(stop_err) = stage.stop().await {
                            warn!(stage = stage.name(), error = %stop_err, "rollback stop failed");
                        }
                    }
                    Err(e)
                }
            }
        };

        match result {
            Ok(()) => {
                self.state = PipelineState::Running;
                info!("log pipeline started");
                Ok(())
            }
            Err(e) => {
                self.state = PipelineState::Stopped;
                self.release_queues();
                Err(e)
            }
        }
    }

    async fn stop(&mut self) -> Result<(), LogwardenError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        info!("stopping log pipeline");

        let mut first_error = None;
        for stage in self.stages_mut().into_iter().rev() {
            match stage.stop().await {
                Ok(()) => info!(stage = stage.name(), "stage stopped"),
                Err(e) => {
                    error!(stage = stage.name(), error = %e, "failed to stop stage");
                    first_error.get_or_insert(e);
                }
            }
        }

        self.state = PipelineState::Stopped;
        self.release_queues();

        let stats = self.classifier.stats();
        info!(
            processed = stats.processed,
            forwarded = stats.forwarded,
            dropped = stats.dropped,
            "log pipeline stopped"
        );

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Initialized => return HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => return HealthStatus::Unhealthy("stopped".to_owned()),
            PipelineState::Running => {}
        }

        let mut degraded = Vec::new();
        for stage in self.stages() {
            match stage.health_check().await {
                HealthStatus::Healthy => {}
                HealthStatus::Degraded(reason) | HealthStatus::Unhealthy(reason) => {
                    degraded.push(format!("{}: {reason}", stage.name()));
                }
            }
        }

        let utilization = self.ingest.utilization();
        if utilization > DEGRADED_UTILIZATION {
            degraded.push(format!(
                "ingest queue utilization high: {:.1}%",
                utilization * 100.0
            ));
        }

        if degraded.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded(degraded.join("; "))
        }
    }
}

impl LogPipeline {
    /// 모든 태스크가 종료된 뒤 두 큐를 해제합니다.
    fn release_queues(&self) {
        let discarded = self.ingest.destroy()
            + self.alerts.as_ref().map_or(0, |queue| queue.destroy());
        if discarded > 0 {
            warn!(discarded, "entries discarded while releasing queues");
        }
    }
}

/// 로그 파이프라인 빌더
///
/// 큐를 생성하고 설정에 따라 단계를 조립합니다.
pub struct LogPipelineBuilder {
    config: PipelineConfig,
    policy: Option<Arc<dyn AlertPolicy>>,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            policy: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 알림 판정 정책을 지정합니다.
    ///
    /// 지정하지 않으면 설정의 임계값/패턴으로 [`ThresholdPolicy`]를 만듭니다.
    pub fn policy(mut self, policy: Arc<dyn AlertPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// 파이프라인을 빌드합니다.
    pub fn build(self) -> Result<LogPipeline, LogPipelineError> {
        let config = self.config;
        config.validate()?;

        let ingest = Arc::new(BoundedQueue::new(config.queue_capacity).with_label("ingest"));
        let alerts = config
            .alerts_enabled
            .then(|| Arc::new(BoundedQueue::new(config.queue_capacity).with_label("alert")));

        let policy = self.policy.unwrap_or_else(|| {
            Arc::new(
                ThresholdPolicy::new(config.alert_threshold)
                    .with_patterns(config.alert_patterns.iter().cloned())
                    .with_pattern_escalation(config.pattern_escalation),
            )
        });

        let sink = alerts.as_ref().map(|queue| {
            let sink_config = AlertSinkConfig {
                echo_stdout: config.echo_alerts,
                ..AlertSinkConfig::new(&config.alert_file)
            };
            AlertSink::new(sink_config, Arc::clone(queue))
        });

        let classifier = Classifier::new(config.workers, Arc::clone(&ingest), alerts.clone(), policy);

        let network = config.enable_network.then(|| {
            let ingester_config = IngesterConfig {
                accept_timeout: config.accept_timeout,
                read_buffer_size: config.read_buffer_size,
                max_line_length: config.max_line_length,
                ..IngesterConfig::new(config.network_bind_addr.clone())
            };
            NetworkIngester::new(ingester_config, Arc::clone(&ingest))
        });

        let tailers = config
            .watch_directories
            .iter()
            .map(|dir| {
                let tailer_config = TailerConfig {
                    poll_interval: config.poll_interval,
                    max_line_length: config.max_line_length,
                    ..TailerConfig::new(dir)
                };
                FileTailer::new(tailer_config, Arc::clone(&ingest))
            })
            .collect();

        Ok(LogPipeline {
            state: PipelineState::Initialized,
            ingest,
            alerts,
            sink,
            classifier,
            network,
            tailers,
        })
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
