//! 분류기 -- 수집 큐를 소비하는 워커 풀
//!
//! 각 워커는 수집 큐에서 엔트리를 꺼내 [`AlertPolicy`]로 판정하고,
//! 알림 대상이면 알림 큐로 넘기고 아니면 버립니다. 큐가 닫히고 비면
//! (`dequeue`가 `None`) 워커가 종료됩니다.
//!
//! 알림이 비활성화되어 알림 큐가 없으면 알림 대상도 집계만 하고 버립니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use logwarden_core::error::{LogwardenError, PipelineError};
use logwarden_core::metrics as m;
use logwarden_core::pipeline::{AlertPolicy, HealthStatus, Pipeline};
use logwarden_core::types::LogEntry;

use crate::error::LogPipelineError;
use crate::queue::BoundedQueue;

/// 분류 통계 카운터
#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    alerted: AtomicU64,
    forwarded: AtomicU64,
    dropped: AtomicU64,
}

/// 분류 통계 스냅샷
///
/// `processed == forwarded + dropped`가 항상 성립합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierStats {
    /// 수집 큐에서 꺼낸 엔트리 수
    pub processed: u64,
    /// 알림 대상으로 판정된 엔트리 수
    pub alerted: u64,
    /// 알림 큐로 전달된 엔트리 수
    pub forwarded: u64,
    /// 버려진 엔트리 수 (알림 대상 아님, 알림 비활성화, 알림 큐 닫힘)
    pub dropped: u64,
}

/// 단계 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageState {
    Idle,
    Running,
    Stopped,
}

/// 분류기 워커 풀
pub struct Classifier {
    workers: usize,
    input: Arc<BoundedQueue<LogEntry>>,
    output: Option<Arc<BoundedQueue<LogEntry>>>,
    policy: Arc<dyn AlertPolicy>,
    counters: Arc<Counters>,
    tasks: Vec<JoinHandle<()>>,
    state: StageState,
}

impl Classifier {
    /// 새 분류기를 생성합니다.
    ///
    /// `output`이 `None`이면 알림 대상 엔트리도 버립니다.
    pub fn new(
        workers: usize,
        input: Arc<BoundedQueue<LogEntry>>,
        output: Option<Arc<BoundedQueue<LogEntry>>>,
        policy: Arc<dyn AlertPolicy>,
    ) -> Self {
        Self {
            workers: workers.max(1),
            input,
            output,
            policy,
            counters: Arc::new(Counters::default()),
            tasks: Vec::new(),
            state: StageState::Idle,
        }
    }

    /// 워커 수
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 현재까지의 통계
    pub fn stats(&self) -> ClassifierStats {
        ClassifierStats {
            processed: self.counters.processed.load(Ordering::Relaxed),
            alerted: self.counters.alerted.load(Ordering::Relaxed),
            forwarded: self.counters.forwarded.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }
}

async fn worker_loop(
    id: usize,
    input: Arc<BoundedQueue<LogEntry>>,
    output: Option<Arc<BoundedQueue<LogEntry>>>,
    policy: Arc<dyn AlertPolicy>,
    counters: Arc<Counters>,
) {
    debug!(worker = id, "classifier worker started");

    while let Some(entry) = input.dequeue().await {
        counters.processed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(m::ENTRIES_CLASSIFIED_TOTAL).increment(1);

        if !policy.should_alert(&entry) {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        counters.alerted.fetch_add(1, Ordering::Relaxed);

        let Some(output) = output.as_deref() else {
            counters.dropped.fetch_add(1, Ordering::Relaxed);
            continue;
        };

        let level = entry.level();
        match output.enqueue(entry).await {
            Ok(()) => {
                counters.forwarded.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::ALERTS_FORWARDED_TOTAL, m::LABEL_LEVEL => level.as_str())
                    .increment(1);
            }
            Err(closed) => {
                counters.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker = id,
                    source = closed.0.source(),
                    "alert queue closed, dropping alert"
                );
            }
        }
    }

    debug!(worker = id, "classifier worker finished");
}

impl Pipeline for Classifier {
    fn name(&self) -> &str {
        "classifier"
    }

    async fn start(&mut self) -> Result<(), LogwardenError> {
        match self.state {
            StageState::Running => return Err(PipelineError::AlreadyRunning.into()),
            StageState::Stopped => {
                return Err(PipelineError::InitFailed(
                    "classifier input queue is closed".to_owned(),
                )
                .into());
            }
            StageState::Idle => {}
        }

        self.tasks = (0..self.workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&self.input),
                    self.output.clone(),
                    Arc::clone(&self.policy),
                    Arc::clone(&self.counters),
                ))
            })
            .collect();

        self.state = StageState::Running;
        info!(
            workers = self.workers,
            policy = self.policy.name(),
            alerts = self.output.is_some(),
            "classifier started"
        );
        Ok(())
    }

    /// 수집 큐를 닫고, 남은 엔트리를 모두 처리한 워커가 종료될 때까지 기다립니다.
    async fn stop(&mut self) -> Result<(), LogwardenError> {
        if self.state != StageState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        self.state = StageState::Stopped;
        self.input.shutdown();

        let mut first_error = None;
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "classifier worker failed");
                first_error.get_or_insert(e);
            }
        }

        let stats = self.stats();
        info!(
            processed = stats.processed,
            forwarded = stats.forwarded,
            dropped = stats.dropped,
            "classifier stopped"
        );

        match first_error {
            Some(e) => Err(LogPipelineError::from(e).into()),
            None => Ok(()),
        }
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            StageState::Running => {
                let exited = self.tasks.iter().filter(|t| t.is_finished()).count();
                if exited == 0 {
                    HealthStatus::Healthy
                } else if exited < self.tasks.len() {
                    HealthStatus::Degraded(format!("{exited} of {} workers exited", self.tasks.len()))
                } else {
                    HealthStatus::Unhealthy("all workers exited".to_owned())
                }
            }
            StageState::Idle => HealthStatus::Unhealthy("not started".to_owned()),
            StageState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}
