//! TCP 로그 수신기
//!
//! 개행으로 구분된 평문 로그 라인을 TCP로 수신합니다. 프레이밍, 길이 접두사,
//! 핸드셰이크는 없습니다.
//!
//! 연결은 한 번에 하나씩, 수락 루프 안에서 직접 처리됩니다. 수락 대기는
//! `accept_timeout`으로 제한되어 트래픽이 없어도 정지 요청을 빠르게 확인합니다.
//!
//! 한 번의 read에서 개행 없이 남은 부분 라인은 연결별 버퍼에 보관했다가
//! 다음 read와 이어 붙입니다. 상대가 연결을 닫을 때 남아 있는 부분 라인은
//! 마지막 라인으로 수집합니다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logwarden_core::error::{LogwardenError, PipelineError};
use logwarden_core::metrics as m;
use logwarden_core::pipeline::{HealthStatus, Pipeline};
use logwarden_core::types::LogEntry;

use super::{CollectorStatus, DEFAULT_MAX_LINE_LENGTH, SOURCE_NETWORK, forward};
use crate::error::LogPipelineError;
use crate::parser::parse_bytes;
use crate::queue::BoundedQueue;

/// 네트워크 수신기 설정
#[derive(Debug, Clone)]
pub struct IngesterConfig {
    /// 바인드 주소 (예: "0.0.0.0:8080")
    pub bind_addr: String,
    /// 수락 대기 제한 시간
    pub accept_timeout: Duration,
    /// read 한 번에 사용하는 버퍼 크기 (바이트)
    pub read_buffer_size: usize,
    /// 최대 라인 길이 (바이트). 개행 없이 이 길이를 넘으면 연결을 닫습니다.
    pub max_line_length: usize,
}

impl IngesterConfig {
    /// 기본값으로 설정을 생성합니다.
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            accept_timeout: Duration::from_secs(1),
            read_buffer_size: 4096,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// 연결 처리 종료 사유
#[derive(Debug, PartialEq, Eq)]
enum ConnectionEnd {
    /// 상대가 닫았거나 read 에러, 또는 라인 길이 초과
    Closed,
    /// 수집 큐가 닫힘
    QueueClosed,
}

/// TCP 로그 수신기
///
/// [`start`](Pipeline::start)에서 리스너를 바인드하므로 바인드 실패는
/// 시작 실패로 보고됩니다.
pub struct NetworkIngester {
    config: IngesterConfig,
    queue: Arc<BoundedQueue<LogEntry>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    status: CollectorStatus,
}

impl NetworkIngester {
    /// 새 수신기를 생성합니다.
    pub fn new(config: IngesterConfig, queue: Arc<BoundedQueue<LogEntry>>) -> Self {
        Self {
            config,
            queue,
            cancel: CancellationToken::new(),
            task: None,
            local_addr: None,
            status: CollectorStatus::Idle,
        }
    }

    /// 설정된 바인드 주소
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// 실제로 바인드된 주소 (시작 전에는 `None`)
    ///
    /// 포트 0으로 바인드한 경우 OS가 할당한 포트를 확인할 때 사용합니다.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// 현재 상태
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }

    /// 수락 루프
    async fn accept_loop(
        listener: TcpListener,
        config: IngesterConfig,
        queue: Arc<BoundedQueue<LogEntry>>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = timeout(config.accept_timeout, listener.accept()) => {
                    let (stream, peer) = match accepted {
                        Err(_elapsed) => continue,
                        Ok(Err(e)) => {
                            debug!(error = %e, "accept failed");
                            continue;
                        }
                        Ok(Ok(conn)) => conn,
                    };

                    metrics::counter!(m::NETWORK_CONNECTIONS_TOTAL).increment(1);
                    debug!(%peer, "accepted connection");

                    let end = tokio::select! {
                        _ = cancel.cancelled() => break,
                        end = serve_connection(stream, peer, &config, &queue) => end,
                    };
                    if end == ConnectionEnd::QueueClosed {
                        info!("ingest queue closed, network ingester stopping");
                        break;
                    }
                }
            }
        }
        info!(bind_addr = %config.bind_addr, "network ingester stopped");
    }
}

/// 단일 연결을 상대가 닫을 때까지 처리합니다.
async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    config: &IngesterConfig,
    queue: &BoundedQueue<LogEntry>,
) -> ConnectionEnd {
    let source = format!("network:{}:{}", peer.ip(), peer.port());
    let mut buf = vec![0u8; config.read_buffer_size.max(1)];
    let mut pending = BytesMut::with_capacity(config.read_buffer_size);

    loop {
        let n = match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(%peer, error = %e, "read failed, closing connection");
                return ConnectionEnd::Closed;
            }
        };
        pending.extend_from_slice(&buf[..n]);

        while let Some(pos) = pending.iter().position(|&b| b == b'\n') {
            let line = pending.split_to(pos + 1);
            if let Some(entry) = parse_bytes(&source, &line)
                && forward(queue, entry, SOURCE_NETWORK).await.is_err()
            {
                return ConnectionEnd::QueueClosed;
            }
        }

        if pending.len() > config.max_line_length {
            warn!(
                %peer,
                pending = pending.len(),
                max = config.max_line_length,
                "line exceeds max length, closing connection"
            );
            return ConnectionEnd::Closed;
        }
    }

    // 상대가 닫을 때 개행 없이 남은 라인
    if let Some(entry) = parse_bytes(&source, &pending)
        && forward(queue, entry, SOURCE_NETWORK).await.is_err()
    {
        return ConnectionEnd::QueueClosed;
    }

    debug!(%peer, "connection closed by peer");
    ConnectionEnd::Closed
}

impl Pipeline for NetworkIngester {
    fn name(&self) -> &str {
        "network-ingester"
    }

    async fn start(&mut self) -> Result<(), LogwardenError> {
        if self.task.is_some() {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .map_err(|e| LogPipelineError::Bind {
                addr: self.config.bind_addr.clone(),
                source: e,
            })?;
        let local_addr = listener.local_addr().map_err(LogPipelineError::from)?;
        info!(%local_addr, "network ingester listening");

        self.cancel = CancellationToken::new();
        self.local_addr = Some(local_addr);
        self.task = Some(tokio::spawn(Self::accept_loop(
            listener,
            self.config.clone(),
            Arc::clone(&self.queue),
            self.cancel.clone(),
        )));
        self.status = CollectorStatus::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogwardenError> {
        let task = self.task.take().ok_or(PipelineError::NotRunning)?;
        self.cancel.cancel();
        self.status = CollectorStatus::Stopped;
        task.await.map_err(LogPipelineError::from)?;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match (&self.status, &self.task) {
            (CollectorStatus::Running, Some(task)) if task.is_finished() => {
                HealthStatus::Unhealthy("accept loop exited".to_owned())
            }
            (CollectorStatus::Running, _) => HealthStatus::Healthy,
            (CollectorStatus::Idle, _) => HealthStatus::Unhealthy("not started".to_owned()),
            (CollectorStatus::Stopped, _) => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}
