//! 알림 싱크 -- 알림 큐를 소비하여 파일과 표준 출력에 기록합니다.
//!
//! [`AlertSink`]는 단일 태스크로 동작합니다. 알림마다 한 줄씩 파일에 추가하고
//! 즉시 flush합니다 (배치 없음). 같은 내용을 `[ALERT] ` 접두사와 함께
//! 표준 출력에도 씁니다. 표준 출력 기록 실패는 로그와 메트릭으로만 남깁니다.
//!
//! # 알림 라인 형식
//! ```text
//! [2024-01-15 12:00:00] [CRITICAL] [/var/log/app/db.log] disk full
//! ```
//! 타임스탬프는 엔트리 생성 시각을 로컬 시간대로 표시합니다.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use logwarden_core::error::{LogwardenError, PipelineError};
use logwarden_core::metrics as m;
use logwarden_core::pipeline::{HealthStatus, Pipeline};
use logwarden_core::types::LogEntry;

use crate::error::LogPipelineError;
use crate::queue::BoundedQueue;

/// 표준 출력 알림 라인 접두사
pub const STDOUT_PREFIX: &str = "[ALERT] ";

/// 알림 에코 대상 (기본값은 표준 출력)
pub type EchoWriter = Box<dyn Write + Send + Sync>;

/// 알림 라인 타임스탬프 형식
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 엔트리를 알림 라인으로 변환합니다 (개행 미포함).
pub fn format_alert(entry: &LogEntry) -> String {
    let timestamp: DateTime<Local> = entry.timestamp().into();
    format!(
        "[{}] [{}] [{}] {}",
        timestamp.format(TIMESTAMP_FORMAT),
        entry.level(),
        entry.source(),
        entry.message()
    )
}

/// 알림 싱크 설정
#[derive(Debug, Clone)]
pub struct AlertSinkConfig {
    /// 알림을 추가 기록할 파일
    pub path: PathBuf,
    /// 표준 출력에도 기록할지 여부
    pub echo_stdout: bool,
}

impl AlertSinkConfig {
    /// 표준 출력 기록을 켠 설정을 생성합니다.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            echo_stdout: true,
        }
    }
}

/// 알림 싱크 단계
pub struct AlertSink {
    config: AlertSinkConfig,
    queue: Arc<BoundedQueue<LogEntry>>,
    written: Arc<AtomicU64>,
    echo: Option<EchoWriter>,
    task: Option<JoinHandle<()>>,
    stopped: bool,
}

impl AlertSink {
    /// 새 알림 싱크를 생성합니다. 파일은 [`start`](Pipeline::start)에서 엽니다.
    pub fn new(config: AlertSinkConfig, queue: Arc<BoundedQueue<LogEntry>>) -> Self {
        Self {
            config,
            queue,
            written: Arc::new(AtomicU64::new(0)),
            echo: None,
            task: None,
            stopped: false,
        }
    }

    /// 표준 출력 대신 `writer`로 알림을 에코합니다. `echo_stdout`이 꺼져 있으면 무시됩니다.
    pub fn with_echo_writer(mut self, writer: EchoWriter) -> Self {
        self.echo = Some(writer);
        self
    }

    /// 알림 파일 경로
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// 지금까지 파일에 기록한 알림 수
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

async fn sink_loop(
    mut file: File,
    queue: Arc<BoundedQueue<LogEntry>>,
    mut echo: Option<EchoWriter>,
    written: Arc<AtomicU64>,
) {
    while let Some(entry) = queue.dequeue().await {
        let line = format_alert(&entry);

        if let Some(out) = echo.as_mut()
            && let Err(e) = echo_line(out, &line)
        {
            metrics::counter!(m::ALERT_ECHO_ERRORS_TOTAL).increment(1);
            warn!(error = %e, source = entry.source(), "failed to echo alert");
        }

        match write_line(&mut file, &line).await {
            Ok(()) => {
                written.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(m::ALERTS_WRITTEN_TOTAL).increment(1);
            }
            Err(e) => {
                metrics::counter!(m::ALERT_WRITE_ERRORS_TOTAL).increment(1);
                error!(error = %e, source = entry.source(), "failed to write alert");
            }
        }
    }
}

fn echo_line(out: &mut EchoWriter, line: &str) -> std::io::Result<()> {
    writeln!(out, "{STDOUT_PREFIX}{line}")?;
    out.flush()
}

async fn write_line(file: &mut File, line: &str) -> std::io::Result<()> {
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes()).await?;
    file.flush().await
}

impl Pipeline for AlertSink {
    fn name(&self) -> &str {
        "alert-sink"
    }

    async fn start(&mut self) -> Result<(), LogwardenError> {
        if self.task.is_some() {
            return Err(PipelineError::AlreadyRunning.into());
        }
        if self.stopped {
            return Err(PipelineError::InitFailed("alert queue is closed".to_owned()).into());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)
            .await
            .map_err(|e| LogPipelineError::AlertSink {
                path: self.config.path.display().to_string(),
                source: e,
            })?;

        let echo = self.config.echo_stdout.then(|| {
            self.echo
                .take()
                .unwrap_or_else(|| Box::new(std::io::stdout()) as EchoWriter)
        });

        info!(path = %self.config.path.display(), "alert sink started");
        self.task = Some(tokio::spawn(sink_loop(
            file,
            Arc::clone(&self.queue),
            echo,
            Arc::clone(&self.written),
        )));
        Ok(())
    }

    /// 알림 큐를 닫고, 남은 알림을 모두 기록한 태스크가 종료될 때까지 기다립니다.
    async fn stop(&mut self) -> Result<(), LogwardenError> {
        let task = self.task.take().ok_or(PipelineError::NotRunning)?;
        self.stopped = true;
        self.queue.shutdown();
        task.await.map_err(LogPipelineError::from)?;
        info!(written = self.written(), "alert sink stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match &self.task {
            Some(task) if task.is_finished() => {
                HealthStatus::Unhealthy("alert sink task exited".to_owned())
            }
            Some(_) => HealthStatus::Healthy,
            None if self.stopped => HealthStatus::Unhealthy("stopped".to_owned()),
            None => HealthStatus::Unhealthy("not started".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    use logwarden_core::types::Level;

    fn fixed_entry() -> (LogEntry, SystemTime) {
        let ts = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let entry = LogEntry::new("x.log", "disk full", Level::Critical, "[CRITICAL] disk full")
            .with_timestamp(ts);
        (entry, ts)
    }

    #[test]
    fn format_matches_alert_line_layout() {
        let (entry, ts) = fixed_entry();
        let expected_ts = DateTime::<Local>::from(ts)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        assert_eq!(
            format_alert(&entry),
            format!("[{expected_ts}] [CRITICAL] [x.log] disk full")
        );
    }

    #[test]
    fn timestamp_has_fixed_width() {
        let (entry, _) = fixed_entry();
        let line = format_alert(&entry);
        // "[YYYY-MM-DD HH:MM:SS]"
        assert_eq!(&line[0..1], "[");
        assert_eq!(&line[20..21], "]");
        assert_eq!(&line[5..6], "-");
        assert_eq!(&line[11..12], " ");
    }

    #[tokio::test]
    async fn writes_and_flushes_each_alert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.log");
        std::fs::write(&path, "previous\n").unwrap();

        let queue = Arc::new(BoundedQueue::new(0));
        let config = AlertSinkConfig {
            echo_stdout: false,
            ..AlertSinkConfig::new(&path)
        };
        let mut sink = AlertSink::new(config, Arc::clone(&queue));
        sink.start().await.unwrap();

        let (entry, _) = fixed_entry();
        let expected = format_alert(&entry);
        queue.enqueue(entry).await.unwrap();
        queue
            .enqueue(LogEntry::new("y.log", "second", Level::Error, "second"))
            .await
            .unwrap();

        sink.stop().await.unwrap();
        assert_eq!(sink.written(), 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3, "file is opened in append mode");
        assert_eq!(lines[0], "previous");
        assert_eq!(lines[1], expected);
        assert!(lines[2].ends_with("[ERROR] [y.log] second"));
    }

    /// 테스트에서 에코 출력을 확인하기 위한 공유 버퍼
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// 닫힌 표준 출력처럼 항상 실패하는 writer
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }
    }

    #[tokio::test]
    async fn echo_line_has_alert_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let out = SharedBuf::default();
        let queue = Arc::new(BoundedQueue::new(0));
        let mut sink = AlertSink::new(
            AlertSinkConfig::new(dir.path().join("alerts.log")),
            Arc::clone(&queue),
        )
        .with_echo_writer(Box::new(out.clone()));
        sink.start().await.unwrap();

        let (entry, _) = fixed_entry();
        let expected = format!("[ALERT] {}\n", format_alert(&entry));
        queue.enqueue(entry).await.unwrap();
        sink.stop().await.unwrap();

        let echoed = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert_eq!(echoed, expected);
    }

    #[tokio::test]
    async fn echo_disabled_ignores_writer() {
        let dir = tempfile::tempdir().unwrap();
        let out = SharedBuf::default();
        let queue = Arc::new(BoundedQueue::new(0));
        let config = AlertSinkConfig {
            echo_stdout: false,
            ..AlertSinkConfig::new(dir.path().join("alerts.log"))
        };
        let mut sink =
            AlertSink::new(config, Arc::clone(&queue)).with_echo_writer(Box::new(out.clone()));
        sink.start().await.unwrap();

        queue.enqueue(fixed_entry().0).await.unwrap();
        sink.stop().await.unwrap();

        assert_eq!(sink.written(), 1);
        assert!(out.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_echo_still_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.log");
        let queue = Arc::new(BoundedQueue::new(0));
        let mut sink = AlertSink::new(AlertSinkConfig::new(&path), Arc::clone(&queue))
            .with_echo_writer(Box::new(BrokenPipe));
        sink.start().await.unwrap();

        for _ in 0..3 {
            queue.enqueue(fixed_entry().0).await.unwrap();
        }
        sink.stop().await.unwrap();

        assert_eq!(sink.written(), 3);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);
    }

    #[tokio::test]
    async fn unopenable_file_is_startup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("alerts.log");
        let mut sink = AlertSink::new(AlertSinkConfig::new(&path), Arc::new(BoundedQueue::new(0)));

        let err = sink.start().await.unwrap_err();
        assert!(err.to_string().contains("alerts.log"));
        assert!(sink.health_check().await.is_unhealthy());
    }

    #[tokio::test]
    async fn lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = AlertSink::new(
            AlertSinkConfig::new(dir.path().join("alerts.log")),
            Arc::new(BoundedQueue::new(0)),
        );
        assert!(sink.stop().await.is_err());

        sink.start().await.unwrap();
        assert!(sink.health_check().await.is_healthy());
        assert!(sink.start().await.is_err());

        sink.stop().await.unwrap();
        assert!(sink.health_check().await.is_unhealthy());
        assert!(sink.start().await.is_err());
    }
}
