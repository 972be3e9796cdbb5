//! 디렉토리 기반 로그 수집기
//!
//! 감시 디렉토리를 주기적으로 폴링하며, 디렉토리 안의 파일마다 읽기 커서를 유지하고
//! 새로 추가된 라인을 수집합니다. `tail -f`와 유사한 동작을 비동기 방식으로 구현합니다.
//!
//! # 파일 처리 규칙
//! - 처음 발견한 파일: 처음부터 끝까지 모든 라인을 수집한 뒤 커서를 파일 끝으로 이동
//!   (개행 없는 마지막 라인 포함). 기존 backlog는 한 번만 수집됩니다.
//! - 추적 중인 파일: 커서부터 파일 끝까지, 개행으로 끝난 라인만 수집
//! - 파일 크기가 커서보다 작아짐 (truncation): 커서를 0으로 되돌림
//! - 숨김 파일(`.`으로 시작)과 일반 파일이 아닌 항목은 건너뜀
//!
//! 디렉토리나 파일을 읽지 못하면 이번 주기만 건너뛰고 다음 주기에 다시 시도합니다.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use logwarden_core::error::{LogwardenError, PipelineError};
use logwarden_core::metrics as m;
use logwarden_core::pipeline::{HealthStatus, Pipeline};
use logwarden_core::types::LogEntry;

use super::{CollectorStatus, DEFAULT_MAX_LINE_LENGTH, SOURCE_FILE, forward};
use crate::error::LogPipelineError;
use crate::parser::parse_lossy;
use crate::queue::BoundedQueue;

/// 디렉토리 tailer 설정
#[derive(Debug, Clone)]
pub struct TailerConfig {
    /// 감시할 디렉토리
    pub directory: PathBuf,
    /// 폴링 주기
    pub poll_interval: Duration,
    /// 최대 라인 길이 (바이트). 초과분은 잘라서 버립니다.
    pub max_line_length: usize,
}

impl TailerConfig {
    /// 기본 폴링 주기(5초)로 설정을 생성합니다.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            poll_interval: Duration::from_secs(5),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// 폴링 주기를 지정합니다.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// 파일별 추적 상태
#[derive(Debug)]
struct TrackedFile {
    /// 열린 읽기 핸들
    file: File,
    /// 마지막으로 읽은 위치 (바이트 오프셋)
    offset: u64,
    /// 엔트리 source 필드에 쓰이는 경로 문자열
    source: String,
}

/// 한 번의 읽기 결과
struct ReadProgress {
    offset: u64,
    emitted: usize,
}

/// 디렉토리 하나를 폴링하는 작업자
///
/// [`poll_once`](Self::poll_once)로 한 주기를 직접 실행할 수 있고,
/// [`run`](Self::run)은 취소될 때까지 주기적으로 폴링합니다.
pub struct DirectoryTailer {
    config: TailerConfig,
    queue: Arc<BoundedQueue<LogEntry>>,
    files: HashMap<PathBuf, TrackedFile>,
}

impl DirectoryTailer {
    /// 새 작업자를 생성합니다.
    pub fn new(config: TailerConfig, queue: Arc<BoundedQueue<LogEntry>>) -> Self {
        Self {
            config,
            queue,
            files: HashMap::new(),
        }
    }

    /// 감시 디렉토리
    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// 추적 중인 파일 수
    pub fn tracked_files(&self) -> usize {
        self.files.len()
    }

    /// 파일의 현재 읽기 커서
    pub fn offset(&self, path: &Path) -> Option<u64> {
        self.files.get(path).map(|tracked| tracked.offset)
    }

    /// 디렉토리를 한 번 스캔하고 새 라인을 수집합니다.
    ///
    /// 수집 큐에 넣은 엔트리 수를 반환합니다. 수집 큐가 닫힌 경우에만
    /// 에러([`LogPipelineError::QueueClosed`])를 반환합니다.
    pub async fn poll_once(&mut self) -> Result<usize, LogPipelineError> {
        let Some(paths) = self.list_files().await else {
            return Ok(0);
        };

        // 디렉토리에서 사라진 파일의 핸들을 해제
        self.files
            .retain(|path, _| paths.binary_search(path).is_ok());

        let max_line_length = self.config.max_line_length;
        let mut emitted = 0;

        for path in paths {
            if let Some(tracked) = self.files.get_mut(&path) {
                let len = match tracked.file.metadata().await {
                    Ok(meta) => meta.len(),
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "failed to stat tracked file");
                        continue;
                    }
                };

                if len < tracked.offset {
                    info!(
                        path = %path.display(),
                        offset = tracked.offset,
                        len,
                        "file truncated, rewinding to start"
                    );
                    tracked.offset = 0;
                }
                if len == tracked.offset {
                    continue;
                }

                let progress = read_lines(
                    &mut tracked.file,
                    tracked.offset,
                    false,
                    &tracked.source,
                    max_line_length,
                    &self.queue,
                )
                .await?;
                tracked.offset = progress.offset;
                emitted += progress.emitted;
            } else {
                let file = match File::open(&path).await {
                    Ok(file) => file,
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "failed to open file");
                        continue;
                    }
                };

                let mut tracked = TrackedFile {
                    file,
                    offset: 0,
                    source: path.display().to_string(),
                };
                let progress = read_lines(
                    &mut tracked.file,
                    0,
                    true,
                    &tracked.source,
                    max_line_length,
                    &self.queue,
                )
                .await?;
                tracked.offset = progress.offset;
                emitted += progress.emitted;

                debug!(
                    path = %path.display(),
                    backlog = progress.emitted,
                    offset = tracked.offset,
                    "tracking new file"
                );
                self.files.insert(path, tracked);
            }
        }

        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::TRACKED_FILES, "directory" => self.config.directory.display().to_string())
            .set(self.files.len() as f64);

        if emitted > 0 {
            trace!(directory = %self.config.directory.display(), emitted, "poll complete");
        }
        Ok(emitted)
    }

    /// 취소될 때까지 폴링합니다. 종료 시 파일 핸들을 해제하고 자신을 돌려줍니다.
    ///
    /// 첫 스캔은 즉시 실행되며, 이후 `poll_interval`마다 반복됩니다.
    pub async fn run(mut self, cancel: CancellationToken) -> Self {
        info!(
            directory = %self.config.directory.display(),
            poll_interval = ?self.config.poll_interval,
            "file tailer started"
        );

        let directory = self.config.directory.display().to_string();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.poll_once() => {
                    if let Err(e) = result {
                        info!(directory, reason = %e, "file tailer stopping");
                        break;
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        self.release();
        info!(directory, "file tailer stopped");
        self
    }

    /// 모든 파일 추적 상태와 핸들을 해제합니다.
    fn release(&mut self) {
        self.files.clear();
    }

    /// 감시 대상 파일 목록 (이름순). 디렉토리를 읽지 못하면 `None`.
    async fn list_files(&self) -> Option<Vec<PathBuf>> {
        let directory = &self.config.directory;
        let mut entries = match tokio::fs::read_dir(directory).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(directory = %directory.display(), error = %e, "failed to read directory");
                return None;
            }
        };

        let mut paths = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if entry.file_name().to_string_lossy().starts_with('.') {
                        continue;
                    }
                    let path = entry.path();
                    match tokio::fs::metadata(&path).await {
                        Ok(meta) if meta.is_file() => paths.push(path),
                        Ok(_) => {}
                        Err(e) => trace!(path = %path.display(), error = %e, "failed to stat entry"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(directory = %directory.display(), error = %e, "failed to list directory");
                    return None;
                }
            }
        }

        paths.sort();
        Some(paths)
    }
}

/// `start`부터 파일 끝까지 라인을 읽어 큐에 넣습니다.
///
/// `include_partial`이 `false`이면 개행 없는 마지막 라인은 읽지 않은 것으로 남깁니다.
/// 읽기 도중 I/O 에러가 나면 그때까지의 진행 상황을 반환합니다.
async fn read_lines(
    file: &mut File,
    start: u64,
    include_partial: bool,
    source: &str,
    max_line_length: usize,
    queue: &BoundedQueue<LogEntry>,
) -> Result<ReadProgress, LogPipelineError> {
    let mut progress = ReadProgress {
        offset: start,
        emitted: 0,
    };

    if let Err(e) = file.seek(SeekFrom::Start(start)).await {
        debug!(source, error = %e, "failed to seek");
        return Ok(progress);
    }

    let mut reader = BufReader::new(file);
    let mut line = Vec::new();

    loop {
        line.clear();
        let (consumed, terminated) =
            match read_bounded_line(&mut reader, &mut line, max_line_length).await {
                Ok(read) => read,
                Err(e) => {
                    debug!(source, error = %e, "failed to read file");
                    break;
                }
            };

        if consumed == 0 || (!terminated && !include_partial) {
            break;
        }
        progress.offset += consumed;

        if consumed > line.len() as u64 {
            warn!(
                source,
                length = consumed,
                max = max_line_length,
                "line exceeds max length, truncated"
            );
        }

        forward(queue, parse_lossy(source, &line), SOURCE_FILE).await?;
        progress.emitted += 1;

        if !terminated {
            break;
        }
    }

    Ok(progress)
}

/// 개행까지 한 라인을 읽되 `buf`에는 최대 `max` 바이트만 보관합니다.
///
/// `(소비한 바이트 수, 개행으로 끝났는지)`를 반환합니다. 초과분은 소비 후 버립니다.
async fn read_bounded_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> std::io::Result<(u64, bool)> {
    let mut consumed = 0u64;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok((consumed, false));
        }

        let (chunk_len, found) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (i + 1, true),
            None => (available.len(), false),
        };
        let room = max.saturating_sub(buf.len());
        buf.extend_from_slice(&available[..chunk_len.min(room)]);
        reader.consume(chunk_len);
        consumed += chunk_len as u64;

        if found {
            return Ok((consumed, true));
        }
    }
}

/// 디렉토리 tailer 단계
///
/// [`DirectoryTailer`]를 별도 tokio 태스크에서 실행하고 생명주기를 관리합니다.
pub struct FileTailer {
    name: String,
    worker: Option<DirectoryTailer>,
    cancel: CancellationToken,
    task: Option<JoinHandle<DirectoryTailer>>,
    status: CollectorStatus,
}

impl FileTailer {
    /// 새 tailer 단계를 생성합니다.
    pub fn new(config: TailerConfig, queue: Arc<BoundedQueue<LogEntry>>) -> Self {
        Self {
            name: format!("file-tailer:{}", config.directory.display()),
            worker: Some(DirectoryTailer::new(config, queue)),
            cancel: CancellationToken::new(),
            task: None,
            status: CollectorStatus::Idle,
        }
    }

    /// 현재 상태
    pub fn status(&self) -> &CollectorStatus {
        &self.status
    }
}

impl Pipeline for FileTailer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&mut self) -> Result<(), LogwardenError> {
        if self.task.is_some() {
            return Err(PipelineError::AlreadyRunning.into());
        }
        let worker = self.worker.take().ok_or_else(|| LogPipelineError::Collector {
            source_type: SOURCE_FILE.to_owned(),
            reason: format!("{}: worker unavailable", self.name),
        })?;

        self.cancel = CancellationToken::new();
        self.task = Some(tokio::spawn(worker.run(self.cancel.clone())));
        self.status = CollectorStatus::Running;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LogwardenError> {
        let task = self.task.take().ok_or(PipelineError::NotRunning)?;
        self.cancel.cancel();
        self.status = CollectorStatus::Stopped;

        let worker = task.await.map_err(LogPipelineError::from)?;
        self.worker = Some(worker);
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match (&self.status, &self.task) {
            (CollectorStatus::Running, Some(task)) if task.is_finished() => {
                HealthStatus::Unhealthy("tailer task exited".to_owned())
            }
            (CollectorStatus::Running, _) => HealthStatus::Healthy,
            (CollectorStatus::Idle, _) => HealthStatus::Unhealthy("not started".to_owned()),
            (CollectorStatus::Stopped, _) => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}
