//! 로그 수집 모듈 -- 두 종류의 생산자가 수집 큐로 엔트리를 보냅니다.
//!
//! # 수집 소스
//! - [`FileTailer`]: 디렉토리 폴링 + 파일별 읽기 커서 (tail 방식)
//! - [`NetworkIngester`]: TCP 리스너, 개행 구분 텍스트 수신
//!
//! # 아키텍처
//! 각 수집기는 자체 tokio 태스크에서 실행되며, 파싱한 [`LogEntry`]를
//! 공유 [`BoundedQueue`]에 넣습니다. 큐가 가득 차면 수집기는 대기하고,
//! 정지 요청은 `CancellationToken`으로 전달됩니다.

pub mod file;
pub mod tcp;

pub use file::{DirectoryTailer, FileTailer, TailerConfig};
pub use tcp::{IngesterConfig, NetworkIngester};

use logwarden_core::metrics as m;
use logwarden_core::types::LogEntry;

use crate::error::LogPipelineError;
use crate::queue::BoundedQueue;

/// 파일 수집 소스 레이블
pub const SOURCE_FILE: &str = "file";

/// 네트워크 수집 소스 레이블
pub const SOURCE_NETWORK: &str = "network";

/// 기본 최대 라인 길이 (바이트)
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// 수집기 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectorStatus {
    /// 실행 대기 중
    Idle,
    /// 실행 중
    Running,
    /// 정상 종료됨
    Stopped,
}

/// 엔트리를 수집 큐에 넣습니다. 큐가 가득 차면 대기합니다.
///
/// 큐가 닫혔으면 엔트리를 버리고 [`LogPipelineError::QueueClosed`]를 반환합니다.
pub(crate) async fn forward(
    queue: &BoundedQueue<LogEntry>,
    entry: LogEntry,
    source_type: &'static str,
) -> Result<(), LogPipelineError> {
    match queue.enqueue(entry).await {
        Ok(()) => {
            metrics::counter!(m::LINES_COLLECTED_TOTAL, m::LABEL_SOURCE => source_type)
                .increment(1);
            Ok(())
        }
        Err(closed) => {
            tracing::debug!(
                source = closed.0.source(),
                source_type,
                "ingest queue closed, dropping entry"
            );
            Err(LogPipelineError::QueueClosed)
        }
    }
}
