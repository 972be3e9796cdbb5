//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for LogwardenError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 실행 중 발생하는 일시적 I/O 실패(디렉토리 읽기 실패, accept 실패 등)는
//! 에러로 전파되지 않고 로그만 남긴 뒤 다음 주기에 재시도합니다.
//! 여기 정의된 에러는 주로 시작 실패(StartupFailure)를 나타냅니다.

use logwarden_core::error::{LogwardenError, PipelineError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 수집기 에러
    #[error("collector error: {source_type}: {reason}")]
    Collector {
        /// 수집 소스 유형 (file, network)
        source_type: String,
        /// 에러 사유
        reason: String,
    },

    /// 네트워크 리스너 바인드 실패
    #[error("failed to bind network listener on {addr}: {source}")]
    Bind {
        /// 바인드 주소
        addr: String,
        /// 원인 I/O 에러
        source: std::io::Error,
    },

    /// 알림 파일 열기 실패
    #[error("failed to open alert file {path}: {source}")]
    AlertSink {
        /// 알림 파일 경로
        path: String,
        /// 원인 I/O 에러
        source: std::io::Error,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 큐가 닫혀 엔트리를 전달할 수 없음
    #[error("queue is closed")]
    QueueClosed,

    /// 태스크 join 실패 (패닉 또는 취소)
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LogPipelineError> for LogwardenError {
    fn from(err: LogPipelineError) -> Self {
        LogwardenError::Pipeline(PipelineError::InitFailed(err.to_string()))
    }
}
