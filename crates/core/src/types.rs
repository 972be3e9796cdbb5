//! 도메인 타입 -- 파이프라인 전역에서 사용되는 공통 타입
//!
//! 수집기(파일 tailer, 네트워크 수신기)가 [`LogEntry`]를 만들고,
//! 큐를 거쳐 분류기와 알림 싱크로 소유권이 이동합니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 로그 심각도 레벨
///
/// `Ord` 구현으로 임계값 비교가 가능합니다 (`Debug < Info < Warning < Error < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "String", into = "String")]
pub enum Level {
    /// 디버그 출력
    Debug,
    /// 정보성 로그 (레이블이 없거나 인식하지 못한 경우의 기본값)
    #[default]
    Info,
    /// 경고
    Warning,
    /// 에러
    Error,
    /// 치명적 -- 즉시 대응 필요
    Critical,
}

impl Level {
    /// 모든 레벨 (오름차순)
    pub const ALL: [Level; 5] = [
        Self::Debug,
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    /// 레이블 문자열에서 레벨을 추론합니다.
    ///
    /// 대소문자를 구분하지 않는 부분 문자열 매칭이며, 아래 순서로 먼저 걸리는 쪽이 이깁니다.
    /// `debug`/`dbg` → `info` → `warn` → `error`/`err` → `critical`/`crit`/`fatal`.
    /// 어디에도 해당하지 않으면 [`Level::Info`]입니다.
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_lowercase();
        let has = |needle: &str| lower.contains(needle);

        if has("debug") || has("dbg") {
            Self::Debug
        } else if has("info") {
            Self::Info
        } else if has("warn") {
            Self::Warning
        } else if has("error") || has("err") {
            Self::Error
        } else if has("critical") || has("crit") || has("fatal") {
            Self::Critical
        } else {
            Self::Info
        }
    }

    /// 대문자 레벨 이름을 반환합니다 (알림 파일 형식에 사용).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Level {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.as_str().to_owned()
    }
}

/// 로그 엔트리
///
/// 파싱된 로그 레코드 하나를 나타냅니다. 생성 이후에는 변경되지 않으며,
/// 현재 참조하고 있는 단계(생산자 → 큐 → 소비자)가 단독으로 소유합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    source: String,
    message: String,
    level: Level,
    timestamp: SystemTime,
    raw_line: String,
}

impl LogEntry {
    /// 현재 시각을 타임스탬프로 하는 엔트리를 생성합니다.
    pub fn new(
        source: impl Into<String>,
        message: impl Into<String>,
        level: Level,
        raw_line: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
            level,
            timestamp: SystemTime::now(),
            raw_line: raw_line.into(),
        }
    }

    /// 타임스탬프를 지정합니다.
    pub fn with_timestamp(mut self, timestamp: SystemTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// 원본 소스 (파일 경로 또는 `network:<ip>:<port>`)
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 파싱된 메시지 본문
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 심각도
    pub fn level(&self) -> Level {
        self.level
    }

    /// 생성 시각
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// 수신한 그대로의 원본 라인 (레벨 접두사 포함)
    pub fn raw_line(&self) -> &str {
        &self.raw_line
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] [{}] {}", self.level, self.source, self.message)
    }
}
