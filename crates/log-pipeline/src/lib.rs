#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`queue`]: 닫기 신호를 지원하는 스레드 안전 FIFO 큐 ([`BoundedQueue`])
//! - [`collector`]: 디렉토리 tailer와 TCP 수신기
//! - [`parser`]: `[LEVEL] message` 라인 파서
//! - [`rule`]: 심각도 임계값 + 리터럴 패턴 알림 정책
//! - [`classifier`]: 수집 큐를 소비하는 워커 풀
//! - [`alert`]: 알림 파일 / 표준 출력 싱크
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Pipeline trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정에서 변환)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! FileTailer*, NetworkIngester -> ingest queue -> Classifier[N] -> alert queue -> AlertSink
//!                                                                                 |
//!                                                                       alerts.log / stdout
//! ```

pub mod alert;
pub mod classifier;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod queue;

pub mod collector;
pub mod parser;
pub mod rule;

// --- 주요 타입 re-export ---

// 파이프라인
pub use pipeline::{LogPipeline, LogPipelineBuilder};

// 설정
pub use config::{PipelineConfig, PipelineConfigBuilder};

// 에러
pub use error::LogPipelineError;

// 큐
pub use queue::{BoundedQueue, QueueClosed, TryEnqueueError};

// 파서
pub use parser::{parse_bytes, parse_line, parse_lossy};

// 규칙
pub use rule::ThresholdPolicy;

// 수집기
pub use collector::{
    CollectorStatus, DirectoryTailer, FileTailer, IngesterConfig, NetworkIngester, TailerConfig,
};

// 분류 / 알림
pub use alert::{AlertSink, AlertSinkConfig, EchoWriter, format_alert};
pub use classifier::{Classifier, ClassifierStats};
