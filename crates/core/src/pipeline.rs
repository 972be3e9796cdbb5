//! 파이프라인 trait -- 단계 생명주기와 알림 판정 확장 포인트 정의
//!
//! 파일 tailer, 네트워크 수신기, 분류기, 알림 싱크는 모두 [`Pipeline`]을 구현하며,
//! 조립 측에서는 [`DynPipeline`]으로 묶어 순서대로 시작/정지합니다.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::LogwardenError;
use crate::types::LogEntry;

/// `dyn` 호환을 위한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 단계의 건강 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 주의 필요 (예: 큐 사용률 높음)
    Degraded(String),
    /// 동작하지 않음
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// 단계 생명주기 trait
///
/// 각 단계는 독립적으로 시작/정지되며, `stop()`은 단계가 소유한 태스크가
/// 모두 종료될 때까지 기다린 뒤 반환해야 합니다.
pub trait Pipeline: Send + Sync {
    /// 단계 이름 (로그와 헬스 리포트에 사용)
    fn name(&self) -> &str;

    /// 단계를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LogwardenError>> + Send;

    /// 단계를 정지하고 태스크 종료를 기다립니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LogwardenError>> + Send;

    /// 단계의 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// dyn-compatible 단계 trait
///
/// `Pipeline`은 RPITIT를 사용하므로 `dyn Pipeline`이 불가합니다.
/// `DynPipeline`은 `BoxFuture`를 반환하여 `Vec<Box<dyn DynPipeline>>`으로
/// 단계를 순서대로 관리할 수 있게 합니다.
pub trait DynPipeline: Send + Sync {
    /// 단계 이름
    fn name(&self) -> &str;

    /// 단계를 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), LogwardenError>>;

    /// 단계를 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogwardenError>>;

    /// 단계의 건강 상태를 확인합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

/// `Pipeline`을 구현한 타입은 자동으로 `DynPipeline`도 구현됩니다.
impl<T: Pipeline> DynPipeline for T {
    fn name(&self) -> &str {
        Pipeline::name(self)
    }

    fn start(&mut self) -> BoxFuture<'_, Result<(), LogwardenError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), LogwardenError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

/// 알림 판정 trait
///
/// 분류기 워커가 엔트리마다 호출합니다. 여러 워커가 동시에 호출하므로
/// 구현은 내부 가변 상태 없이 `&self`만으로 판정해야 합니다.
pub trait AlertPolicy: Send + Sync {
    /// 정책 이름
    fn name(&self) -> &str;

    /// 엔트리를 알림 큐로 전달해야 하면 `true`
    fn should_alert(&self, entry: &LogEntry) -> bool;
}
