//! 알림 판정 규칙 -- 심각도 임계값과 리터럴 패턴
//!
//! [`ThresholdPolicy`]는 core의 [`AlertPolicy`]를 구현합니다.
//!
//! # 판정 방식
//! - 기본 (`pattern_escalation = false`): `level >= threshold`인 엔트리만 전달합니다.
//!   패턴은 임계값을 통과한 엔트리에 대해서만 검사되며 로그/메트릭에만 쓰입니다.
//! - 승격 (`pattern_escalation = true`): `level >= threshold`이거나
//!   메시지 또는 원본 라인에 패턴이 포함되면 전달합니다.
//!
//! 패턴은 대소문자를 구분하는 리터럴 부분 문자열입니다. 정규식은 지원하지 않습니다.

use logwarden_core::metrics as m;
use logwarden_core::pipeline::AlertPolicy;
use logwarden_core::types::{Level, LogEntry};

/// 심각도 임계값 + 리터럴 패턴 정책
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    threshold: Level,
    patterns: Vec<String>,
    pattern_escalation: bool,
}

impl ThresholdPolicy {
    /// 임계값만 사용하는 정책을 생성합니다.
    pub fn new(threshold: Level) -> Self {
        Self {
            threshold,
            patterns: Vec::new(),
            pattern_escalation: false,
        }
    }

    /// 패턴 목록을 지정합니다. 빈 문자열은 무시됩니다.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty())
            .collect();
        self
    }

    /// 패턴 일치 시 임계값 미만 엔트리도 전달할지 지정합니다.
    pub fn with_pattern_escalation(mut self, enabled: bool) -> Self {
        self.pattern_escalation = enabled;
        self
    }

    /// 임계 레벨
    pub fn threshold(&self) -> Level {
        self.threshold
    }

    /// 등록된 패턴
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// 메시지나 원본 라인에 포함된 첫 번째 패턴을 반환합니다.
    pub fn matching_pattern(&self, entry: &LogEntry) -> Option<&str> {
        self.patterns
            .iter()
            .find(|p| entry.message().contains(p.as_str()) || entry.raw_line().contains(p.as_str()))
            .map(String::as_str)
    }
}

impl AlertPolicy for ThresholdPolicy {
    fn name(&self) -> &str {
        "threshold"
    }

    fn should_alert(&self, entry: &LogEntry) -> bool {
        let above = entry.level() >= self.threshold;
        if !above && !self.pattern_escalation {
            return false;
        }

        if let Some(pattern) = self.matching_pattern(entry) {
            metrics::counter!(m::PATTERN_MATCHES_TOTAL).increment(1);
            tracing::debug!(
                pattern,
                level = %entry.level(),
                source = entry.source(),
                "alert pattern matched"
            );
            return true;
        }

        above
    }
}
