//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`LogwardenConfig`]를
//! 기반으로 파이프라인 조립에 필요한 값을 모아 둔 읽기 전용 스냅샷입니다.
//!
//! # 사용 예시
//! ```ignore
//! use logwarden_core::config::LogwardenConfig;
//! use logwarden_pipeline::config::PipelineConfig;
//!
//! let core_config = LogwardenConfig::load("config.txt").await?;
//! let config = PipelineConfig::from_core(&core_config);
//! ```

use std::time::Duration;

use logwarden_core::config::LogwardenConfig;
use logwarden_core::types::Level;

use crate::collector::DEFAULT_MAX_LINE_LENGTH;
use crate::error::LogPipelineError;

/// 로그 파이프라인 설정
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// 감시 디렉토리 목록 (디렉토리마다 tailer 하나)
    pub watch_directories: Vec<String>,
    /// 디렉토리 폴링 주기
    pub poll_interval: Duration,
    /// 네트워크 수신기 활성화 여부
    pub enable_network: bool,
    /// 네트워크 수신기 바인드 주소 (`host:port`)
    pub network_bind_addr: String,
    /// 수집 큐 / 알림 큐 용량 (0 = 무제한)
    pub queue_capacity: usize,
    /// 분류기 워커 수
    pub workers: usize,
    /// 알림 싱크 활성화 여부
    pub alerts_enabled: bool,
    /// 알림 파일 경로
    pub alert_file: String,
    /// 알림 임계 레벨
    pub alert_threshold: Level,
    /// 알림 패턴 (리터럴)
    pub alert_patterns: Vec<String>,
    /// 패턴 일치 시 임계값 미만도 알림
    pub pattern_escalation: bool,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 네트워크 read 버퍼 크기 (바이트)
    pub read_buffer_size: usize,
    /// 네트워크 수락 대기 제한 시간
    pub accept_timeout: Duration,
    /// 알림을 표준 출력에도 기록할지 여부
    pub echo_alerts: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_core(&LogwardenConfig::default())
    }
}

impl PipelineConfig {
    /// core 설정에서 파이프라인 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &LogwardenConfig) -> Self {
        Self {
            watch_directories: core.sources.watch_directories.clone(),
            poll_interval: Duration::from_secs(core.sources.poll_interval_secs),
            enable_network: core.sources.enable_network,
            network_bind_addr: join_host_port(
                &core.sources.network_bind_addr,
                core.sources.network_port,
            ),
            queue_capacity: core.processing.queue_max_size,
            workers: core.processing.num_processing_threads,
            alerts_enabled: core.alerts.enabled,
            alert_file: core.alerts.file.clone(),
            alert_threshold: core.alerts.threshold,
            alert_patterns: core.alerts.patterns.clone(),
            pattern_escalation: core.alerts.pattern_escalation,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            read_buffer_size: 4096,
            accept_timeout: Duration::from_secs(1),
            echo_alerts: true,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        const MAX_WORKERS: usize = 256;

        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(config_error("workers", format!("must be 1-{MAX_WORKERS}")));
        }

        if self.poll_interval.is_zero() {
            return Err(config_error("poll_interval", "must be greater than 0".to_owned()));
        }

        if self.watch_directories.iter().any(|d| d.trim().is_empty()) {
            return Err(config_error(
                "watch_directories",
                "directory path must not be empty".to_owned(),
            ));
        }

        if self.enable_network && self.network_bind_addr.is_empty() {
            return Err(config_error(
                "network_bind_addr",
                "must not be empty when network is enabled".to_owned(),
            ));
        }

        if self.alerts_enabled && self.alert_file.trim().is_empty() {
            return Err(config_error(
                "alert_file",
                "must not be empty when alerts are enabled".to_owned(),
            ));
        }

        if self.max_line_length == 0 || self.read_buffer_size == 0 {
            return Err(config_error(
                "max_line_length",
                "line and read buffer sizes must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }
}

fn config_error(field: &str, reason: String) -> LogPipelineError {
    LogPipelineError::Config {
        field: field.to_owned(),
        reason,
    }
}

/// IPv6 주소는 대괄호로 감쌉니다.
fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 감시 디렉토리를 추가합니다.
    pub fn watch_directory(mut self, dir: impl Into<String>) -> Self {
        self.config.watch_directories.push(dir.into());
        self
    }

    /// 폴링 주기를 설정합니다.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// 네트워크 수신기를 켜고 바인드 주소를 설정합니다.
    pub fn network(mut self, bind_addr: impl Into<String>) -> Self {
        self.config.enable_network = true;
        self.config.network_bind_addr = bind_addr.into();
        self
    }

    /// 네트워크 수신기를 끕니다.
    pub fn without_network(mut self) -> Self {
        self.config.enable_network = false;
        self
    }

    /// 큐 용량을 설정합니다.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// 분류기 워커 수를 설정합니다.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// 알림 싱크를 켜고 파일 경로를 설정합니다.
    pub fn alert_file(mut self, path: impl Into<String>) -> Self {
        self.config.alerts_enabled = true;
        self.config.alert_file = path.into();
        self
    }

    /// 알림 싱크를 끕니다.
    pub fn without_alerts(mut self) -> Self {
        self.config.alerts_enabled = false;
        self
    }

    /// 알림 임계 레벨을 설정합니다.
    pub fn alert_threshold(mut self, level: Level) -> Self {
        self.config.alert_threshold = level;
        self
    }

    /// 알림 패턴을 추가합니다.
    pub fn alert_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.alert_patterns.push(pattern.into());
        self
    }

    /// 패턴 승격을 설정합니다.
    pub fn pattern_escalation(mut self, enabled: bool) -> Self {
        self.config.pattern_escalation = enabled;
        self
    }

    /// 알림의 표준 출력 기록 여부를 설정합니다.
    pub fn echo_alerts(mut self, enabled: bool) -> Self {
        self.config.echo_alerts = enabled;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.network_bind_addr, "0.0.0.0:8080");
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.workers, 2);
        assert_eq!(config.alert_threshold, Level::Warning);
    }

    #[test]
    fn from_core_preserves_values() {
        let mut core = LogwardenConfig::default();
        core.sources.watch_directories = vec!["/var/log/app".to_owned()];
        core.sources.poll_interval_secs = 3;
        core.sources.network_bind_addr = "127.0.0.1".to_owned();
        core.sources.network_port = 5140;
        core.processing.num_processing_threads = 8;
        core.alerts.patterns = vec!["OOM".to_owned()];
        core.alerts.pattern_escalation = true;

        let config = PipelineConfig::from_core(&core);
        assert_eq!(config.watch_directories, vec!["/var/log/app"]);
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.network_bind_addr, "127.0.0.1:5140");
        assert_eq!(config.workers, 8);
        assert_eq!(config.alert_patterns, vec!["OOM"]);
        assert!(config.pattern_escalation);
        // 확장 필드는 기본값
        assert_eq!(config.read_buffer_size, 4096);
        assert_eq!(config.accept_timeout, Duration::from_secs(1));
    }

    #[test]
    fn ipv6_bind_address_is_bracketed() {
        assert_eq!(join_host_port("::", 8080), "[::]:8080");
        assert_eq!(join_host_port("[::1]", 8080), "[::1]:8080");
        assert_eq!(join_host_port("localhost", 80), "localhost:80");
    }

    #[test]
    fn validate_rejects_zero_workers() {
        let config = PipelineConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_alert_file_when_enabled() {
        let result = PipelineConfigBuilder::new().alert_file("").build();
        assert!(result.is_err());

        let config = PipelineConfigBuilder::new()
            .alert_file("")
            .without_alerts()
            .build()
            .unwrap();
        assert!(!config.alerts_enabled);
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = PipelineConfigBuilder::new()
            .watch_directory("/tmp/logs")
            .poll_interval(Duration::from_millis(100))
            .network("127.0.0.1:0")
            .queue_capacity(16)
            .workers(3)
            .alert_threshold(Level::Error)
            .alert_pattern("panic")
            .build()
            .unwrap();
        assert_eq!(config.watch_directories, vec!["/tmp/logs"]);
        assert_eq!(config.network_bind_addr, "127.0.0.1:0");
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.workers, 3);
        assert_eq!(config.alert_patterns, vec!["panic"]);
    }
}
