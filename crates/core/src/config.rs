//! 설정 관리 -- `config.txt`(key=value) / `logwarden.toml` 파싱 및 런타임 설정
//!
//! [`LogwardenConfig`]는 모든 단계의 설정을 담는 최상위 구조체입니다.
//! 로딩이 끝난 뒤에는 읽기 전용 스냅샷으로 각 단계에 복사되어 전달되며,
//! 실행 중에는 어떤 단계도 수정하지 않습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGWARDEN_ALERTS_THRESHOLD=error` 형식)
//! 3. 설정 파일 (`.toml`이면 TOML, 그 외에는 key=value 형식)
//! 4. 기본값 (`Default` 구현)
//!
//! # key=value 형식
//! ```text
//! # 주석
//! poll_interval=5
//! watch_directory1=/var/log/app
//! alert_pattern1=disk full
//! ```
//! 인식하지 못한 키나 형식이 잘못된 라인은 무시됩니다.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConfigError, LogwardenError};
use crate::types::Level;

/// key=value 형식에서 허용하는 최대 감시 디렉토리 수
pub const MAX_WATCH_DIRECTORIES: usize = 32;

/// key=value 형식에서 허용하는 최대 알림 패턴 수
pub const MAX_ALERT_PATTERNS: usize = 64;

/// Logwarden 통합 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogwardenConfig {
    /// 일반 설정 (진단 로그)
    #[serde(default)]
    pub general: GeneralConfig,
    /// 수집 소스 설정
    #[serde(default)]
    pub sources: SourcesConfig,
    /// 큐 / 분류기 설정
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// 알림 설정
    #[serde(default)]
    pub alerts: AlertsConfig,
    /// 메트릭 엔드포인트 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LogwardenConfig {
    /// 설정 파일을 로드하고 환경변수 오버라이드와 검증을 적용합니다.
    ///
    /// 파일이 없으면 기본값을 사용합니다. 확장자가 `.toml`이면 TOML로,
    /// 그 외에는 key=value 형식으로 해석합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogwardenError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일을 로드합니다 (환경변수 오버라이드, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LogwardenError> {
        let path = path.as_ref();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(LogwardenError::Io(e)),
        };

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::parse(&content)
        } else {
            Ok(Self::parse_key_value(&content))
        }
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LogwardenError> {
        toml::from_str(toml_str).map_err(|e| {
            LogwardenError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// key=value 형식의 설정을 파싱합니다.
    ///
    /// 실패하지 않습니다. 주석(`#`), 빈 줄, `=`가 없는 줄, 인식하지 못한 키,
    /// 값 파싱에 실패한 줄은 건너뛰고 해당 필드는 기본값을 유지합니다.
    pub fn parse_key_value(content: &str) -> Self {
        let mut config = Self::default();

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!(line = line_no + 1, "ignoring config line without '='");
                continue;
            };

            let (key, value) = (key.trim(), value.trim());
            if !config.apply_key_value(key, value) {
                warn!(line = line_no + 1, key, "ignoring unrecognized config key");
            }
        }

        config
    }

    /// key=value 한 쌍을 적용합니다. 인식한 키이면 `true`를 반환합니다.
    fn apply_key_value(&mut self, key: &str, value: &str) -> bool {
        match key {
            "poll_interval" => set_parsed(&mut self.sources.poll_interval_secs, key, value),
            "network_port" => set_parsed(&mut self.sources.network_port, key, value),
            "network_bind_addr" => self.sources.network_bind_addr = value.to_owned(),
            "enable_network" => self.sources.enable_network = parse_flag(value),
            "queue_max_size" => set_parsed(&mut self.processing.queue_max_size, key, value),
            "num_processing_threads" => {
                set_parsed(&mut self.processing.num_processing_threads, key, value)
            }
            "enable_alerts" => self.alerts.enabled = parse_flag(value),
            "alert_file" => self.alerts.file = value.to_owned(),
            "alert_threshold" => self.alerts.threshold = Level::from_label(value),
            "alert_pattern_escalation" => self.alerts.pattern_escalation = parse_flag(value),
            "log_level" => self.general.log_level = value.to_owned(),
            "log_format" => self.general.log_format = value.to_owned(),
            "metrics_enabled" => self.metrics.enabled = parse_flag(value),
            "metrics_listen_addr" => self.metrics.listen_addr = value.to_owned(),
            "metrics_port" => set_parsed(&mut self.metrics.port, key, value),
            _ if key.starts_with("watch_directory") => {
                push_bounded(
                    &mut self.sources.watch_directories,
                    value,
                    MAX_WATCH_DIRECTORIES,
                    key,
                );
            }
            _ if key.starts_with("alert_pattern") => {
                push_bounded(&mut self.alerts.patterns, value, MAX_ALERT_PATTERNS, key);
            }
            _ => return false,
        }
        true
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGWARDEN_{SECTION}_{FIELD}`
    /// 예: `LOGWARDEN_SOURCES_NETWORK_PORT=9000`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGWARDEN_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGWARDEN_GENERAL_LOG_FORMAT");

        // Sources
        override_csv(
            &mut self.sources.watch_directories,
            "LOGWARDEN_SOURCES_WATCH_DIRECTORIES",
        );
        override_parsed(
            &mut self.sources.poll_interval_secs,
            "LOGWARDEN_SOURCES_POLL_INTERVAL_SECS",
        );
        override_parsed(
            &mut self.sources.enable_network,
            "LOGWARDEN_SOURCES_ENABLE_NETWORK",
        );
        override_parsed(
            &mut self.sources.network_port,
            "LOGWARDEN_SOURCES_NETWORK_PORT",
        );
        override_string(
            &mut self.sources.network_bind_addr,
            "LOGWARDEN_SOURCES_NETWORK_BIND_ADDR",
        );

        // Processing
        override_parsed(
            &mut self.processing.queue_max_size,
            "LOGWARDEN_PROCESSING_QUEUE_MAX_SIZE",
        );
        override_parsed(
            &mut self.processing.num_processing_threads,
            "LOGWARDEN_PROCESSING_NUM_PROCESSING_THREADS",
        );

        // Alerts
        override_parsed(&mut self.alerts.enabled, "LOGWARDEN_ALERTS_ENABLED");
        override_string(&mut self.alerts.file, "LOGWARDEN_ALERTS_FILE");
        if let Ok(val) = std::env::var("LOGWARDEN_ALERTS_THRESHOLD") {
            self.alerts.threshold = Level::from_label(&val);
        }
        override_csv(&mut self.alerts.patterns, "LOGWARDEN_ALERTS_PATTERNS");
        override_parsed(
            &mut self.alerts.pattern_escalation,
            "LOGWARDEN_ALERTS_PATTERN_ESCALATION",
        );

        // Metrics
        override_parsed(&mut self.metrics.enabled, "LOGWARDEN_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGWARDEN_METRICS_LISTEN_ADDR");
        override_parsed(&mut self.metrics.port, "LOGWARDEN_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogwardenError> {
        const MAX_QUEUE_SIZE: usize = 10_000_000;
        const MAX_PROCESSING_THREADS: usize = 256;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.sources.poll_interval_secs == 0 {
            return Err(invalid(
                "sources.poll_interval_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        if self
            .sources
            .watch_directories
            .iter()
            .any(|dir| dir.trim().is_empty())
        {
            return Err(invalid(
                "sources.watch_directories",
                "directory path must not be empty".to_owned(),
            ));
        }

        if self.processing.queue_max_size > MAX_QUEUE_SIZE {
            return Err(invalid(
                "processing.queue_max_size",
                format!("must be 0-{MAX_QUEUE_SIZE} (0 = unbounded)"),
            ));
        }

        let threads = self.processing.num_processing_threads;
        if threads == 0 || threads > MAX_PROCESSING_THREADS {
            return Err(invalid(
                "processing.num_processing_threads",
                format!("must be 1-{MAX_PROCESSING_THREADS}"),
            ));
        }

        if self.alerts.enabled && self.alerts.file.trim().is_empty() {
            return Err(invalid(
                "alerts.file",
                "alert file must not be empty when alerts are enabled".to_owned(),
            ));
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 진단 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 진단 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 수집 소스 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// 감시할 디렉토리 목록 (디렉토리마다 tailer 하나)
    pub watch_directories: Vec<String>,
    /// 디렉토리 폴링 주기 (초)
    pub poll_interval_secs: u64,
    /// 네트워크 수신기 활성화 여부
    pub enable_network: bool,
    /// 네트워크 수신 포트
    pub network_port: u16,
    /// 네트워크 수신 바인드 주소
    pub network_bind_addr: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            watch_directories: Vec::new(),
            poll_interval_secs: 5,
            enable_network: true,
            network_port: 8080,
            network_bind_addr: "0.0.0.0".to_owned(),
        }
    }
}

/// 큐 / 분류기 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// 수집 큐와 알림 큐의 최대 용량 (0 = 무제한)
    pub queue_max_size: usize,
    /// 분류기 워커 수
    pub num_processing_threads: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            queue_max_size: 1000,
            num_processing_threads: 2,
        }
    }
}

/// 알림 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// 알림 싱크 활성화 여부
    pub enabled: bool,
    /// 알림을 추가 기록할 파일
    pub file: String,
    /// 알림 임계 레벨
    pub threshold: Level,
    /// 알림 패턴 (리터럴 부분 문자열)
    pub patterns: Vec<String>,
    /// 패턴 일치 시 임계 레벨 미만이어도 알림으로 전달할지 여부
    pub pattern_escalation: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: "alerts.log".to_owned(),
            threshold: Level::Warning,
            patterns: Vec::new(),
            pattern_escalation: false,
        }
    }
}

/// 메트릭 엔드포인트 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 리스닝 주소
    pub listen_addr: String,
    /// 리스닝 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

fn invalid(field: &str, reason: String) -> LogwardenError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// `true` 또는 `1`만 참으로 취급합니다.
fn parse_flag(value: &str) -> bool {
    value == "true" || value == "1"
}

fn set_parsed<T: std::str::FromStr>(target: &mut T, key: &str, value: &str) {
    match value.parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(key, value, "failed to parse config value, keeping default"),
    }
}

fn push_bounded(target: &mut Vec<String>, value: &str, max: usize, key: &str) {
    if value.is_empty() {
        return;
    }
    if target.len() >= max {
        warn!(key, max, "too many entries for config key, ignoring");
        return;
    }
    target.push(value.to_owned());
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T: std::str::FromStr>(target: &mut T, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn default_config_matches_builtin_defaults() {
        let config = LogwardenConfig::default();
        assert_eq!(config.sources.poll_interval_secs, 5);
        assert_eq!(config.sources.network_port, 8080);
        assert!(config.sources.enable_network);
        assert_eq!(config.processing.queue_max_size, 1000);
        assert_eq!(config.processing.num_processing_threads, 2);
        assert!(config.alerts.enabled);
        assert_eq!(config.alerts.file, "alerts.log");
        assert_eq!(config.alerts.threshold, Level::Warning);
        assert!(config.sources.watch_directories.is_empty());
        assert!(config.alerts.patterns.is_empty());
    }

    #[test]
    fn default_config_passes_validation() {
        LogwardenConfig::default().validate().unwrap();
    }

    #[test]
    fn key_value_full_file() {
        let text = "\
# logwarden config
poll_interval=2
network_port=9000
enable_network=false
queue_max_size=0
num_processing_threads=4
enable_alerts=1
alert_file=/tmp/alerts.log
alert_threshold=error
watch_directory1=/var/log/app
watch_directory2=/var/log/web
alert_pattern1=disk full
alert_pattern2=OOM
";
        let config = LogwardenConfig::parse_key_value(text);
        assert_eq!(config.sources.poll_interval_secs, 2);
        assert_eq!(config.sources.network_port, 9000);
        assert!(!config.sources.enable_network);
        assert_eq!(config.processing.queue_max_size, 0);
        assert_eq!(config.processing.num_processing_threads, 4);
        assert!(config.alerts.enabled);
        assert_eq!(config.alerts.file, "/tmp/alerts.log");
        assert_eq!(config.alerts.threshold, Level::Error);
        assert_eq!(
            config.sources.watch_directories,
            vec!["/var/log/app", "/var/log/web"]
        );
        assert_eq!(config.alerts.patterns, vec!["disk full", "OOM"]);
    }

    #[test]
    fn key_value_ignores_malformed_and_unknown_lines() {
        let text = "\
this line has no equals sign
unknown_key=42
network_port=not-a-number

#poll_interval=99
poll_interval = 7
";
        let config = LogwardenConfig::parse_key_value(text);
        assert_eq!(config.sources.network_port, 8080);
        assert_eq!(config.sources.poll_interval_secs, 7);
    }

    #[test]
    fn key_value_flags_accept_only_true_or_one() {
        for (value, expected) in [("true", true), ("1", true), ("yes", false), ("TRUE", false)] {
            let config = LogwardenConfig::parse_key_value(&format!("enable_network={value}"));
            assert_eq!(config.sources.enable_network, expected, "value {value}");
        }
    }

    #[test]
    fn key_value_caps_repeated_entries() {
        let text: String = (0..MAX_WATCH_DIRECTORIES + 5)
            .map(|i| format!("watch_directory{i}=/tmp/dir{i}\n"))
            .collect();
        let config = LogwardenConfig::parse_key_value(&text);
        assert_eq!(config.sources.watch_directories.len(), MAX_WATCH_DIRECTORIES);
    }

    #[test]
    fn key_value_unknown_threshold_defaults_to_info() {
        let config = LogwardenConfig::parse_key_value("alert_threshold=verbose");
        assert_eq!(config.alerts.threshold, Level::Info);
    }

    #[test]
    fn toml_partial_merges_with_defaults() {
        let toml = r#"
[sources]
watch_directories = ["/var/log/app"]
poll_interval_secs = 1

[alerts]
threshold = "critical"
patterns = ["panic"]
pattern_escalation = true
"#;
        let config = LogwardenConfig::parse(toml).unwrap();
        assert_eq!(config.sources.watch_directories, vec!["/var/log/app"]);
        assert_eq!(config.sources.poll_interval_secs, 1);
        assert_eq!(config.sources.network_port, 8080);
        assert_eq!(config.alerts.threshold, Level::Critical);
        assert!(config.alerts.pattern_escalation);
        assert_eq!(config.processing.queue_max_size, 1000);
    }

    #[test]
    fn toml_invalid_returns_parse_error() {
        let err = LogwardenConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            LogwardenError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_threads() {
        let mut config = LogwardenConfig::default();
        config.processing.num_processing_threads = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("num_processing_threads"));
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = LogwardenConfig::default();
        config.sources.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = LogwardenConfig::default();
        config.general.log_format = "xml".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_allows_empty_alert_file_when_disabled() {
        let mut config = LogwardenConfig::default();
        config.alerts.file.clear();
        assert!(config.validate().is_err());

        config.alerts.enabled = false;
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogwardenConfig::from_file(dir.path().join("absent.txt"))
            .await
            .unwrap();
        assert_eq!(config, LogwardenConfig::default());
    }

    #[tokio::test]
    async fn from_file_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();

        let kv_path = dir.path().join("config.txt");
        std::fs::write(&kv_path, "network_port=7000\n").unwrap();
        let config = LogwardenConfig::from_file(&kv_path).await.unwrap();
        assert_eq!(config.sources.network_port, 7000);

        let toml_path = dir.path().join("logwarden.toml");
        std::fs::write(&toml_path, "[sources]\nnetwork_port = 7001\n").unwrap();
        let config = LogwardenConfig::from_file(&toml_path).await.unwrap();
        assert_eq!(config.sources.network_port, 7001);
    }

    #[test]
    #[serial]
    fn env_overrides_take_precedence() {
        // SAFETY: serial 테스트에서만 환경변수를 변경합니다.
        unsafe {
            std::env::set_var("LOGWARDEN_SOURCES_NETWORK_PORT", "6514");
            std::env::set_var("LOGWARDEN_ALERTS_THRESHOLD", "crit");
            std::env::set_var("LOGWARDEN_ALERTS_PATTERNS", "disk full, OOM");
        }

        let mut config = LogwardenConfig::parse_key_value("network_port=9000");
        config.apply_env_overrides();

        unsafe {
            std::env::remove_var("LOGWARDEN_SOURCES_NETWORK_PORT");
            std::env::remove_var("LOGWARDEN_ALERTS_THRESHOLD");
            std::env::remove_var("LOGWARDEN_ALERTS_PATTERNS");
        }

        assert_eq!(config.sources.network_port, 6514);
        assert_eq!(config.alerts.threshold, Level::Critical);
        assert_eq!(config.alerts.patterns, vec!["disk full", "OOM"]);
    }

    #[test]
    #[serial]
    fn env_override_with_bad_value_is_ignored() {
        unsafe {
            std::env::set_var("LOGWARDEN_PROCESSING_QUEUE_MAX_SIZE", "lots");
        }
        let mut config = LogwardenConfig::default();
        config.apply_env_overrides();
        unsafe {
            std::env::remove_var("LOGWARDEN_PROCESSING_QUEUE_MAX_SIZE");
        }
        assert_eq!(config.processing.queue_max_size, 1000);
    }
}
