//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 단계는 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않은 경우 호출은 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `logwarden_`
//! - 접미어: `_total` (counter), 없음 (gauge)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 수집 소스 레이블 키 (file, network)
pub const LABEL_SOURCE: &str = "source";

/// 큐 이름 레이블 키 (ingest, alert)
pub const LABEL_QUEUE: &str = "queue";

/// 심각도 레이블 키 (DEBUG ... CRITICAL)
pub const LABEL_LEVEL: &str = "level";

// ─── 수집 메트릭 ────────────────────────────────────────────────────

/// 수집된 전체 로그 라인 수 (counter, label: source)
pub const LINES_COLLECTED_TOTAL: &str = "logwarden_lines_collected_total";

/// 수락한 네트워크 연결 수 (counter)
pub const NETWORK_CONNECTIONS_TOTAL: &str = "logwarden_network_connections_total";

/// 추적 중인 파일 수 (gauge)
pub const TRACKED_FILES: &str = "logwarden_tracked_files";

// ─── 큐 메트릭 ─────────────────────────────────────────────────────

/// 큐에 대기 중인 엔트리 수 (gauge, label: queue)
pub const QUEUE_DEPTH: &str = "logwarden_queue_depth";

/// 큐가 닫혀 전달하지 못한 엔트리 수 (counter, label: queue)
pub const QUEUE_REJECTED_TOTAL: &str = "logwarden_queue_rejected_total";

// ─── 분류 / 알림 메트릭 ─────────────────────────────────────────────

/// 분류기가 처리한 엔트리 수 (counter)
pub const ENTRIES_CLASSIFIED_TOTAL: &str = "logwarden_entries_classified_total";

/// 알림 패턴과 일치한 엔트리 수 (counter)
pub const PATTERN_MATCHES_TOTAL: &str = "logwarden_pattern_matches_total";

/// 알림 큐로 전달된 엔트리 수 (counter, label: level)
pub const ALERTS_FORWARDED_TOTAL: &str = "logwarden_alerts_forwarded_total";

/// 알림 파일에 기록된 알림 수 (counter)
pub const ALERTS_WRITTEN_TOTAL: &str = "logwarden_alerts_written_total";

/// 알림 기록 실패 수 (counter)
pub const ALERT_WRITE_ERRORS_TOTAL: &str = "logwarden_alert_write_errors_total";

/// 표준 출력 알림 기록 실패 수 (counter)
pub const ALERT_ECHO_ERRORS_TOTAL: &str = "logwarden_alert_echo_errors_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "logwarden_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "logwarden_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `logwarden-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        LINES_COLLECTED_TOTAL,
        "Total number of log lines collected from watched directories and the network listener"
    );
    describe_counter!(
        NETWORK_CONNECTIONS_TOTAL,
        "Total number of TCP connections accepted by the network ingester"
    );
    describe_gauge!(TRACKED_FILES, "Number of files currently tracked by tailers");

    describe_gauge!(QUEUE_DEPTH, "Current number of entries waiting in a queue");
    describe_counter!(
        QUEUE_REJECTED_TOTAL,
        "Total number of entries rejected because the queue was closed"
    );

    describe_counter!(
        ENTRIES_CLASSIFIED_TOTAL,
        "Total number of entries evaluated by classifier workers"
    );
    describe_counter!(
        PATTERN_MATCHES_TOTAL,
        "Total number of entries containing a configured alert pattern"
    );
    describe_counter!(
        ALERTS_FORWARDED_TOTAL,
        "Total number of entries forwarded to the alert queue"
    );
    describe_counter!(
        ALERTS_WRITTEN_TOTAL,
        "Total number of alerts written to the alert file"
    );
    describe_counter!(
        ALERT_WRITE_ERRORS_TOTAL,
        "Total number of alert lines that failed to be written"
    );
    describe_counter!(
        ALERT_ECHO_ERRORS_TOTAL,
        "Total number of alert lines that failed to be echoed to stdout"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1)");
}
