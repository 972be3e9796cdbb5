//! 통합 테스트 -- 파이프라인 전체 흐름 검증
//!
//! 디렉토리/TCP 수집부터 알림 파일 기록까지의 전체 파이프라인을 검증합니다.

use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use logwarden_core::pipeline::Pipeline;
use logwarden_core::types::Level;
use logwarden_pipeline::{LogPipeline, LogPipelineBuilder, PipelineConfigBuilder};

const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// 조건이 참이 될 때까지 기다립니다.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {WAIT_LIMIT:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn read_alert_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_owned)
        .collect()
}

fn build(config: PipelineConfigBuilder) -> LogPipeline {
    let config = config.build().expect("valid config");
    LogPipelineBuilder::new().config(config).build().expect("pipeline")
}

/// 파일과 TCP에서 들어온 라인 중 임계값 이상만 알림 파일에 기록
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_and_network_to_alert_file() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    std::fs::create_dir(&logs).unwrap();
    std::fs::write(
        logs.join("app.log"),
        "[INFO] service up\n[ERROR] db connection lost\n[WARNING] slow query\n",
    )
    .unwrap();
    let alert_path = dir.path().join("alerts.log");

    let mut pipeline = build(
        PipelineConfigBuilder::new()
            .watch_directory(logs.display().to_string())
            .poll_interval(Duration::from_millis(50))
            .network("127.0.0.1:0")
            .workers(3)
            .alert_file(alert_path.display().to_string())
            .alert_threshold(Level::Warning)
            .echo_alerts(false),
    );
    pipeline.start().await.unwrap();

    let addr = pipeline.network_addr().expect("bound address");
    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"[DEBUG] heartbeat\n[CRITICAL] kernel panic\n")
        .await
        .unwrap();
    client.shutdown().await.unwrap();
    drop(client);

    wait_until(|| pipeline.alerts_written() == Some(3)).await;

    // 파일에 추가된 라인도 다음 폴링에서 수집
    std::fs::OpenOptions::new()
        .append(true)
        .open(logs.join("app.log"))
        .and_then(|mut f| std::io::Write::write_all(&mut f, b"[ERROR] second failure\n"))
        .unwrap();
    wait_until(|| pipeline.alerts_written() == Some(4)).await;

    pipeline.stop().await.unwrap();

    let lines = read_alert_lines(&alert_path);
    assert_eq!(lines.len(), 4);
    let app_log = logs.join("app.log").display().to_string();
    assert!(lines.iter().any(|l| l.ends_with(&format!("[ERROR] [{app_log}] db connection lost"))));
    assert!(lines.iter().any(|l| l.ends_with(&format!("[WARNING] [{app_log}] slow query"))));
    assert!(lines.iter().any(|l| l.ends_with(&format!("[ERROR] [{app_log}] second failure"))));
    assert!(
        lines
            .iter()
            .any(|l| l.contains("[CRITICAL] [network:127.0.0.1:") && l.ends_with("kernel panic"))
    );
    assert!(!lines.iter().any(|l| l.contains("heartbeat") || l.contains("service up")));
}

/// 패턴 승격이 켜지면 임계값 미만이어도 패턴 일치 엔트리를 알림
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pattern_escalation() {
    let dir = tempfile::tempdir().unwrap();
    let alert_path = dir.path().join("alerts.log");

    let mut pipeline = build(
        PipelineConfigBuilder::new()
            .network("127.0.0.1:0")
            .alert_file(alert_path.display().to_string())
            .alert_threshold(Level::Error)
            .alert_pattern("disk full")
            .pattern_escalation(true)
            .echo_alerts(false),
    );
    pipeline.start().await.unwrap();

    let mut client = TcpStream::connect(pipeline.network_addr().unwrap()).await.unwrap();
    client
        .write_all(b"[DEBUG] disk full on /var\n[INFO] all good\n[ERROR] io failure\n")
        .await
        .unwrap();
    drop(client);

    wait_until(|| pipeline.classifier_stats().processed == 3).await;
    pipeline.stop().await.unwrap();

    let lines = read_alert_lines(&alert_path);
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().any(|l| l.contains("[DEBUG]") && l.ends_with("disk full on /var")));
    assert!(lines.iter().any(|l| l.ends_with("io failure")));
}

/// 같은 설정에서 승격이 꺼져 있으면 패턴은 임계값을 우회하지 않음
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pattern_without_escalation() {
    let dir = tempfile::tempdir().unwrap();
    let alert_path = dir.path().join("alerts.log");

    let mut pipeline = build(
        PipelineConfigBuilder::new()
            .network("127.0.0.1:0")
            .alert_file(alert_path.display().to_string())
            .alert_threshold(Level::Error)
            .alert_pattern("disk full")
            .echo_alerts(false),
    );
    pipeline.start().await.unwrap();

    let mut client = TcpStream::connect(pipeline.network_addr().unwrap()).await.unwrap();
    client
        .write_all(b"[DEBUG] disk full on /var\n[CRITICAL] disk full on /data\n")
        .await
        .unwrap();
    drop(client);

    wait_until(|| pipeline.classifier_stats().processed == 2).await;
    pipeline.stop().await.unwrap();

    let lines = read_alert_lines(&alert_path);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with("disk full on /data"));
}

/// 정지 후 통계가 보존 법칙을 만족: 수집된 모든 라인이 정확히 한 번 분류됨
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_collected_line_is_classified_once() {
    const FILES: usize = 4;
    const LINES_PER_FILE: usize = 250;

    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    std::fs::create_dir(&logs).unwrap();
    for f in 0..FILES {
        let content: String = (0..LINES_PER_FILE)
            .map(|i| {
                let level = if i % 5 == 0 { "ERROR" } else { "INFO" };
                format!("[{level}] file {f} line {i}\n")
            })
            .collect();
        std::fs::write(logs.join(format!("f{f}.log")), content).unwrap();
    }
    let alert_path = dir.path().join("alerts.log");

    // 작은 큐로 생산자 backpressure를 유발
    let mut pipeline = build(
        PipelineConfigBuilder::new()
            .watch_directory(logs.display().to_string())
            .poll_interval(Duration::from_millis(50))
            .without_network()
            .queue_capacity(8)
            .workers(4)
            .alert_file(alert_path.display().to_string())
            .echo_alerts(false),
    );
    pipeline.start().await.unwrap();

    let total = (FILES * LINES_PER_FILE) as u64;
    wait_until(|| pipeline.classifier_stats().processed == total).await;
    pipeline.stop().await.unwrap();

    let stats = pipeline.classifier_stats();
    assert_eq!(stats.processed, total);
    assert_eq!(stats.processed, stats.forwarded + stats.dropped);
    assert_eq!(stats.forwarded, total / 5);
    assert_eq!(pipeline.alerts_written(), Some(stats.forwarded));
    assert_eq!(read_alert_lines(&alert_path).len() as u64, stats.forwarded);
}

/// 알림이 꺼지면 알림 파일을 만들지 않고 모든 엔트리를 버림
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_alerts_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    std::fs::create_dir(&logs).unwrap();
    std::fs::write(logs.join("a.log"), "[CRITICAL] boom\n[ERROR] bang\n").unwrap();

    let mut pipeline = build(
        PipelineConfigBuilder::new()
            .watch_directory(logs.display().to_string())
            .poll_interval(Duration::from_millis(50))
            .without_network()
            .without_alerts(),
    );
    pipeline.start().await.unwrap();
    wait_until(|| pipeline.classifier_stats().processed == 2).await;
    pipeline.stop().await.unwrap();

    let stats = pipeline.classifier_stats();
    assert_eq!(stats.alerted, 2);
    assert_eq!(stats.dropped, 2);
    assert!(pipeline.alerts_written().is_none());
    assert!(!dir.path().join("alerts.log").exists());
}

/// 큐가 가득 찬 상태에서도 정지가 제한 시간 내에 끝남
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_with_saturated_queue() {
    let dir = tempfile::tempdir().unwrap();
    let logs = dir.path().join("logs");
    std::fs::create_dir(&logs).unwrap();
    let content: String = (0..5000).map(|i| format!("[WARNING] w{i}\n")).collect();
    std::fs::write(logs.join("big.log"), content).unwrap();

    let mut pipeline = build(
        PipelineConfigBuilder::new()
            .watch_directory(logs.display().to_string())
            .poll_interval(Duration::from_millis(50))
            .network("127.0.0.1:0")
            .queue_capacity(1)
            .workers(1)
            .alert_file(dir.path().join("alerts.log").display().to_string())
            .echo_alerts(false),
    );
    pipeline.start().await.unwrap();

    // 클라이언트가 연결된 채로 정지
    let _client = TcpStream::connect(pipeline.network_addr().unwrap()).await.unwrap();
    wait_until(|| pipeline.classifier_stats().processed > 0).await;

    tokio::time::timeout(WAIT_LIMIT, pipeline.stop())
        .await
        .expect("stop finished in time")
        .unwrap();

    let stats = pipeline.classifier_stats();
    assert_eq!(stats.processed, stats.forwarded + stats.dropped);
    assert_eq!(pipeline.alerts_written(), Some(stats.forwarded));
    assert_eq!(pipeline.ingest_queue().len(), 0);
}

/// 실행 중 헬스 체크는 정상, 정지 후에는 비정상
#[tokio::test]
async fn test_health_reporting() {
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = build(
        PipelineConfigBuilder::new()
            .watch_directory(dir.path().display().to_string())
            .network("127.0.0.1:0")
            .alert_file(dir.path().join("alerts.log").display().to_string())
            .echo_alerts(false),
    );

    assert!(pipeline.health_check().await.is_unhealthy());
    pipeline.start().await.unwrap();
    assert!(pipeline.health_check().await.is_healthy());
    pipeline.stop().await.unwrap();
    assert!(pipeline.health_check().await.is_unhealthy());
}
