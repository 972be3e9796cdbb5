#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use logwarden_core::pipeline::AlertPolicy;
use logwarden_core::types::Level;
use logwarden_pipeline::parser::parse_line;
use logwarden_pipeline::rule::ThresholdPolicy;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 임계 레벨 인덱스 (Level::ALL 기준)
    threshold: u8,
    /// 패턴 목록 (최대 8개 사용)
    patterns: Vec<String>,
    pattern_escalation: bool,
    /// 판정 대상 라인
    line: String,
}

fuzz_target!(|input: FuzzInput| {
    let threshold = Level::ALL[usize::from(input.threshold) % Level::ALL.len()];
    let patterns: Vec<String> = input.patterns.into_iter().take(8).collect();
    let policy = ThresholdPolicy::new(threshold)
        .with_patterns(patterns)
        .with_pattern_escalation(input.pattern_escalation);

    let entry = parse_line("fuzz", &input.line);
    let alerted = policy.should_alert(&entry);

    if entry.level() >= threshold {
        assert!(alerted);
    } else if !input.pattern_escalation {
        assert!(!alerted);
    } else {
        assert_eq!(alerted, policy.matching_pattern(&entry).is_some());
    }
});
