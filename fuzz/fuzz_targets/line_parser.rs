#![no_main]

use libfuzzer_sys::fuzz_target;
use logwarden_pipeline::parser::parse_bytes;

fuzz_target!(|data: &[u8]| {
    if let Some(entry) = parse_bytes("fuzz", data) {
        // 메시지는 항상 원본 라인의 접미사
        assert!(entry.raw_line().ends_with(entry.message()));
    }
});
