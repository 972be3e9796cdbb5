#![no_main]

use libfuzzer_sys::fuzz_target;
use logwarden_core::config::{LogwardenConfig, MAX_ALERT_PATTERNS, MAX_WATCH_DIRECTORIES};

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        let config = LogwardenConfig::parse_key_value(content);
        assert!(config.sources.watch_directories.len() <= MAX_WATCH_DIRECTORIES);
        assert!(config.alerts.patterns.len() <= MAX_ALERT_PATTERNS);
        let _ = config.validate();
    }
});
