#![no_main]

use libfuzzer_sys::fuzz_target;
use logwarden_core::config::LogwardenConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data)
        && let Ok(config) = LogwardenConfig::parse(content)
    {
        let _ = config.validate();
    }
});
