//! 라인 파서 -- `[LEVEL] message` 형식의 로그 라인을 [`LogEntry`]로 변환합니다.
//!
//! 파일 tailer와 네트워크 수신기가 같은 규칙을 사용합니다. 빈 라인은 파일에서는
//! 빈 INFO 엔트리가 되고, 네트워크에서는 버려집니다.
//!
//! ```text
//! [ERROR] connection refused    -> ERROR, "connection refused"
//! [warning]   disk at 91%       -> WARNING, "disk at 91%"
//! no prefix here                -> INFO, "no prefix here"
//! [unterminated label           -> INFO, "[unterminated label"
//! ```
//!
//! 파싱은 실패하지 않습니다. 인식할 수 없는 입력은 INFO로 기본 처리됩니다.

use logwarden_core::types::{Level, LogEntry};

/// 라인 끝의 `\n`과 `\r`을 제거합니다.
pub fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// 라인에서 레벨과 메시지 본문을 분리합니다.
///
/// 라인이 `[`로 시작하고 `]`가 있으면 첫 번째 대괄호 안을 레이블로,
/// 나머지(앞쪽 공백 제거)를 메시지로 사용합니다.
pub fn split_level(line: &str) -> (Level, &str) {
    if let Some(rest) = line.strip_prefix('[')
        && let Some((label, message)) = rest.split_once(']')
    {
        return (Level::from_label(label), message.trim_start_matches(' '));
    }
    (Level::Info, line)
}

/// 원시 라인 하나를 [`LogEntry`]로 변환합니다.
///
/// `raw`의 라인 종결 문자는 제거되고, 나머지는 `raw_line`에 그대로 보존됩니다.
pub fn parse_line(source: &str, raw: &str) -> LogEntry {
    let raw = strip_terminator(raw);
    let (level, message) = split_level(raw);
    LogEntry::new(source, message, level, raw)
}

/// 바이트 라인을 파싱합니다. UTF-8이 아닌 바이트는 대체 문자로 바뀝니다.
///
/// 빈 라인도 빈 메시지의 INFO 엔트리가 됩니다 (파일 tailer 경로).
pub fn parse_lossy(source: &str, raw: &[u8]) -> LogEntry {
    parse_line(source, &String::from_utf8_lossy(raw))
}

/// [`parse_lossy`]와 같지만 종결 문자 제거 후 비어 있으면 `None`입니다.
///
/// 네트워크 수신기는 빈 라인을 엔트리로 만들지 않습니다.
pub fn parse_bytes(source: &str, raw: &[u8]) -> Option<LogEntry> {
    let text = String::from_utf8_lossy(raw);
    let line = strip_terminator(&text);
    if line.is_empty() {
        return None;
    }
    Some(parse_line(source, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_level_prefix() {
        let entry = parse_line("app.log", "[ERROR] connection refused");
        assert_eq!(entry.level(), Level::Error);
        assert_eq!(entry.message(), "connection refused");
        assert_eq!(entry.raw_line(), "[ERROR] connection refused");
        assert_eq!(entry.source(), "app.log");
    }

    #[test]
    fn trims_only_leading_spaces() {
        let entry = parse_line("s", "[warn]    disk at 91%  ");
        assert_eq!(entry.level(), Level::Warning);
        assert_eq!(entry.message(), "disk at 91%  ");
    }

    #[test]
    fn line_without_prefix_is_info() {
        let entry = parse_line("s", "plain text line");
        assert_eq!(entry.level(), Level::Info);
        assert_eq!(entry.message(), "plain text line");
    }

    #[test]
    fn unterminated_label_is_info_with_whole_line() {
        let entry = parse_line("s", "[ERROR connection refused");
        assert_eq!(entry.level(), Level::Info);
        assert_eq!(entry.message(), "[ERROR connection refused");
    }

    #[test]
    fn unknown_label_is_info_and_prefix_is_removed() {
        let entry = parse_line("s", "[2024-01-15] service started");
        assert_eq!(entry.level(), Level::Info);
        assert_eq!(entry.message(), "service started");
        assert_eq!(entry.raw_line(), "[2024-01-15] service started");
    }

    #[test]
    fn prefix_not_at_start_is_ignored() {
        let entry = parse_line("s", " [ERROR] leading space");
        assert_eq!(entry.level(), Level::Info);
        assert_eq!(entry.message(), " [ERROR] leading space");
    }

    #[test]
    fn strips_crlf() {
        let entry = parse_line("s", "[CRIT] boom\r\n");
        assert_eq!(entry.level(), Level::Critical);
        assert_eq!(entry.message(), "boom");
        assert_eq!(entry.raw_line(), "[CRIT] boom");
    }

    #[test]
    fn empty_label_and_message() {
        let entry = parse_line("s", "[]");
        assert_eq!(entry.level(), Level::Info);
        assert_eq!(entry.message(), "");
    }

    #[test]
    fn parse_bytes_skips_blank_lines() {
        assert!(parse_bytes("s", b"\n").is_none());
        assert!(parse_bytes("s", b"\r\n").is_none());
        assert!(parse_bytes("s", b"").is_none());
        assert!(parse_bytes("s", b"x\n").is_some());
    }

    #[test]
    fn parse_lossy_keeps_blank_lines() {
        for raw in [&b"\n"[..], b"\r\n", b""] {
            let entry = parse_lossy("s", raw);
            assert_eq!(entry.level(), Level::Info);
            assert_eq!(entry.message(), "");
            assert_eq!(entry.raw_line(), "");
        }
    }

    #[test]
    fn parse_bytes_replaces_invalid_utf8() {
        let entry = parse_bytes("s", b"[DEBUG] bad \xff byte\n").unwrap();
        assert_eq!(entry.level(), Level::Debug);
        assert!(entry.message().starts_with("bad "));
        assert!(entry.message().ends_with(" byte"));
    }

    proptest! {
        #[test]
        fn parse_never_panics(line in "\\PC*") {
            let _ = parse_line("prop", &line);
        }

        #[test]
        fn raw_line_is_preserved(line in "[^\r\n]*") {
            let entry = parse_line("prop", &line);
            prop_assert_eq!(entry.raw_line(), line.as_str());
        }

        #[test]
        fn message_is_suffix_of_raw(line in "[^\r\n]*") {
            let entry = parse_line("prop", &line);
            prop_assert!(entry.raw_line().ends_with(entry.message()));
        }
    }
}
