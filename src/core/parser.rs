// AccessLens - core/parser.rs
//
// Line-level parsing of access-log dialects into `LogRecord`s.
// Core layer: operates on borrowed text, never touches the filesystem.
//
// Dialects are tried in strict priority order and the first match wins:
//   1. Combined with extras: full line, optional referrer + user agent and a
//      trailing numeric response time.
//   2. Server variant: literal "- -" identity fields; trailing content after
//      the optional referrer/user agent is tolerated.
//   3. Common: the bare request core, anything after the size is ignored.
//
// A line no dialect accepts becomes a soft `ParseError::LineParse`; it never
// stops the run.

use crate::core::csv_map::CsvLayout;
use crate::core::model::LogRecord;
use crate::core::timestamp::{self, OffsetPolicy};
use crate::util::constants;
use crate::util::error::ParseError;
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Configuration for parsing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseConfig {
    /// Lines processed per slice by the chunked parser.
    pub chunk_lines: usize,
    /// Records kept before truncation starts.
    pub max_records: usize,
    /// Treatment of explicit UTC offsets in timestamps.
    pub offset_policy: OffsetPolicy,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            chunk_lines: constants::DEFAULT_PARSE_CHUNK_LINES,
            max_records: constants::MAX_TOTAL_RECORDS,
            offset_policy: OffsetPolicy::default(),
        }
    }
}

/// Which dialect accepted a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    CombinedExtended,
    ServerVariant,
    Common,
}

struct DialectPattern {
    dialect: Dialect,
    re: Regex,
}

fn dialects() -> &'static [DialectPattern] {
    static PATTERNS: OnceLock<Vec<DialectPattern>> = OnceLock::new();

    PATTERNS.get_or_init(|| {
        fn re(pat: &str) -> Regex {
            Regex::new(pat).expect("access log dialect regex")
        }

        // Shared request core:
        //   ip  ident  user  [timestamp]  "method path protocol"  status  size
        const CORE_TAIL: &str =
            r#"\[([^\]]+)\]\s+"(\S*)\s*(\S*)\s*(\S*)"\s+(\d+)\s+(\S+)"#;
        const EXTRAS: &str = r#"(?:\s+"([^"]*)"\s+"([^"]*)")?(?:\s+(\d+))?"#;

        vec![
            DialectPattern {
                dialect: Dialect::CombinedExtended,
                re: re(&format!(r"^(\S+)\s+\S+\s+\S+\s+{CORE_TAIL}{EXTRAS}\s*$")),
            },
            DialectPattern {
                dialect: Dialect::ServerVariant,
                re: re(&format!(r"^(\S+)\s+-\s+-\s+{CORE_TAIL}{EXTRAS}")),
            },
            DialectPattern {
                dialect: Dialect::Common,
                re: re(&format!(r"^(\S+)\s+\S+\s+\S+\s+{CORE_TAIL}")),
            },
        ]
    })
}

/// Excerpt of a line for error messages: the first `ERROR_EXCERPT_CHARS`
/// characters.
pub fn excerpt(line: &str) -> String {
    line.chars().take(constants::ERROR_EXCERPT_CHARS).collect()
}

/// Parse one trimmed, non-empty access-log line.
pub fn parse_line(
    line: &str,
    line_number: u64,
    policy: OffsetPolicy,
) -> Result<LogRecord, ParseError> {
    parse_line_with_dialect(line, line_number, policy).map(|(record, _)| record)
}

/// Like `parse_line`, also reporting which dialect matched.
pub fn parse_line_with_dialect(
    line: &str,
    line_number: u64,
    policy: OffsetPolicy,
) -> Result<(LogRecord, Dialect), ParseError> {
    for pattern in dialects() {
        if let Some(caps) = pattern.re.captures(line) {
            return Ok((build_record(&caps, line, line_number, policy), pattern.dialect));
        }
    }
    Err(ParseError::LineParse {
        line_number,
        excerpt: excerpt(line),
    })
}

fn text<'t>(caps: &Captures<'t>, idx: usize) -> &'t str {
    caps.get(idx).map_or("", |m| m.as_str())
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Size field: `-` or anything non-numeric counts as zero bytes.
pub(crate) fn parse_size(raw: &str) -> u64 {
    if raw == "-" {
        return 0;
    }
    raw.parse().unwrap_or(0)
}

pub(crate) fn parse_status(raw: &str) -> u16 {
    raw.parse().unwrap_or(0)
}

fn build_record(caps: &Captures<'_>, line: &str, line_number: u64, policy: OffsetPolicy) -> LogRecord {
    LogRecord {
        line_number,
        ip: text(caps, 1).to_string(),
        timestamp: timestamp::normalize(text(caps, 2), policy),
        method: or_default(text(caps, 3), constants::DEFAULT_METHOD),
        path: or_default(text(caps, 4), constants::DEFAULT_PATH),
        protocol: or_default(text(caps, 5), constants::DEFAULT_PROTOCOL),
        status: parse_status(text(caps, 6)),
        size: parse_size(text(caps, 7)),
        referrer: caps.get(8).map(|m| m.as_str().to_string()),
        user_agent: caps.get(9).map(|m| m.as_str().to_string()),
        response_time: caps.get(10).and_then(|m| m.as_str().parse().ok()),
        raw_line: line.to_string(),
    }
}

// =============================================================================
// Per-file decoder
// =============================================================================

/// Decoder chosen for a file once its format is known.
#[derive(Debug, Clone)]
pub enum LineDecoder {
    /// Access-log dialects.
    Log,
    /// Delimited rows laid out by a header.
    Csv(CsvLayout),
}

impl LineDecoder {
    /// Decode one trimmed, non-empty line.
    pub fn decode(
        &self,
        line: &str,
        line_number: u64,
        policy: OffsetPolicy,
    ) -> Result<LogRecord, ParseError> {
        match self {
            LineDecoder::Log => parse_line(line, line_number, policy),
            LineDecoder::Csv(layout) => layout.decode_row(line, line_number, policy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const COMMON: &str =
        r#"192.168.1.1 - - [25/Dec/2023:10:15:30 +0000] "GET /index.html HTTP/1.1" 200 1234"#;

    fn parse(line: &str) -> Result<(LogRecord, Dialect), ParseError> {
        parse_line_with_dialect(line, 1, OffsetPolicy::Ignore)
    }

    #[test]
    fn test_parse_common_line_fields() {
        let (rec, _) = parse(COMMON).unwrap();
        assert_eq!(rec.ip, "192.168.1.1");
        assert_eq!(rec.method, "GET");
        assert_eq!(rec.path, "/index.html");
        assert_eq!(rec.protocol, "HTTP/1.1");
        assert_eq!(rec.status, 200);
        assert_eq!(rec.size, 1234);
        assert_eq!(rec.raw_line, COMMON);
        assert_eq!(rec.timestamp.unwrap().hour(), 10);
        assert_eq!(rec.referrer, None);
    }

    #[test]
    fn test_combined_with_extras() {
        let line = r#"10.0.0.5 - alice [01/Jan/2024:23:59:59 +0100] "POST /api/login HTTP/2.0" 302 512 "https://example.com/" "Mozilla/5.0 (X11; Linux x86_64)" 87"#;
        let (rec, dialect) = parse(line).unwrap();
        assert_eq!(dialect, Dialect::CombinedExtended);
        assert_eq!(rec.method, "POST");
        assert_eq!(rec.status, 302);
        assert_eq!(rec.referrer.as_deref(), Some("https://example.com/"));
        assert_eq!(rec.user_agent.as_deref(), Some("Mozilla/5.0 (X11; Linux x86_64)"));
        assert_eq!(rec.response_time, Some(87));
        assert_eq!(rec.raw_line, line);
    }

    #[test]
    fn test_server_variant_tolerates_trailing_fields() {
        let line = r#"172.16.0.9 - - [12/Mar/2024:08:00:00 +0000] "GET /health HTTP/1.1" 200 2 "-" "curl/8.0" "203.0.113.7""#;
        let (rec, dialect) = parse(line).unwrap();
        assert_eq!(dialect, Dialect::ServerVariant);
        assert_eq!(rec.path, "/health");
        assert_eq!(rec.user_agent.as_deref(), Some("curl/8.0"));
        assert_eq!(rec.raw_line, line);
    }

    #[test]
    fn test_common_dialect_ignores_trailing_garbage() {
        let line = r#"10.1.1.1 ident bob [12/Mar/2024:08:00:00 +0000] "GET /x HTTP/1.0" 404 0 trailing junk"#;
        let (rec, dialect) = parse(line).unwrap();
        assert_eq!(dialect, Dialect::Common);
        assert_eq!(rec.status, 404);
        assert_eq!(rec.raw_line, line);
    }

    #[test]
    fn test_dash_size_is_zero() {
        let line = r#"1.2.3.4 - - [25/Dec/2023:10:15:30 +0000] "GET / HTTP/1.1" 304 -"#;
        let (rec, _) = parse(line).unwrap();
        assert_eq!(rec.size, 0);
        assert_eq!(rec.status, 304);
    }

    #[test]
    fn test_empty_request_line_uses_defaults() {
        let line = r#"1.2.3.4 - - [25/Dec/2023:10:15:30 +0000] "" 400 0"#;
        let (rec, _) = parse(line).unwrap();
        assert_eq!(rec.method, "GET");
        assert_eq!(rec.path, "/");
        assert_eq!(rec.protocol, "HTTP/1.1");
    }

    #[test]
    fn test_method_and_path_without_protocol() {
        let line = r#"1.2.3.4 - - [25/Dec/2023:10:15:30 +0000] "GET /legacy" 200 10"#;
        let (rec, _) = parse(line).unwrap();
        assert_eq!(rec.path, "/legacy");
        assert_eq!(rec.protocol, "HTTP/1.1");
    }

    #[test]
    fn test_unparseable_timestamp_keeps_record() {
        let line = r#"1.2.3.4 - - [sometime] "GET / HTTP/1.1" 200 10"#;
        let (rec, _) = parse(line).unwrap();
        assert_eq!(rec.timestamp, None);
    }

    #[test]
    fn test_overflowing_status_defaults_to_zero() {
        let line = r#"1.2.3.4 - - [25/Dec/2023:10:15:30 +0000] "GET / HTTP/1.1" 9999999 10"#;
        let (rec, _) = parse(line).unwrap();
        assert_eq!(rec.status, 0);
    }

    #[test]
    fn test_garbage_line_is_error_with_line_number() {
        let err = parse_line("garbage text", 42, OffsetPolicy::Ignore).unwrap_err();
        assert_eq!(
            err,
            ParseError::LineParse {
                line_number: 42,
                excerpt: "garbage text".to_string()
            }
        );
    }

    #[test]
    fn test_excerpt_is_bounded() {
        let long = "x".repeat(500);
        let err = parse_line(&long, 1, OffsetPolicy::Ignore).unwrap_err();
        match err {
            ParseError::LineParse { excerpt, .. } => {
                assert_eq!(excerpt.chars().count(), constants::ERROR_EXCERPT_CHARS)
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
