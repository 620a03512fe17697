// AccessLens - core/detect.rs
//
// Input format detection from the first non-blank line.
// Core layer: pure logic.
//
// Rules, evaluated in order, first hit wins:
//   1. Access-log shape (three tokens then a bracketed timestamp) => Log,
//      even when the line also contains commas.
//   2. Delimiter present, a header keyword present, and no bracketed
//      day/month/year => Csv.
//   3. Anything else => Log.

use crate::core::model::InputFormat;
use crate::util::constants;
use regex::Regex;
use std::sync::OnceLock;

fn log_shape_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\S+\s+\S+\s+\S+\s+\[[^\]]+\]").expect("log shape regex"))
}

fn bracketed_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\d{1,2}/[A-Za-z]{3}/\d{4}").expect("bracketed date regex")
    })
}

/// A single detection rule.
struct Rule {
    name: &'static str,
    applies: fn(&str) -> bool,
    format: InputFormat,
}

const RULES: &[Rule] = &[
    Rule {
        name: "access-log-shape",
        applies: looks_like_log_line,
        format: InputFormat::Log,
    },
    Rule {
        name: "delimited-header",
        applies: looks_like_csv_header,
        format: InputFormat::Csv,
    },
];

fn looks_like_log_line(line: &str) -> bool {
    log_shape_re().is_match(line)
}

fn looks_like_csv_header(line: &str) -> bool {
    if !(line.contains(',') || line.contains('\t')) {
        return false;
    }
    let lower = line.to_lowercase();
    constants::CSV_HEADER_KEYWORDS
        .iter()
        .any(|k| lower.contains(k))
        && !bracketed_date_re().is_match(line)
}

/// Classify a file from its first non-blank line.
pub fn detect_line(first_line: &str) -> InputFormat {
    let line = first_line.trim();
    let hit = RULES.iter().find(|rule| (rule.applies)(line));
    match hit {
        Some(rule) => {
            tracing::debug!(rule = rule.name, format = %rule.format, "Format detected");
            rule.format
        }
        None => {
            tracing::debug!(
                line = crate::util::logging::preview(line),
                "No detection rule matched; defaulting to log format"
            );
            InputFormat::Log
        }
    }
}

/// First non-blank line of `content`, trimmed, with its 1-based line number.
pub fn first_content_line(content: &str) -> Option<(u64, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx as u64 + 1, line.trim()))
        .find(|(_, line)| !line.is_empty())
}

/// Classify whole content. Empty content is reported as log format; callers
/// check for emptiness separately.
pub fn detect_format(content: &str) -> InputFormat {
    first_content_line(content).map_or(InputFormat::Log, |(_, line)| detect_line(line))
}
