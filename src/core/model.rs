// AccessLens - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no platform
// dependencies.
//
// These types are the shared vocabulary across all layers, and their serde
// shape is the result schema exchanged with rendering, export and remote
// collaborators.

use crate::util::constants;
use crate::util::error::ParseError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Log Record (normalised output of parsing)
// =============================================================================

/// A single parsed request, normalised across the log dialects and CSV.
///
/// Records are never mutated after the parser creates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// 1-based line number in the source content.
    pub line_number: u64,

    /// Client address exactly as logged.
    pub ip: String,

    /// Canonical instant of the request. `None` if the source had no
    /// parseable timestamp.
    pub timestamp: Option<DateTime<Utc>>,

    pub method: String,
    pub path: String,
    pub protocol: String,

    /// HTTP status; 0 when the source value was not a number.
    pub status: u16,

    /// Response size in bytes; 0 when logged as `-`.
    pub size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Trailing response-time field of the extended combined dialect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,

    /// The trimmed source line, verbatim.
    pub raw_line: String,
}

// =============================================================================
// Input format
// =============================================================================

/// Shape of the uploaded content, decided from its first non-blank line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Line-oriented access log (combined, server variant, or common).
    #[default]
    Log,

    /// Delimited table with a header row (comma or tab).
    Csv,
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputFormat::Log => "log",
            InputFormat::Csv => "csv",
        })
    }
}

// =============================================================================
// Parse outcome
// =============================================================================

/// Everything a parse run produced.
///
/// Soft errors sit alongside the records; a hard failure leaves `records`
/// empty with exactly one fatal error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub format: InputFormat,

    /// Kept records in input order (at most the configured maximum).
    pub records: Vec<LogRecord>,

    /// Errors in input order.
    pub errors: Vec<ParseError>,

    /// Physical lines examined, blank lines included.
    pub lines_processed: u64,

    /// True when parseable records exceeded the configured maximum.
    pub truncated: bool,

    /// Number of parseable records before truncation.
    pub original_count: usize,
}

impl ParseOutcome {
    /// Outcome for a whole-file rejection.
    pub fn failed(format: InputFormat, error: ParseError, lines_processed: u64) -> Self {
        Self {
            format,
            records: Vec::new(),
            errors: vec![error],
            lines_processed,
            truncated: false,
            original_count: 0,
        }
    }

    /// True when the file was rejected as a whole.
    pub fn is_failure(&self) -> bool {
        self.errors.iter().any(ParseError::is_fatal)
    }

    /// Upload-style summary of this outcome.
    pub fn summary(&self) -> ParseSummary {
        let valid_rows = self.records.len();
        let error_rows = self.errors.len();
        let message = if self.is_failure() || valid_rows == 0 {
            "No valid log entries found".to_string()
        } else if self.truncated {
            format!(
                "Successfully parsed {valid_rows} entries (truncated from {})",
                self.original_count
            )
        } else {
            format!("Successfully parsed {valid_rows} entries")
        };
        ParseSummary {
            format: self.format,
            total_rows: valid_rows + error_rows,
            valid_rows,
            error_rows,
            truncated: self.truncated,
            original_count: self.original_count,
            errors: self
                .errors
                .iter()
                .take(constants::SUMMARY_MAX_ERRORS)
                .map(ToString::to_string)
                .collect(),
            message,
        }
    }
}

/// Compact description of a parse, suitable for a status line or an API reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseSummary {
    pub format: InputFormat,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub error_rows: usize,
    pub truncated: bool,
    pub original_count: usize,
    /// First few error messages.
    pub errors: Vec<String>,
    pub message: String,
}

// =============================================================================
// Progress
// =============================================================================

/// One progress report from a chunked run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// 0-100, non-decreasing within one run.
    pub percent: u8,
    pub message: String,
}

impl Progress {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Integer percentage of `done` out of `total`, clamped to 0-100.
pub fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) as u128 * 100) / total as u128) as u8
}

// =============================================================================
// Analysis kinds
// =============================================================================

/// The five aggregation jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    UniqueIps,
    TopPages,
    HourlyTraffic,
    StatusCodes,
    Bandwidth,
}

impl AnalysisKind {
    /// All jobs in their canonical order.
    pub fn all() -> &'static [AnalysisKind] {
        &[
            AnalysisKind::UniqueIps,
            AnalysisKind::TopPages,
            AnalysisKind::HourlyTraffic,
            AnalysisKind::StatusCodes,
            AnalysisKind::Bandwidth,
        ]
    }

    /// Wire identifier (`unique-ips`, ...).
    pub fn id(&self) -> &'static str {
        match self {
            AnalysisKind::UniqueIps => "unique-ips",
            AnalysisKind::TopPages => "top-pages",
            AnalysisKind::HourlyTraffic => "hourly-traffic",
            AnalysisKind::StatusCodes => "status-codes",
            AnalysisKind::Bandwidth => "bandwidth",
        }
    }

    /// Key of this job inside `AnalysisResult.analyses`.
    pub fn result_key(&self) -> &'static str {
        match self {
            AnalysisKind::UniqueIps => "uniqueIps",
            AnalysisKind::TopPages => "topPages",
            AnalysisKind::HourlyTraffic => "hourlyTraffic",
            AnalysisKind::StatusCodes => "statusCodes",
            AnalysisKind::Bandwidth => "bandwidth",
        }
    }

    /// File name of the flat export table.
    pub fn table_file_name(&self) -> &'static str {
        match self {
            AnalysisKind::UniqueIps => "unique_ips.csv",
            AnalysisKind::TopPages => "top_pages.csv",
            AnalysisKind::HourlyTraffic => "hourly_traffic.csv",
            AnalysisKind::StatusCodes => "status_codes.csv",
            AnalysisKind::Bandwidth => "bandwidth.csv",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    /// Accepts both the wire id and the result key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisKind::all()
            .iter()
            .copied()
            .find(|k| k.id() == s || k.result_key() == s)
            .ok_or_else(|| {
                format!(
                    "unknown analysis '{s}' (expected one of: unique-ips, top-pages, \
                     hourly-traffic, status-codes, bandwidth)"
                )
            })
    }
}

// =============================================================================
// Analysis result
// =============================================================================

/// Output of one analysis run. Also the document exchanged with the remote
/// analyzer and written to `results.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(alias = "timestamp")]
    pub generated_at: DateTime<Utc>,
    pub total_records: usize,
    pub filtered_records: usize,
    #[serde(default)]
    pub analyses: Analyses,
}

/// Requested analyses; an absent field was not requested.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analyses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_ips: Option<UniqueIps>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_pages: Option<Vec<PageCount>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_traffic: Option<Vec<HourCount>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_codes: Option<Vec<StatusCount>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<Bandwidth>,
}

impl Analyses {
    /// Kinds present in this result, in canonical order.
    pub fn present(&self) -> Vec<AnalysisKind> {
        AnalysisKind::all()
            .iter()
            .copied()
            .filter(|k| match k {
                AnalysisKind::UniqueIps => self.unique_ips.is_some(),
                AnalysisKind::TopPages => self.top_pages.is_some(),
                AnalysisKind::HourlyTraffic => self.hourly_traffic.is_some(),
                AnalysisKind::StatusCodes => self.status_codes.is_some(),
                AnalysisKind::Bandwidth => self.bandwidth.is_some(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueIps {
    /// Number of distinct IPs.
    pub count: usize,
    pub top_ips: Vec<IpCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpCount {
    pub ip: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCount {
    pub path: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourCount {
    pub hour: u8,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: u16,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bandwidth {
    pub total_bytes: u64,
    pub avg_size: f64,
    pub by_path: Vec<PathBytes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathBytes {
    pub path: String,
    pub bytes: u64,
}

// =============================================================================
// Preview page
// =============================================================================

/// One page of records for a tabular preview.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewPage {
    pub data: Vec<LogRecord>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}
