// AccessLens - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// All errors preserve the causal chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all AccessLens operations.
/// Errors are categorised by the subsystem that produced them.
#[derive(Debug)]
pub enum AccessLensError {
    /// Log content parsing failed as a whole.
    Parse(ParseError),

    /// Export or import of analysis results failed.
    Export(ExportError),

    /// Configuration loading or validation failed.
    Config(ConfigError),

    /// I/O error with path context.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },
}

impl fmt::Display for AccessLensError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Export(e) => write!(f, "Export error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for AccessLensError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Export(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Problems found while turning raw content into records.
///
/// `LineParse` and `InsufficientData` are soft, per-line errors; the parse
/// continues past them. `NoRecognizableFields` and `EmptyInput` are hard
/// failures that leave the outcome with zero records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No dialect pattern matched the line.
    LineParse { line_number: u64, excerpt: String },

    /// A delimited row decoded to nothing but defaults.
    InsufficientData { line_number: u64, excerpt: String },

    /// The CSV header names neither an IP nor a path column.
    NoRecognizableFields,

    /// The content has no non-blank lines.
    EmptyInput,
}

impl ParseError {
    /// True for failures that reject the whole file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoRecognizableFields | Self::EmptyInput)
    }

    /// Line the error refers to, if it is a per-line error.
    pub fn line_number(&self) -> Option<u64> {
        match self {
            Self::LineParse { line_number, .. } | Self::InsufficientData { line_number, .. } => {
                Some(*line_number)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineParse {
                line_number,
                excerpt,
            } => write!(f, "Line {line_number}: Unable to parse - \"{excerpt}...\""),
            Self::InsufficientData {
                line_number,
                excerpt,
            } => write!(
                f,
                "Line {line_number}: Insufficient data - \"{excerpt}...\""
            ),
            Self::NoRecognizableFields => write!(
                f,
                "CSV does not contain recognizable log fields (ip, path, status, etc.)"
            ),
            Self::EmptyInput => write!(f, "Empty file"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for AccessLensError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

/// Errors related to writing or reading analysis result files.
#[derive(Debug)]
pub enum ExportError {
    /// I/O error writing or reading the export file.
    Io { path: PathBuf, source: io::Error },

    /// CSV serialisation error.
    Csv { path: PathBuf, source: csv::Error },

    /// JSON serialisation or deserialisation error.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Export I/O error '{}': {source}", path.display())
            }
            Self::Csv { path, source } => {
                write!(f, "CSV export error '{}': {source}", path.display())
            }
            Self::Json { path, source } => {
                write!(f, "JSON error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Csv { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

impl From<ExportError> for AccessLensError {
    fn from(e: ExportError) -> Self {
        Self::Export(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// TOML parsing failed.
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A config value is out of the allowed range.
    ValueOutOfRange {
        field: String,
        value: String,
        expected: String,
    },

    /// I/O error reading config file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TomlParse { path, source } => {
                write!(f, "Config parse error '{}': {source}", path.display())
            }
            Self::ValueOutOfRange {
                field,
                value,
                expected,
            } => write!(
                f,
                "Config '{field}' = '{value}' is out of range. Expected: {expected}"
            ),
            Self::Io { path, source } => {
                write!(f, "Config I/O error '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TomlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for AccessLensError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Remote errors
// ---------------------------------------------------------------------------

/// Failures reported by a remote analyzer. Always recovered locally.
#[derive(Debug)]
pub enum RemoteError {
    /// The remote backend could not be reached or refused the job.
    Unavailable { reason: String },

    /// The remote job did not finish within the allotted time.
    Timeout { after: Duration },

    /// The remote backend answered with something other than a result document.
    InvalidResponse { reason: String },
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "remote analyzer unavailable: {reason}"),
            Self::Timeout { after } => {
                write!(f, "remote analysis timed out after {}s", after.as_secs())
            }
            Self::InvalidResponse { reason } => {
                write!(f, "remote analyzer returned an invalid response: {reason}")
            }
        }
    }
}

impl std::error::Error for RemoteError {}

/// Convenience type alias for AccessLens results.
pub type Result<T> = std::result::Result<T, AccessLensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_parse_message_carries_line_and_excerpt() {
        let e = ParseError::LineParse {
            line_number: 7,
            excerpt: "garbage text".to_string(),
        };
        assert_eq!(e.to_string(), "Line 7: Unable to parse - \"garbage text...\"");
        assert_eq!(e.line_number(), Some(7));
        assert!(!e.is_fatal());
    }

    #[test]
    fn test_hard_failures_are_fatal() {
        assert!(ParseError::EmptyInput.is_fatal());
        assert!(ParseError::NoRecognizableFields.is_fatal());
        assert_eq!(ParseError::EmptyInput.line_number(), None);
    }

    #[test]
    fn test_top_level_wraps_source() {
        use std::error::Error;
        let e: AccessLensError = ConfigError::ValueOutOfRange {
            field: "parsing.chunk_lines".to_string(),
            value: "5".to_string(),
            expected: "100..=1000000".to_string(),
        }
        .into();
        assert!(e.to_string().starts_with("Configuration error:"));
        assert!(e.source().is_some());
    }
}
