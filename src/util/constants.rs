// AccessLens - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "AccessLens";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "AccessLens";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Parsing limits
// =============================================================================

/// Number of input lines parsed per slice before control returns to the host.
pub const DEFAULT_PARSE_CHUNK_LINES: usize = 10_000;

/// Minimum user-configurable parse slice size.
pub const MIN_PARSE_CHUNK_LINES: usize = 100;

/// Maximum user-configurable parse slice size.
pub const MAX_PARSE_CHUNK_LINES: usize = 1_000_000;

/// Hard upper bound on the number of records kept from one file.
///
/// Records beyond this are dropped in parse order; the parser still counts
/// them so the true total can be reported alongside the truncation flag.
pub const MAX_TOTAL_RECORDS: usize = 1_000_000;

/// Minimum user-configurable record cap.
pub const MIN_MAX_RECORDS: usize = 1_000;

/// Number of characters of an unparseable line quoted in its error message.
pub const ERROR_EXCERPT_CHARS: usize = 80;

/// Number of parse error messages carried in a `ParseSummary`.
pub const SUMMARY_MAX_ERRORS: usize = 20;

/// Keywords whose presence in a delimited first line marks the file as CSV.
pub const CSV_HEADER_KEYWORDS: &[&str] = &[
    "ip",
    "address",
    "timestamp",
    "date",
    "method",
    "url",
    "path",
    "status",
    "size",
    "bytes",
];

/// Placeholder IP for CSV rows without an IP column.
pub const UNKNOWN_IP: &str = "unknown";

/// Default request method when the request line omits it.
pub const DEFAULT_METHOD: &str = "GET";

/// Default request path when the request line omits it.
pub const DEFAULT_PATH: &str = "/";

/// Default protocol when the request line omits it.
pub const DEFAULT_PROTOCOL: &str = "HTTP/1.1";

// =============================================================================
// Filtering
// =============================================================================

/// Number of records filtered per slice before control returns to the host.
pub const DEFAULT_FILTER_CHUNK_RECORDS: usize = 50_000;

/// Minimum user-configurable filter slice size.
pub const MIN_FILTER_CHUNK_RECORDS: usize = 1_000;

/// Maximum user-configurable filter slice size.
pub const MAX_FILTER_CHUNK_RECORDS: usize = 1_000_000;

/// Debounce delay in milliseconds before a filter re-run starts.
pub const DEFAULT_FILTER_DEBOUNCE_MS: u64 = 300;

/// Maximum user-configurable debounce delay (ms).
pub const MAX_FILTER_DEBOUNCE_MS: u64 = 5_000;

// =============================================================================
// Aggregation
// =============================================================================

/// Number of IPs listed in the unique-IP ranking.
pub const TOP_IPS_LIMIT: usize = 10;

/// Number of paths listed in the top-pages ranking.
pub const TOP_PAGES_LIMIT: usize = 20;

/// Number of paths listed in the bandwidth ranking.
pub const TOP_BANDWIDTH_PATHS_LIMIT: usize = 10;

/// Number of hourly buckets in the traffic histogram.
pub const HOURS_PER_DAY: usize = 24;

// =============================================================================
// Preview
// =============================================================================

/// Largest page size a preview request may ask for.
pub const MAX_PREVIEW_LIMIT: usize = 10_000;

// =============================================================================
// Remote execution
// =============================================================================

/// Default time the remote analyzer is given before falling back locally.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

/// Maximum user-configurable remote timeout.
pub const MAX_REMOTE_TIMEOUT_SECS: u64 = 3_600;

// =============================================================================
// File loading
// =============================================================================

/// File size threshold in bytes above which the file is memory-mapped.
pub const LARGE_FILE_THRESHOLD: u64 = 16 * 1024 * 1024; // 16 MB

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Maximum length of a log line included in debug output.
pub const DEBUG_MAX_LINE_PREVIEW: usize = 200;

// =============================================================================
// Configuration / export
// =============================================================================

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// File name of the full result document written by `export_all`.
pub const RESULTS_JSON_FILE_NAME: &str = "results.json";

/// File name of the filter a remote job ran under, stored beside its result.
pub const FILTER_JSON_FILE_NAME: &str = "filter.json";
