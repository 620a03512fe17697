// AccessLens - platform/config.rs
//
// Platform directory resolution and config.toml loading with startup
// validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved platform paths for AccessLens configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/accesslens/).
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to the current directory if platform dirs cannot be
    /// determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }
}

// =============================================================================
// config.toml
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are ignored so a newer config file still loads.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub parsing: ParsingSection,
    pub filtering: FilteringSection,
    pub timestamps: TimestampsSection,
    pub remote: RemoteSection,
    pub logging: LoggingSection,
}

/// `[parsing]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ParsingSection {
    /// Lines per parse slice.
    pub chunk_lines: Option<usize>,
    /// Records kept before truncation.
    pub max_records: Option<usize>,
}

/// `[filtering]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct FilteringSection {
    /// Records per filter slice.
    pub chunk_records: Option<usize>,
    /// Delay before a filter edit takes effect.
    pub debounce_ms: Option<u64>,
}

/// `[timestamps]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct TimestampsSection {
    /// Shift logged times by their UTC offset.
    pub apply_offset: Option<bool>,
}

/// `[remote]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub timeout_secs: Option<u64>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration.
///
/// Invalid values produce warnings and fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub parse_chunk_lines: usize,
    pub max_records: usize,
    pub filter_chunk_records: usize,
    pub filter_debounce: Duration,
    pub apply_offset: bool,
    pub remote_timeout: Duration,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            parse_chunk_lines: constants::DEFAULT_PARSE_CHUNK_LINES,
            max_records: constants::MAX_TOTAL_RECORDS,
            filter_chunk_records: constants::DEFAULT_FILTER_CHUNK_RECORDS,
            filter_debounce: Duration::from_millis(constants::DEFAULT_FILTER_DEBOUNCE_MS),
            apply_offset: false,
            remote_timeout: Duration::from_secs(constants::DEFAULT_REMOTE_TIMEOUT_SECS),
            log_level: None,
            log_file: None,
        }
    }
}

/// Accept `value` if it lies in `min..=max`, else record a warning.
fn in_range<T>(
    field: &str,
    value: Option<T>,
    min: T,
    max: T,
    warnings: &mut Vec<String>,
) -> Option<T>
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    let value = value?;
    if value >= min && value <= max {
        Some(value)
    } else {
        let err = ConfigError::ValueOutOfRange {
            field: field.to_string(),
            value: value.to_string(),
            expected: format!("{min}-{max}"),
        };
        warnings.push(format!("{err}. Using default."));
        None
    }
}

/// Validate a parsed `RawConfig`.
pub fn validate(raw: RawConfig) -> (AppConfig, Vec<String>) {
    let mut warnings = Vec::new();
    let mut config = AppConfig::default();

    if let Some(v) = in_range(
        "parsing.chunk_lines",
        raw.parsing.chunk_lines,
        constants::MIN_PARSE_CHUNK_LINES,
        constants::MAX_PARSE_CHUNK_LINES,
        &mut warnings,
    ) {
        config.parse_chunk_lines = v;
    }

    if let Some(v) = in_range(
        "parsing.max_records",
        raw.parsing.max_records,
        constants::MIN_MAX_RECORDS,
        constants::MAX_TOTAL_RECORDS,
        &mut warnings,
    ) {
        config.max_records = v;
    }

    if let Some(v) = in_range(
        "filtering.chunk_records",
        raw.filtering.chunk_records,
        constants::MIN_FILTER_CHUNK_RECORDS,
        constants::MAX_FILTER_CHUNK_RECORDS,
        &mut warnings,
    ) {
        config.filter_chunk_records = v;
    }

    if let Some(v) = in_range(
        "filtering.debounce_ms",
        raw.filtering.debounce_ms,
        0,
        constants::MAX_FILTER_DEBOUNCE_MS,
        &mut warnings,
    ) {
        config.filter_debounce = Duration::from_millis(v);
    }

    if let Some(apply) = raw.timestamps.apply_offset {
        config.apply_offset = apply;
    }

    if let Some(v) = in_range(
        "remote.timeout_secs",
        raw.remote.timeout_secs,
        1,
        constants::MAX_REMOTE_TIMEOUT_SECS,
        &mut warnings,
    ) {
        config.remote_timeout = Duration::from_secs(v);
    }

    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    if let Some(file) = raw.logging.file.filter(|f| !f.is_empty()) {
        config.log_file = Some(file);
    }

    (config, warnings)
}

/// Load and validate a specific config file.
///
/// Unreadable or unparseable files are errors; out-of-range values are
/// warnings.
pub fn load_config_file(path: &Path) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let raw: RawConfig = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::info!(path = %path.display(), "Loaded config.toml");

    let (config, warnings) = validate(raw);
    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "Config validation produced warnings");
    }
    Ok((config, warnings))
}

/// Load config.toml from `config_dir`.
///
/// A missing file yields defaults with no warnings (first run). A file that
/// cannot be read or parsed yields defaults plus a warning, so startup never
/// fails on configuration.
pub fn load_config(config_dir: &Path) -> (AppConfig, Vec<String>) {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), Vec::new());
    }

    match load_config_file(&config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            let msg = format!("{e}. Using defaults.");
            tracing::warn!("{}", msg);
            (AppConfig::default(), vec![msg])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(dir: &Path, body: &str) {
        let mut f = std::fs::File::create(dir.join(constants::CONFIG_FILE_NAME)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) = load_config(dir.path());
        assert_eq!(config, AppConfig::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_valid_values_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
[parsing]
chunk_lines = 500
max_records = 2000

[filtering]
chunk_records = 5000
debounce_ms = 0

[timestamps]
apply_offset = true

[remote]
timeout_secs = 5

[logging]
level = "DEBUG"
file = "/tmp/accesslens.log"

[future_section]
anything = 1
"#,
        );
        let (config, warnings) = load_config(dir.path());
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(config.parse_chunk_lines, 500);
        assert_eq!(config.max_records, 2000);
        assert_eq!(config.filter_chunk_records, 5000);
        assert_eq!(config.filter_debounce, Duration::ZERO);
        assert!(config.apply_offset);
        assert_eq!(config.remote_timeout, Duration::from_secs(5));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.log_file.as_deref(), Some("/tmp/accesslens.log"));
    }

    #[test]
    fn test_out_of_range_values_warn_and_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            "[parsing]\nchunk_lines = 1\nmax_records = 5000000\n[logging]\nlevel = \"loud\"\n",
        );
        let (config, warnings) = load_config(dir.path());
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("parsing.chunk_lines"));
        assert_eq!(config.parse_chunk_lines, constants::DEFAULT_PARSE_CHUNK_LINES);
        assert_eq!(config.max_records, constants::MAX_TOTAL_RECORDS);
        assert_eq!(config.log_level, None);
    }

    #[test]
    fn test_unparseable_file_warns() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "[parsing\nchunk_lines = ");
        let (config, warnings) = load_config(dir.path());
        assert_eq!(config, AppConfig::default());
        assert_eq!(warnings.len(), 1);

        let err = load_config_file(&dir.path().join(constants::CONFIG_FILE_NAME)).unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse { .. }));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let err = load_config_file(Path::new("/nonexistent/accesslens.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
