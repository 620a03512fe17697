// AccessLens - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and logging initialisation (debug mode support)
// 3. Driving an analysis session over one file (or importing a result)
// 4. Printing the result document and exporting tables

use accesslens::app::remote::{AnalysisSource, ResultDirRemote};
use accesslens::app::session::{AnalysisSession, SessionConfig, SessionEvent};
use accesslens::core::filter::{DateRange, FilterSpec, SizeRange};
use accesslens::core::model::{AnalysisKind, AnalysisResult};
use accesslens::core::timestamp::{self, OffsetPolicy};
use accesslens::platform::{self, config::AppConfig};
use accesslens::util::error::{AccessLensError, ExportError};
use accesslens::util::{self, constants};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// AccessLens - web-server access log analyser.
///
/// Parses a combined/common access log or a CSV/TSV export, applies the given
/// filters, and prints the requested traffic analyses as JSON.
#[derive(Parser, Debug)]
#[command(name = "accesslens", version, about)]
struct Cli {
    /// Log or CSV file to analyse.
    #[arg(required_unless_present = "import")]
    file: Option<PathBuf>,

    /// Analyses to run (default: all). Repeat or comma-separate.
    #[arg(short = 'a', long = "analysis", value_delimiter = ',')]
    analyses: Vec<AnalysisKind>,

    /// Keep records whose client IP contains this text.
    #[arg(long)]
    ip: Option<String>,

    /// Keep records whose path contains this text.
    #[arg(long)]
    path: Option<String>,

    /// Keep these status codes; 400 selects every 4xx.
    #[arg(long = "status", value_delimiter = ',')]
    statuses: Vec<u16>,

    /// Keep these HTTP methods.
    #[arg(long = "method", value_delimiter = ',')]
    methods: Vec<String>,

    /// Earliest timestamp to keep.
    #[arg(long, value_parser = date_bound)]
    from: Option<String>,

    /// Latest timestamp to keep.
    #[arg(long, value_parser = date_bound)]
    to: Option<String>,

    /// Smallest response size to keep, in bytes.
    #[arg(long)]
    min_size: Option<u64>,

    /// Largest response size to keep, in bytes.
    #[arg(long)]
    max_size: Option<u64>,

    /// Write one CSV table per analysis plus results.json here.
    #[arg(short = 'o', long)]
    out_dir: Option<PathBuf>,

    /// Write the filtered records as CSV to this file.
    #[arg(long)]
    export_records: Option<PathBuf>,

    /// Print (and export) a previously computed results.json instead of parsing.
    #[arg(long, conflicts_with = "file")]
    import: Option<PathBuf>,

    /// Directory of remote job results (<dir>/<file-id>/results.json).
    #[arg(long, requires = "file_id")]
    remote_dir: Option<PathBuf>,

    /// Job identifier to look up in --remote-dir.
    #[arg(long)]
    file_id: Option<String>,

    /// Convert logged times to UTC using their offset.
    #[arg(long)]
    apply_offset: bool,

    /// Use this config file instead of the platform default.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, warnings) = match load_settings(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    util::logging::init(
        cli.debug,
        config.log_level.as_deref(),
        config.log_file.as_deref(),
    );
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    tracing::info!(
        version = constants::APP_VERSION,
        debug = cli.debug,
        "AccessLens starting"
    );

    match run(&cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "AccessLens failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Load an explicit config file strictly, or the platform default leniently.
fn load_settings(explicit: Option<&Path>) -> Result<(AppConfig, Vec<String>), AccessLensError> {
    match explicit {
        Some(path) => Ok(platform::config::load_config_file(path)?),
        None => {
            let paths = platform::config::PlatformPaths::resolve();
            Ok(platform::config::load_config(&paths.config_dir))
        }
    }
}

fn run(cli: &Cli, mut config: AppConfig) -> Result<(), AccessLensError> {
    if cli.apply_offset {
        config.apply_offset = true;
    }

    if let Some(import) = cli.import.as_deref() {
        let result = platform::fs::import_results(import)?;
        tracing::info!(file = %import.display(), "Imported analysis result");
        return emit(cli, &result);
    }

    let Some(file) = cli.file.as_deref() else {
        return Ok(());
    };

    let policy = if config.apply_offset {
        OffsetPolicy::Apply
    } else {
        OffsetPolicy::Ignore
    };
    let spec = build_filter(cli, policy);
    let kinds: Vec<AnalysisKind> = if cli.analyses.is_empty() {
        AnalysisKind::all().to_vec()
    } else {
        cli.analyses.clone()
    };

    let mut session_config = SessionConfig::from_app_config(&config);
    session_config.filter_debounce = Duration::ZERO;
    let mut session = AnalysisSession::new(session_config);

    let content = platform::fs::read_log_file(file)?;
    session.set_filter(spec, std::time::Instant::now());
    session.load(content);
    session.finish_pending(report);

    if let Some(summary) = session.summary() {
        if summary.error_rows > 0 {
            tracing::warn!(
                errors = summary.error_rows,
                first = ?summary.errors.first(),
                "Some lines could not be parsed"
            );
        }
    }
    if let Some(fatal) = session.errors().iter().find(|e| e.is_fatal()) {
        return Err(AccessLensError::Parse(fatal.clone()));
    }

    let (result, source) = match (cli.remote_dir.as_deref(), cli.file_id.as_deref()) {
        (Some(dir), Some(file_id)) => session.analyze_with_remote(
            &ResultDirRemote::new(dir),
            file_id,
            &kinds,
            config.remote_timeout,
        ),
        _ => (session.analyze(&kinds), AnalysisSource::Local),
    };
    tracing::info!(source = ?source, "Analysis result ready");

    if let Some(path) = cli.export_records.as_deref() {
        let writer = create_file(path)?;
        let count = accesslens::core::export::export_records_csv(
            session.filtered_records(),
            writer,
            path,
        )?;
        tracing::info!(file = %path.display(), records = count, "Records exported");
    }

    emit(cli, &result)
}

/// Progress reporting for the session driver.
fn report(event: &SessionEvent) {
    match event {
        SessionEvent::ParseProgress(p) => {
            tracing::info!(percent = p.percent, "{}", p.message);
        }
        SessionEvent::ParseCompleted(summary) => {
            tracing::info!(
                format = %summary.format,
                valid = summary.valid_rows,
                errors = summary.error_rows,
                truncated = summary.truncated,
                "{}",
                summary.message
            );
        }
        SessionEvent::ParseFailed(summary) => {
            tracing::error!(errors = ?summary.errors, "{}", summary.message);
        }
        SessionEvent::FilterProgress { progress, .. } => {
            tracing::debug!(percent = progress.percent, "{}", progress.message);
        }
        SessionEvent::FilterCompleted { matched, .. } => {
            tracing::info!(matched, "Filter applied");
        }
    }
}

/// Reject date bounds no timestamp form accepts.
fn date_bound(text: &str) -> Result<String, String> {
    match timestamp::normalize(text, OffsetPolicy::Ignore) {
        Some(_) => Ok(text.to_string()),
        None => Err(format!("unrecognised date '{text}'")),
    }
}

/// Build the filter from CLI flags.
fn build_filter(cli: &Cli, policy: OffsetPolicy) -> FilterSpec {
    let bound = |text: Option<&str>| text.and_then(|t| timestamp::normalize(t, policy));

    FilterSpec {
        date_range: DateRange {
            start: bound(cli.from.as_deref()),
            end: bound(cli.to.as_deref()),
        },
        ip_address: cli.ip.clone().unwrap_or_default(),
        url_pattern: cli.path.clone().unwrap_or_default(),
        status_codes: cli.statuses.iter().copied().collect(),
        http_methods: cli.methods.iter().map(|m| m.to_uppercase()).collect(),
        size_range: SizeRange {
            min: cli.min_size,
            max: cli.max_size,
        },
    }
}

fn create_file(path: &Path) -> Result<BufWriter<File>, AccessLensError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| AccessLensError::Io {
            path: path.to_path_buf(),
            operation: "create",
            source: e,
        })
}

/// Print the result document to stdout and export tables if requested.
fn emit(cli: &Cli, result: &AnalysisResult) -> Result<(), AccessLensError> {
    let stdout_path = Path::new("<stdout>");
    let mut out = std::io::stdout().lock();
    accesslens::core::export::write_results_json(result, &mut out, stdout_path)?;
    writeln!(out).map_err(|e| ExportError::Io {
        path: stdout_path.to_path_buf(),
        source: e,
    })?;

    if let Some(dir) = cli.out_dir.as_deref() {
        let files = platform::fs::export_all(result, dir)?;
        tracing::info!(
            tables = files.tables.len(),
            json = %files.results_json.display(),
            "Results exported"
        );
    }
    Ok(())
}
