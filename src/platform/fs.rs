// AccessLens - platform/fs.rs
//
// Filesystem access: reading uploaded log files and writing result exports.
//
// Large files are memory-mapped and served straight from the map when they
// are valid UTF-8. Invalid UTF-8 is replaced rather than rejected so one bad
// byte never loses a whole file. Transient I/O errors are retried with
// capped backoff.

use crate::core::export;
use crate::core::model::{AnalysisKind, AnalysisResult};
use crate::util::constants;
use crate::util::error::{AccessLensError, ExportError};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry limits for transient I/O errors.
const MAX_RETRIES: u32 = 3;
const RETRY_DELAYS_MS: [u64; 3] = [50, 100, 200];

/// Text of a loaded log file.
#[derive(Debug)]
pub enum LogContent {
    /// Decoded into an owned buffer.
    Owned(String),
    /// Borrowed from a read-only map whose bytes were validated as UTF-8.
    Mapped(memmap2::Mmap),
}

impl LogContent {
    pub fn as_str(&self) -> &str {
        match self {
            LogContent::Owned(text) => text,
            // SAFETY: `Mapped` is only built after `std::str::from_utf8`
            // accepted the mapped bytes, and the map is read-only.
            LogContent::Mapped(map) => unsafe { std::str::from_utf8_unchecked(map) },
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, LogContent::Mapped(_))
    }
}

impl Deref for LogContent {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl From<String> for LogContent {
    fn from(text: String) -> Self {
        LogContent::Owned(text)
    }
}

/// Read a log file as text.
///
/// Files above `LARGE_FILE_THRESHOLD` are memory-mapped and used in place
/// when valid UTF-8. Invalid UTF-8 is decoded lossily into an owned copy.
pub fn read_log_file(path: &Path) -> Result<LogContent, AccessLensError> {
    let io_err = |source: io::Error| AccessLensError::Io {
        path: path.to_path_buf(),
        operation: "read log file",
        source,
    };

    let len = std::fs::metadata(path).map_err(io_err)?.len();
    let content = if len > constants::LARGE_FILE_THRESHOLD {
        read_large_file(path).map_err(io_err)?
    } else {
        LogContent::Owned(read_small_file_with_retry(path).map_err(io_err)?)
    };

    tracing::info!(
        file = %path.display(),
        bytes = len,
        mapped = content.is_mapped(),
        "Log file read"
    );
    Ok(content)
}

/// Read using `memmap2` for large files.
fn read_large_file(path: &Path) -> io::Result<LogContent> {
    let file = File::open(path)?;
    // SAFETY: the map is read-only. External modification of the file while
    // mapped is outside our control and is accepted for already-written log
    // files.
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    if std::str::from_utf8(&mmap).is_ok() {
        return Ok(LogContent::Mapped(mmap));
    }
    tracing::warn!(file = %path.display(), "File contains invalid UTF-8; replacing undecodable bytes");
    Ok(LogContent::Owned(String::from_utf8_lossy(&mmap).into_owned()))
}

/// Read a small file with transient-error retries.
fn read_small_file_with_retry(path: &Path) -> io::Result<String> {
    let mut last_err: Option<io::Error> = None;

    for attempt in 0..MAX_RETRIES {
        match std::fs::read(path) {
            Ok(bytes) => return Ok(decode_lossy(bytes)),
            Err(e) if is_transient_error(&e) => {
                tracing::debug!(
                    file = %path.display(),
                    attempt = attempt + 1,
                    error = %e,
                    "Transient I/O error, retrying"
                );
                std::thread::sleep(Duration::from_millis(RETRY_DELAYS_MS[attempt as usize]));
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| io::Error::other("Unknown read error")))
}

fn decode_lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("File contains invalid UTF-8; replacing undecodable bytes");
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}

/// Returns true for transient I/O errors that are worth retrying.
fn is_transient_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

// =============================================================================
// Result export
// =============================================================================

/// Files written by `export_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub tables: BTreeMap<AnalysisKind, PathBuf>,
    pub results_json: PathBuf,
}

fn create(path: &Path) -> Result<BufWriter<File>, ExportError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| ExportError::Io {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Write one CSV table per analysis present in `result`, plus
/// `results.json`, into `dir` (created if missing).
pub fn export_all(result: &AnalysisResult, dir: &Path) -> Result<ExportedFiles, ExportError> {
    std::fs::create_dir_all(dir).map_err(|e| ExportError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut tables = BTreeMap::new();
    for kind in result.analyses.present() {
        let path = dir.join(kind.table_file_name());
        let rows = export::write_table(kind, result, create(&path)?, &path)?;
        tracing::debug!(analysis = %kind, rows, file = %path.display(), "Table exported");
        tables.insert(kind, path);
    }

    let results_json = dir.join(constants::RESULTS_JSON_FILE_NAME);
    export::write_results_json(result, create(&results_json)?, &results_json)?;

    tracing::info!(
        dir = %dir.display(),
        tables = tables.len(),
        "Analysis results exported"
    );
    Ok(ExportedFiles {
        tables,
        results_json,
    })
}

/// Load a `results.json` document written by `export_all` or an external
/// engine.
pub fn import_results(path: &Path) -> Result<AnalysisResult, ExportError> {
    let file = File::open(path).map_err(|e| ExportError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    export::read_results_json(io::BufReader::new(file), path)
}
