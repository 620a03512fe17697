// AccessLens - app/remote.rs
//
// Remote analysis collaborator and the local-fallback policy.
//
// A remote analyzer receives a file identifier, the requested analyses and
// the active filter, and returns the same `AnalysisResult` schema the local
// engine produces. Any failure (unreachable, timed out, malformed or
// incomplete answer) is logged and replaced by a local computation; it never
// reaches the caller.

use crate::core::export;
use crate::core::filter::FilterSpec;
use crate::core::model::{AnalysisKind, AnalysisResult};
use crate::util::constants;
use crate::util::error::RemoteError;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSource {
    Remote,
    Local,
}

/// A backend that can run the analyses on a previously uploaded file.
pub trait RemoteAnalyzer {
    fn run(
        &self,
        file_id: &str,
        kinds: &[AnalysisKind],
        filter: &FilterSpec,
        timeout: Duration,
    ) -> Result<AnalysisResult, RemoteError>;
}

/// Check that every requested analysis is present in a remote answer.
fn check_complete(result: &AnalysisResult, kinds: &[AnalysisKind]) -> Result<(), RemoteError> {
    let present = result.analyses.present();
    match kinds.iter().find(|k| !present.contains(k)) {
        Some(missing) => Err(RemoteError::InvalidResponse {
            reason: format!("result is missing the '{missing}' analysis"),
        }),
        None => Ok(()),
    }
}

/// Try `remote`; on any failure compute locally with `local`.
pub fn analyze_with_fallback<R, L>(
    remote: &R,
    file_id: &str,
    kinds: &[AnalysisKind],
    filter: &FilterSpec,
    timeout: Duration,
    local: L,
) -> (AnalysisResult, AnalysisSource)
where
    R: RemoteAnalyzer + ?Sized,
    L: FnOnce() -> AnalysisResult,
{
    let attempt = remote
        .run(file_id, kinds, filter, timeout)
        .and_then(|result| check_complete(&result, kinds).map(|()| result));

    match attempt {
        Ok(result) => {
            tracing::info!(file_id, analyses = kinds.len(), "Remote analysis succeeded");
            (result, AnalysisSource::Remote)
        }
        Err(e) => {
            tracing::warn!(file_id, error = %e, "Remote analysis failed; computing locally");
            (local(), AnalysisSource::Local)
        }
    }
}

// =============================================================================
// Result-directory backend
// =============================================================================

/// Remote analyzer backed by a directory of finished jobs, laid out as
/// `<root>/<file_id>/results.json`, as left behind by a batch cluster run.
///
/// A job may record the filter it ran under in `filter.json`; a job without
/// one ran unfiltered. A job whose filter differs from the requested one is
/// rejected as an invalid response.
#[derive(Debug, Clone)]
pub struct ResultDirRemote {
    root: PathBuf,
}

impl ResultDirRemote {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filter the job at `job_dir` ran under.
    fn job_filter(job_dir: &Path) -> Result<FilterSpec, RemoteError> {
        let path = job_dir.join(constants::FILTER_JSON_FILE_NAME);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FilterSpec::default()),
            Err(e) => {
                return Err(RemoteError::Unavailable {
                    reason: format!("{}: {e}", path.display()),
                })
            }
        };
        serde_json::from_reader(BufReader::new(file)).map_err(|e| RemoteError::InvalidResponse {
            reason: format!("{}: {e}", path.display()),
        })
    }
}

impl RemoteAnalyzer for ResultDirRemote {
    fn run(
        &self,
        file_id: &str,
        kinds: &[AnalysisKind],
        filter: &FilterSpec,
        timeout: Duration,
    ) -> Result<AnalysisResult, RemoteError> {
        let started = Instant::now();
        let job_dir = self.root.join(file_id);
        let path = job_dir.join(constants::RESULTS_JSON_FILE_NAME);
        tracing::debug!(file = %path.display(), requested = kinds.len(), "Fetching remote result");

        let file = File::open(&path).map_err(|e| RemoteError::Unavailable {
            reason: format!("{}: {e}", path.display()),
        })?;
        let result = export::read_results_json(BufReader::new(file), &path).map_err(|e| {
            RemoteError::InvalidResponse {
                reason: e.to_string(),
            }
        })?;

        if Self::job_filter(&job_dir)? != *filter {
            return Err(RemoteError::InvalidResponse {
                reason: format!("job '{file_id}' ran under a different filter"),
            });
        }

        let elapsed = started.elapsed();
        if elapsed > timeout {
            return Err(RemoteError::Timeout { after: elapsed });
        }
        Ok(result)
    }
}
