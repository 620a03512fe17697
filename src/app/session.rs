// AccessLens - app/session.rs
//
// The analysis session: the caller-owned context holding the current
// dataset, the active filter, and the in-flight chunked work.
//
// Execution model:
//   - Single-threaded. The host calls `poll(now)`; each call runs at most one
//     slice of parsing or filtering and returns the resulting event.
//   - A filter edit replaces the filter spec, bumps the generation, drops any
//     in-flight filter run, and schedules a fresh run after the debounce
//     delay. Edits inside the delay coalesce into one run.
//   - A dropped run never reports again, so only the latest generation's
//     completion is ever observed.
//   - The parse always runs before any filter slice.

use crate::app::remote::{self, AnalysisSource, RemoteAnalyzer};
use crate::core::analysis;
use crate::core::filter::FilterSpec;
use crate::core::model::{
    AnalysisKind, AnalysisResult, LogRecord, ParseSummary, PreviewPage, Progress,
};
use crate::core::parser::ParseConfig;
use crate::core::scheduler::{ChunkedTask, FilterTask, ParseTask, Step};
use crate::core::timestamp::OffsetPolicy;
use crate::platform::config::AppConfig;
use crate::platform::fs::LogContent;
use crate::util::constants;
use crate::util::error::ParseError;
use std::time::{Duration, Instant};

/// Tunables for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub parse: ParseConfig,
    pub filter_chunk_records: usize,
    pub filter_debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            parse: ParseConfig::default(),
            filter_chunk_records: constants::DEFAULT_FILTER_CHUNK_RECORDS,
            filter_debounce: Duration::from_millis(constants::DEFAULT_FILTER_DEBOUNCE_MS),
        }
    }
}

impl SessionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            parse: ParseConfig {
                chunk_lines: config.parse_chunk_lines,
                max_records: config.max_records,
                offset_policy: if config.apply_offset {
                    OffsetPolicy::Apply
                } else {
                    OffsetPolicy::Ignore
                },
            },
            filter_chunk_records: config.filter_chunk_records,
            filter_debounce: config.filter_debounce,
        }
    }
}

/// What a `poll` call accomplished.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    ParseProgress(Progress),
    ParseCompleted(ParseSummary),
    /// The content was rejected as a whole; the session holds no records.
    ParseFailed(ParseSummary),
    FilterProgress { generation: u64, progress: Progress },
    FilterCompleted { generation: u64, matched: usize },
}

struct ParseRun {
    content: LogContent,
    task: ParseTask,
}

struct FilterRun {
    generation: u64,
    task: FilterTask,
}

/// The current dataset and everything derived from it.
pub struct AnalysisSession {
    config: SessionConfig,

    records: Vec<LogRecord>,
    errors: Vec<ParseError>,
    summary: Option<ParseSummary>,
    parse: Option<ParseRun>,

    filter: FilterSpec,
    /// Indices into `records` passing the most recently completed filter run.
    filtered: Vec<usize>,
    generation: u64,
    filter_due: Option<Instant>,
    filter_run: Option<FilterRun>,
}

impl AnalysisSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
            errors: Vec::new(),
            summary: None,
            parse: None,
            filter: FilterSpec::default(),
            filtered: Vec::new(),
            generation: 0,
            filter_due: None,
            filter_run: None,
        }
    }

    /// Replace the dataset with `content`, starting a chunked parse.
    ///
    /// Previous records, errors and filter results are discarded at once.
    /// The active filter spec is kept and re-applied when the parse ends.
    pub fn load(&mut self, content: impl Into<LogContent>) {
        let content = content.into();
        tracing::info!(bytes = content.len(), "Loading new content");
        self.records.clear();
        self.errors.clear();
        self.filtered.clear();
        self.summary = None;
        self.filter_run = None;
        self.filter_due = None;
        self.parse = Some(ParseRun {
            content,
            task: ParseTask::new(self.config.parse.clone()),
        });
    }

    /// Replace the active filter. The new run starts once `debounce` has
    /// passed since this call; any in-flight run is abandoned.
    pub fn set_filter(&mut self, spec: FilterSpec, now: Instant) {
        self.generation += 1;
        if self.filter_run.take().is_some() {
            tracing::debug!(generation = self.generation, "In-flight filter run superseded");
        }
        self.filter = spec;
        self.filter_due = Some(now + self.config.filter_debounce);
        tracing::debug!(
            generation = self.generation,
            debounce_ms = self.config.filter_debounce.as_millis() as u64,
            "Filter run scheduled"
        );
    }

    /// Run at most one slice of outstanding work.
    ///
    /// Returns `None` when nothing can run at `now`: either the session is
    /// idle or a filter run is still waiting out its debounce delay.
    pub fn poll(&mut self, now: Instant) -> Option<SessionEvent> {
        if let Some(run) = self.parse.as_mut() {
            return Some(match run.task.step(run.content.as_str()) {
                Step::Progress(progress) => SessionEvent::ParseProgress(progress),
                Step::Done(outcome) => {
                    self.parse = None;
                    let summary = outcome.summary();
                    self.summary = Some(summary.clone());
                    self.errors = outcome.errors;
                    if self.errors.iter().any(ParseError::is_fatal) {
                        tracing::warn!(message = %summary.message, "Content rejected");
                        return Some(SessionEvent::ParseFailed(summary));
                    }
                    self.records = outcome.records;
                    if self.filter.is_empty() {
                        self.filtered = (0..self.records.len()).collect();
                    } else {
                        self.filter_due = Some(now);
                    }
                    SessionEvent::ParseCompleted(summary)
                }
            });
        }

        if self.filter_due.is_some_and(|due| now >= due) {
            self.filter_due = None;
            self.filter_run = Some(FilterRun {
                generation: self.generation,
                task: FilterTask::new(&self.filter, self.config.filter_chunk_records),
            });
        }

        let run = self.filter_run.as_mut()?;
        let generation = run.generation;
        Some(match run.task.step(&self.records) {
            Step::Progress(progress) => SessionEvent::FilterProgress {
                generation,
                progress,
            },
            Step::Done(matched) => {
                self.filter_run = None;
                self.filtered = matched;
                tracing::info!(
                    generation,
                    matched = self.filtered.len(),
                    total = self.records.len(),
                    "Filter applied"
                );
                SessionEvent::FilterCompleted {
                    generation,
                    matched: self.filtered.len(),
                }
            }
        })
    }

    /// True while a parse or filter run is outstanding.
    pub fn is_busy(&self) -> bool {
        self.parse.is_some() || self.filter_run.is_some() || self.filter_due.is_some()
    }

    /// When the next debounced filter run may start, if one is waiting.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.filter_due
    }

    /// Run all outstanding work now, skipping any remaining debounce delay.
    pub fn finish_pending<F>(&mut self, mut on_event: F)
    where
        F: FnMut(&SessionEvent),
    {
        while self.is_busy() {
            let now = Instant::now();
            let now = self.filter_due.map_or(now, |due| due.max(now));
            match self.poll(now) {
                Some(event) => on_event(&event),
                None => break,
            }
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Summary of the last completed parse.
    pub fn summary(&self) -> Option<&ParseSummary> {
        self.summary.as_ref()
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Records passing the most recently completed filter run, in input order.
    pub fn filtered_records(&self) -> Vec<&LogRecord> {
        self.filtered.iter().map(|&i| &self.records[i]).collect()
    }

    pub fn filtered_count(&self) -> usize {
        self.filtered.len()
    }

    /// One page of the filtered records. `page` is 1-based; `limit` is
    /// clamped to `1..=MAX_PREVIEW_LIMIT`.
    pub fn preview(&self, page: usize, limit: usize) -> PreviewPage {
        let limit = limit.clamp(1, constants::MAX_PREVIEW_LIMIT);
        let page = page.max(1);
        let total = self.filtered.len();
        let data = self
            .filtered
            .iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .map(|&i| self.records[i].clone())
            .collect();
        PreviewPage {
            data,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        }
    }

    // -------------------------------------------------------------------------
    // Analysis
    // -------------------------------------------------------------------------

    fn compute(&self, kinds: &[AnalysisKind]) -> AnalysisResult {
        let records = self.filtered_records();
        analysis::run_analyses(&records, self.records.len(), kinds, |p| {
            tracing::debug!(percent = p.percent, message = %p.message, "Analysis progress");
        })
    }

    /// Run the requested analyses over the current filtered set, first
    /// completing any outstanding parse or filter work.
    pub fn analyze(&mut self, kinds: &[AnalysisKind]) -> AnalysisResult {
        self.finish_pending(|_| {});
        self.compute(kinds)
    }

    /// Ask `remote` for the analyses, computing locally if it fails.
    pub fn analyze_with_remote<R>(
        &mut self,
        remote: &R,
        file_id: &str,
        kinds: &[AnalysisKind],
        timeout: Duration,
    ) -> (AnalysisResult, AnalysisSource)
    where
        R: RemoteAnalyzer + ?Sized,
    {
        self.finish_pending(|_| {});
        remote::analyze_with_fallback(remote, file_id, kinds, &self.filter, timeout, || {
            self.compute(kinds)
        })
    }
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
