// AccessLens - core/scheduler.rs
//
// Chunked, cooperatively-yielding execution of parsing and filtering.
//
// A task is a plain state machine: each `step` processes exactly one bounded
// slice of its input and then returns control to the caller, reporting
// progress. The input is passed by reference on every call, so the task owns
// only its cursor and its partial output, and the host decides when (and
// whether) the next slice runs. Dropping a task is the cancellation.
//
// Slices are processed strictly in input order, so output order equals input
// order regardless of slice size.

use crate::core::csv_map::CsvLayout;
use crate::core::detect;
use crate::core::filter::{CompiledFilter, FilterSpec};
use crate::core::model::{percent_of, InputFormat, LogRecord, ParseOutcome, Progress};
use crate::core::parser::{LineDecoder, ParseConfig};
use crate::util::constants;
use crate::util::error::ParseError;

/// Result of one scheduling step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<T> {
    /// A slice was processed; more work may remain.
    Progress(Progress),
    /// The task has finished.
    Done(T),
}

/// A unit of work that advances one slice at a time.
pub trait ChunkedTask {
    type Input: ?Sized;
    type Output;

    /// Process the next slice of `input`.
    ///
    /// Must be called with the same input on every step.
    fn step(&mut self, input: &Self::Input) -> Step<Self::Output>;
}

/// Drive `task` until it finishes, forwarding each progress report.
pub fn run_to_completion<T, F>(mut task: T, input: &T::Input, mut on_progress: F) -> T::Output
where
    T: ChunkedTask,
    F: FnMut(&Progress),
{
    loop {
        match task.step(input) {
            Step::Progress(progress) => on_progress(&progress),
            Step::Done(output) => return output,
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Chunked parse of whole file content.
///
/// The first step detects the format (and, for CSV, maps the header) before
/// decoding its first slice. Hard failures finish immediately.
#[derive(Debug)]
pub struct ParseTask {
    config: ParseConfig,
    decoder: Option<LineDecoder>,
    /// Physical line number of the CSV header, skipped while decoding.
    header_line: Option<u64>,
    /// Byte offset of the next unread line.
    cursor: usize,
    lines_seen: u64,
    total_lines: u64,
    outcome: ParseOutcome,
    exhausted: bool,
}

impl ParseTask {
    pub fn new(config: ParseConfig) -> Self {
        Self {
            config,
            decoder: None,
            header_line: None,
            cursor: 0,
            lines_seen: 0,
            total_lines: 0,
            outcome: ParseOutcome::default(),
            exhausted: false,
        }
    }

    /// Detected format; `Log` until the first step has run.
    pub fn format(&self) -> InputFormat {
        self.outcome.format
    }

    /// Set up the decoder. Returns the failed outcome on a hard failure.
    fn start(&mut self, content: &str) -> Result<(), ParseOutcome> {
        self.total_lines = content.lines().count() as u64;

        let Some((line_number, first_line)) = detect::first_content_line(content) else {
            tracing::warn!(lines = self.total_lines, "Input has no non-blank lines");
            return Err(ParseOutcome::failed(
                InputFormat::Log,
                ParseError::EmptyInput,
                self.total_lines,
            ));
        };

        let format = detect::detect_line(first_line);
        let decoder = match format {
            InputFormat::Log => LineDecoder::Log,
            InputFormat::Csv => match CsvLayout::from_header(first_line) {
                Ok(layout) => {
                    self.header_line = Some(line_number);
                    LineDecoder::Csv(layout)
                }
                Err(e) => {
                    return Err(ParseOutcome::failed(InputFormat::Csv, e, self.total_lines));
                }
            },
        };

        tracing::info!(
            format = %format,
            total_lines = self.total_lines,
            chunk_lines = self.config.chunk_lines,
            "Parse started"
        );
        self.outcome.format = format;
        self.decoder = Some(decoder);
        Ok(())
    }

    /// Decode up to `chunk_lines` physical lines.
    fn decode_slice(&mut self, content: &str) -> Progress {
        let Some(decoder) = self.decoder.as_ref() else {
            self.exhausted = true;
            return Progress::new(100, "Nothing to parse");
        };
        let chunk = self.config.chunk_lines.max(1);
        let policy = self.config.offset_policy;

        for piece in content[self.cursor..].split_inclusive('\n').take(chunk) {
            self.cursor += piece.len();
            self.lines_seen += 1;

            let line = piece.trim();
            if line.is_empty() || self.header_line == Some(self.lines_seen) {
                continue;
            }

            match decoder.decode(line, self.lines_seen, policy) {
                Ok(record) => {
                    self.outcome.original_count += 1;
                    if self.outcome.records.len() < self.config.max_records {
                        self.outcome.records.push(record);
                    } else {
                        self.outcome.truncated = true;
                    }
                }
                Err(e) => {
                    tracing::debug!(line = self.lines_seen, error = %e, "Line rejected");
                    self.outcome.errors.push(e);
                }
            }
        }

        if self.cursor >= content.len() {
            self.exhausted = true;
        }

        let percent = percent_of(self.lines_seen as usize, self.total_lines as usize);
        tracing::debug!(
            lines = self.lines_seen,
            total = self.total_lines,
            records = self.outcome.records.len(),
            errors = self.outcome.errors.len(),
            "Parse slice complete"
        );
        Progress::new(
            percent,
            format!(
                "Parsed {} of {} lines ({} records)",
                self.lines_seen,
                self.total_lines,
                self.outcome.records.len()
            ),
        )
    }

    fn finish(&mut self) -> ParseOutcome {
        let mut outcome = std::mem::take(&mut self.outcome);
        outcome.lines_processed = self.lines_seen;
        if outcome.truncated {
            tracing::warn!(
                kept = outcome.records.len(),
                parsed = outcome.original_count,
                "Record limit reached; excess records dropped"
            );
        }
        tracing::info!(
            records = outcome.records.len(),
            errors = outcome.errors.len(),
            lines = outcome.lines_processed,
            "Parse complete"
        );
        outcome
    }
}

impl ChunkedTask for ParseTask {
    type Input = str;
    type Output = ParseOutcome;

    fn step(&mut self, content: &str) -> Step<ParseOutcome> {
        if self.exhausted {
            return Step::Done(self.finish());
        }
        if self.decoder.is_none() {
            if let Err(failed) = self.start(content) {
                self.exhausted = true;
                return Step::Done(failed);
            }
        }
        Step::Progress(self.decode_slice(content))
    }
}

/// Parse `content` without yielding. Produces exactly what the chunked
/// variant produces for the same configuration.
pub fn parse_content(content: &str, config: &ParseConfig) -> ParseOutcome {
    run_to_completion(ParseTask::new(config.clone()), content, |_| {})
}

// =============================================================================
// Filtering
// =============================================================================

/// Chunked filter over a record set, producing matching indices in order.
#[derive(Debug)]
pub struct FilterTask {
    filter: CompiledFilter,
    chunk_records: usize,
    cursor: usize,
    matched: Vec<usize>,
    exhausted: bool,
}

impl FilterTask {
    pub fn new(spec: &FilterSpec, chunk_records: usize) -> Self {
        Self {
            filter: spec.compile(),
            chunk_records: chunk_records.max(1),
            cursor: 0,
            matched: Vec::new(),
            exhausted: false,
        }
    }

    pub fn with_default_chunk(spec: &FilterSpec) -> Self {
        Self::new(spec, constants::DEFAULT_FILTER_CHUNK_RECORDS)
    }
}

impl ChunkedTask for FilterTask {
    type Input = [LogRecord];
    type Output = Vec<usize>;

    fn step(&mut self, records: &[LogRecord]) -> Step<Vec<usize>> {
        if self.exhausted {
            return Step::Done(std::mem::take(&mut self.matched));
        }

        let total = records.len();
        let end = (self.cursor + self.chunk_records).min(total);
        let start = self.cursor;
        self.matched.extend(
            records[start..end]
                .iter()
                .enumerate()
                .filter(|(_, record)| self.filter.matches(record))
                .map(|(offset, _)| start + offset),
        );
        self.cursor = end;
        if self.cursor >= total {
            self.exhausted = true;
        }

        Step::Progress(Progress::new(
            percent_of(end, total),
            format!("Filtered {end} of {total} records ({} matched)", self.matched.len()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::apply_filters;

    fn log_line(i: usize) -> String {
        format!(
            r#"10.0.{}.{} - - [25/Dec/2023:{:02}:15:30 +0000] "GET /page{} HTTP/1.1" {} {}"#,
            i / 250,
            i % 250,
            i % 24,
            i % 7,
            if i % 5 == 0 { 404 } else { 200 },
            i * 10
        )
    }

    fn content(n: usize) -> String {
        let mut out = String::new();
        for i in 0..n {
            out.push_str(&log_line(i));
            out.push('\n');
            if i % 10 == 3 {
                out.push_str("garbage text\n\n");
            }
        }
        out
    }

    fn config(chunk_lines: usize) -> ParseConfig {
        ParseConfig {
            chunk_lines,
            ..Default::default()
        }
    }

    #[test]
    fn test_chunked_and_sync_agree() {
        let text = content(500);
        let reference = parse_content(&text, &config(1_000_000));
        for chunk in [1, 7, 100, 499] {
            let chunked = run_to_completion(ParseTask::new(config(chunk)), text.as_str(), |_| {});
            assert_eq!(chunked, reference, "chunk size {chunk}");
        }
        assert_eq!(reference.records.len(), 500);
        assert_eq!(reference.errors.len(), 50);
    }

    #[test]
    fn test_line_accounting() {
        let text = content(40);
        let outcome = parse_content(&text, &config(10));
        let non_blank = text.lines().filter(|l| !l.trim().is_empty()).count();
        let blank = text.lines().count() - non_blank;
        assert_eq!(outcome.records.len() + outcome.errors.len(), non_blank);
        assert_eq!(
            outcome.lines_processed as usize,
            outcome.records.len() + outcome.errors.len() + blank
        );
    }

    #[test]
    fn test_progress_is_monotonic_and_ends_at_100() {
        let text = content(95);
        let mut seen = Vec::new();
        let outcome = run_to_completion(ParseTask::new(config(10)), text.as_str(), |p| {
            seen.push(p.percent)
        });
        assert!(!outcome.records.is_empty());
        assert!(seen.len() > 1);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[test]
    fn test_each_step_handles_one_slice() {
        let text = content(30);
        let mut task = ParseTask::new(config(10));
        let mut steps = 0;
        loop {
            steps += 1;
            if let Step::Done(_) = task.step(text.as_str()) {
                break;
            }
        }
        // 30 records plus 3 garbage/blank pairs: 36 lines, 4 slices, then Done.
        assert_eq!(text.lines().count(), 36);
        assert_eq!(steps, 5);
    }

    #[test]
    fn test_truncation_keeps_first_records() {
        let text = content(50);
        let cfg = ParseConfig {
            chunk_lines: 8,
            max_records: 20,
            ..Default::default()
        };
        let outcome = parse_content(&text, &cfg);
        assert!(outcome.truncated);
        assert_eq!(outcome.records.len(), 20);
        assert_eq!(outcome.original_count, 50);
        assert_eq!(outcome.records[19].path, format!("/page{}", 19 % 7));
    }

    #[test]
    fn test_empty_input_is_hard_failure() {
        for text in ["", "\n\n   \n"] {
            let outcome = parse_content(text, &ParseConfig::default());
            assert!(outcome.is_failure());
            assert!(outcome.records.is_empty());
            assert_eq!(outcome.errors, vec![ParseError::EmptyInput]);
        }
    }

    #[test]
    fn test_csv_without_fields_is_hard_failure() {
        let outcome = parse_content("name,status\nfoo,200\n", &ParseConfig::default());
        assert_eq!(outcome.format, InputFormat::Csv);
        assert_eq!(outcome.errors, vec![ParseError::NoRecognizableFields]);
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn test_csv_header_is_skipped_and_crlf_handled() {
        let text = "\r\nip,path,status\r\n1.1.1.1,/a,200\r\n,,\r\n2.2.2.2,/b,404\r\n";
        let outcome = parse_content(text, &config(1));
        assert_eq!(outcome.format, InputFormat::Csv);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].line_number, 3);
        assert_eq!(outcome.records[1].raw_line, "2.2.2.2,/b,404");
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].line_number(), Some(4));
    }

    #[test]
    fn test_filter_task_matches_apply_filters() {
        let outcome = parse_content(&content(200), &ParseConfig::default());
        let spec = FilterSpec {
            status_codes: [400].into_iter().collect(),
            ..Default::default()
        };
        let mut progress = Vec::new();
        let chunked = run_to_completion(
            FilterTask::new(&spec, 33),
            outcome.records.as_slice(),
            |p| progress.push(p.clone()),
        );
        assert_eq!(chunked, apply_filters(&outcome.records, &spec));
        assert_eq!(chunked.len(), 40);
        assert_eq!(progress.len(), 7);
        assert_eq!(progress[0].message, "Filtered 33 of 200 records (7 matched)");
        assert_eq!(progress.last().map(|p| p.percent), Some(100));
    }

    #[test]
    fn test_filter_task_on_empty_set() {
        let empty: Vec<LogRecord> = Vec::new();
        let out = run_to_completion(
            FilterTask::with_default_chunk(&FilterSpec::default()),
            empty.as_slice(),
            |_| {},
        );
        assert!(out.is_empty());
    }
}
