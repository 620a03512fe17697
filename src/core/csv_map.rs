// AccessLens - core/csv_map.rs
//
// Delimited (CSV/TSV) input: header-to-field mapping and quote-aware row
// decoding into `LogRecord`s.
// Core layer: pure logic.

use crate::core::model::LogRecord;
use crate::core::parser::{excerpt, parse_size, parse_status};
use crate::core::timestamp::{self, OffsetPolicy};
use crate::util::constants;
use crate::util::error::ParseError;

/// Semantic fields a header column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Ip,
    Timestamp,
    Method,
    Path,
    Status,
    Size,
}

impl Field {
    const ALL: [Field; 6] = [
        Field::Ip,
        Field::Timestamp,
        Field::Method,
        Field::Path,
        Field::Status,
        Field::Size,
    ];

    /// Substrings that identify this field in a lower-cased header cell.
    fn keywords(self) -> &'static [&'static str] {
        match self {
            Field::Ip => &["ip", "address", "client"],
            Field::Timestamp => &["time", "date"],
            Field::Method => &["method", "verb"],
            Field::Path => &["path", "url", "uri", "request"],
            Field::Status => &["status", "code", "response"],
            Field::Size => &["size", "bytes", "length"],
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Column index for each semantic field, if the header provided one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldColumns {
    columns: [Option<usize>; 6],
}

impl FieldColumns {
    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns[field.slot()]
    }

    fn set(&mut self, field: Field, column: usize) {
        self.columns[field.slot()] = Some(column);
    }
}

/// Map header cells to fields.
///
/// Each field independently takes the first header cell containing one of
/// its keywords, so one cell may serve several fields.
pub fn map_fields(headers: &[String]) -> FieldColumns {
    let normalised: Vec<String> = headers.iter().map(String::as_str).map(normalise_header).collect();
    let mut columns = FieldColumns::default();
    for field in Field::ALL {
        let hit = normalised
            .iter()
            .position(|header| field.keywords().iter().any(|k| header.contains(k)));
        if let Some(idx) = hit {
            columns.set(field, idx);
        }
    }
    columns
}

fn normalise_header(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '"' && *c != '\'')
        .collect()
}

/// Split a row on `delimiter`, honouring double-quoted spans.
///
/// A quote toggles the quoted span; `""` inside a span is a literal quote;
/// the delimiter is ignored inside a span. Cells are whitespace-trimmed.
pub fn split_row(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => {
                cells.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

/// Delimiter and column layout derived from a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvLayout {
    pub delimiter: char,
    pub columns: FieldColumns,
}

impl CsvLayout {
    /// Build a layout from the header line.
    ///
    /// Fails with `NoRecognizableFields` when neither an IP nor a path
    /// column can be identified.
    pub fn from_header(header: &str) -> Result<Self, ParseError> {
        let delimiter = if header.contains('\t') { '\t' } else { ',' };
        let headers = split_row(header, delimiter);
        let columns = map_fields(&headers);

        if columns.get(Field::Ip).is_none() && columns.get(Field::Path).is_none() {
            tracing::warn!(
                headers = ?headers,
                "CSV header has no ip or path column; file rejected"
            );
            return Err(ParseError::NoRecognizableFields);
        }

        tracing::debug!(delimiter = ?delimiter, columns = ?columns, "CSV layout mapped");
        Ok(Self { delimiter, columns })
    }

    /// Decode one trimmed, non-empty data row.
    pub fn decode_row(
        &self,
        line: &str,
        line_number: u64,
        policy: OffsetPolicy,
    ) -> Result<LogRecord, ParseError> {
        let cells = split_row(line, self.delimiter);
        let cell = |field: Field| -> Option<&str> {
            self.columns
                .get(field)
                .and_then(|idx| cells.get(idx))
                .map(String::as_str)
                .filter(|v| !v.is_empty())
        };

        let ip = cell(Field::Ip).unwrap_or(constants::UNKNOWN_IP);
        let path = cell(Field::Path).unwrap_or(constants::DEFAULT_PATH);
        let status = cell(Field::Status).map_or(0, parse_status);

        if ip == constants::UNKNOWN_IP && path == constants::DEFAULT_PATH && status == 0 {
            return Err(ParseError::InsufficientData {
                line_number,
                excerpt: excerpt(line),
            });
        }

        Ok(LogRecord {
            line_number,
            ip: ip.to_string(),
            timestamp: cell(Field::Timestamp).and_then(|t| timestamp::normalize(t, policy)),
            method: cell(Field::Method)
                .unwrap_or(constants::DEFAULT_METHOD)
                .to_string(),
            path: path.to_string(),
            protocol: constants::DEFAULT_PROTOCOL.to_string(),
            status,
            size: cell(Field::Size).map_or(0, parse_size),
            referrer: None,
            user_agent: None,
            response_time: None,
            raw_line: line.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_map_standard_header() {
        let cols = map_fields(&headers(&["ip", "timestamp", "method", "path", "status", "size"]));
        assert_eq!(cols.get(Field::Ip), Some(0));
        assert_eq!(cols.get(Field::Timestamp), Some(1));
        assert_eq!(cols.get(Field::Method), Some(2));
        assert_eq!(cols.get(Field::Path), Some(3));
        assert_eq!(cols.get(Field::Status), Some(4));
        assert_eq!(cols.get(Field::Size), Some(5));
    }

    #[test]
    fn test_map_synonyms_and_quotes() {
        let cols = map_fields(&headers(&[
            "\"Client_Address\"",
            "'Date'",
            "Verb",
            "Request URI",
            "Response Code",
            "Bytes Sent",
        ]));
        assert_eq!(cols.get(Field::Ip), Some(0));
        assert_eq!(cols.get(Field::Timestamp), Some(1));
        assert_eq!(cols.get(Field::Method), Some(2));
        assert_eq!(cols.get(Field::Path), Some(3));
        assert_eq!(cols.get(Field::Status), Some(4));
        assert_eq!(cols.get(Field::Size), Some(5));
    }

    #[test]
    fn test_first_matching_cell_wins() {
        let cols = map_fields(&headers(&["url", "path"]));
        assert_eq!(cols.get(Field::Path), Some(0));
    }

    #[test]
    fn test_fields_map_independently() {
        let cols = map_fields(&headers(&["client_ip", "request_time", "request", "status"]));
        assert_eq!(cols.get(Field::Ip), Some(0));
        assert_eq!(cols.get(Field::Timestamp), Some(1));
        assert_eq!(cols.get(Field::Path), Some(1));
        assert_eq!(cols.get(Field::Status), Some(3));
    }

    #[test]
    fn test_split_row_quote_handling() {
        assert_eq!(split_row("a,b,c", ','), vec!["a", "b", "c"]);
        assert_eq!(
            split_row(r#"1.1.1.1,"/search?q=a,b",200"#, ','),
            vec!["1.1.1.1", "/search?q=a,b", "200"]
        );
        assert_eq!(
            split_row(r#""say ""hi""",x"#, ','),
            vec![r#"say "hi""#, "x"]
        );
        assert_eq!(split_row("a\t b \tc", '\t'), vec!["a", "b", "c"]);
        assert_eq!(split_row("a,,", ','), vec!["a", "", ""]);
    }

    #[test]
    fn test_layout_rejects_unrecognised_header() {
        assert_eq!(
            CsvLayout::from_header("foo,bar,baz"),
            Err(ParseError::NoRecognizableFields)
        );
    }

    #[test]
    fn test_layout_prefers_tab() {
        let layout = CsvLayout::from_header("ip\tpath,extra\tstatus").unwrap();
        assert_eq!(layout.delimiter, '\t');
    }

    #[test]
    fn test_decode_row() {
        let layout = CsvLayout::from_header("ip,timestamp,method,path,status,size").unwrap();
        let rec = layout
            .decode_row("10.0.0.1,2023-01-01T00:00:00Z,GET,/a,200,100", 2, OffsetPolicy::Ignore)
            .unwrap();
        assert_eq!(rec.ip, "10.0.0.1");
        assert_eq!(rec.path, "/a");
        assert_eq!(rec.status, 200);
        assert_eq!(rec.size, 100);
        assert_eq!(rec.protocol, "HTTP/1.1");
        assert!(rec.timestamp.is_some());
        assert_eq!(rec.line_number, 2);
    }

    #[test]
    fn test_decode_row_defaults_missing_columns() {
        let layout = CsvLayout::from_header("path,status").unwrap();
        let rec = layout.decode_row("/b,-", 3, OffsetPolicy::Ignore).unwrap();
        assert_eq!(rec.ip, "unknown");
        assert_eq!(rec.method, "GET");
        assert_eq!(rec.status, 0);
        assert_eq!(rec.size, 0);
        assert_eq!(rec.timestamp, None);
    }

    #[test]
    fn test_short_row_with_only_defaults_is_insufficient() {
        let layout = CsvLayout::from_header("ip,path,status").unwrap();
        let err = layout.decode_row(",,", 5, OffsetPolicy::Ignore).unwrap_err();
        assert!(matches!(err, ParseError::InsufficientData { line_number: 5, .. }));
    }

    #[test]
    fn test_dash_size_is_zero() {
        let layout = CsvLayout::from_header("ip,path,bytes").unwrap();
        let rec = layout.decode_row("1.1.1.1,/x,-", 2, OffsetPolicy::Ignore).unwrap();
        assert_eq!(rec.size, 0);
    }
}
