// AccessLens - core/export.rs
//
// Flat CSV tables per analysis, the JSON result document, and CSV export of
// record sets.
// Core layer: writes to (and reads from) any Write/Read trait object; the
// path is only used in error messages.

use crate::core::model::{AnalysisKind, AnalysisResult, LogRecord};
use crate::util::error::ExportError;
use std::io::{Read, Write};
use std::path::Path;

fn csv_err(path: &Path) -> impl Fn(csv::Error) -> ExportError + '_ {
    move |source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

/// Header row of the flat table for `kind`.
pub fn table_header(kind: AnalysisKind) -> [&'static str; 2] {
    match kind {
        AnalysisKind::UniqueIps => ["ip", "count"],
        AnalysisKind::TopPages => ["path", "count"],
        AnalysisKind::HourlyTraffic => ["hour", "count"],
        AnalysisKind::StatusCodes => ["status", "count"],
        AnalysisKind::Bandwidth => ["path", "bytes"],
    }
}

/// Data rows of the flat table for `kind`, or `None` if the result does not
/// contain that analysis.
pub fn table_rows(kind: AnalysisKind, result: &AnalysisResult) -> Option<Vec<[String; 2]>> {
    let a = &result.analyses;
    let rows = match kind {
        AnalysisKind::UniqueIps => a
            .unique_ips
            .as_ref()?
            .top_ips
            .iter()
            .map(|r| [r.ip.clone(), r.count.to_string()])
            .collect(),
        AnalysisKind::TopPages => a
            .top_pages
            .as_ref()?
            .iter()
            .map(|r| [r.path.clone(), r.count.to_string()])
            .collect(),
        AnalysisKind::HourlyTraffic => a
            .hourly_traffic
            .as_ref()?
            .iter()
            .map(|r| [r.hour.to_string(), r.count.to_string()])
            .collect(),
        AnalysisKind::StatusCodes => a
            .status_codes
            .as_ref()?
            .iter()
            .map(|r| [r.status.to_string(), r.count.to_string()])
            .collect(),
        AnalysisKind::Bandwidth => a
            .bandwidth
            .as_ref()?
            .by_path
            .iter()
            .map(|r| [r.path.clone(), r.bytes.to_string()])
            .collect(),
    };
    Some(rows)
}

/// Write the flat table for one analysis.
///
/// Returns the number of data rows written; an analysis missing from the
/// result produces a header-only table.
pub fn write_table<W: Write>(
    kind: AnalysisKind,
    result: &AnalysisResult,
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record(table_header(kind))
        .map_err(csv_err(export_path))?;

    let rows = table_rows(kind, result).unwrap_or_default();
    for row in &rows {
        csv_writer.write_record(row).map_err(csv_err(export_path))?;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    Ok(rows.len())
}

/// Write the full result document as pretty JSON.
pub fn write_results_json<W: Write>(
    result: &AnalysisResult,
    writer: W,
    export_path: &Path,
) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, result).map_err(|e| ExportError::Json {
        path: export_path.to_path_buf(),
        source: e,
    })
}

/// Read a result document produced by this or an external engine.
pub fn read_results_json<R: Read>(
    reader: R,
    source_path: &Path,
) -> Result<AnalysisResult, ExportError> {
    serde_json::from_reader(reader).map_err(|e| ExportError::Json {
        path: source_path.to_path_buf(),
        source: e,
    })
}

/// Export records to CSV.
///
/// Writes: line, ip, timestamp, method, path, protocol, status, size
pub fn export_records_csv<'a, W, I>(
    records: I,
    writer: W,
    export_path: &Path,
) -> Result<usize, ExportError>
where
    W: Write,
    I: IntoIterator<Item = &'a LogRecord>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record([
            "line", "ip", "timestamp", "method", "path", "protocol", "status", "size",
        ])
        .map_err(csv_err(export_path))?;

    let mut count = 0;
    for record in records {
        let ts = record
            .timestamp
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        csv_writer
            .write_record([
                &record.line_number.to_string(),
                &record.ip,
                &ts,
                &record.method,
                &record.path,
                &record.protocol,
                &record.status.to_string(),
                &record.size.to_string(),
            ])
            .map_err(csv_err(export_path))?;
        count += 1;
    }

    csv_writer.flush().map_err(|e| ExportError::Io {
        path: export_path.to_path_buf(),
        source: e,
    })?;
    Ok(count)
}
