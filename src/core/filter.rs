// AccessLens - core/filter.rs
//
// Composable filter engine for access-log records.
// All active predicates are AND-combined; an inactive predicate passes.
// Core layer: pure logic, no I/O.

use crate::core::model::LogRecord;
use crate::core::timestamp::{self, OffsetPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Inclusive instant bounds. Either side may be open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateRange {
    #[serde(deserialize_with = "lenient_instant")]
    pub start: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_instant")]
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Inclusive byte-size bounds. Either side may be open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeRange {
    #[serde(deserialize_with = "lenient_size")]
    pub min: Option<u64>,
    #[serde(deserialize_with = "lenient_size")]
    pub max: Option<u64>,
}

impl SizeRange {
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Complete filter state, as supplied by the user or a remote caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSpec {
    pub date_range: DateRange,

    /// Case-insensitive substring of the client IP. Empty = no filter.
    pub ip_address: String,

    /// Case-insensitive substring of the request path. Empty = no filter.
    pub url_pattern: String,

    /// Exact codes, or hundreds-groups (400 matches any 4xx). Empty = all.
    pub status_codes: BTreeSet<u16>,

    /// Exact method names. Empty = all.
    pub http_methods: BTreeSet<String>,

    pub size_range: SizeRange,
}

impl FilterSpec {
    /// Returns true if no predicate is active.
    pub fn is_empty(&self) -> bool {
        self.date_range.is_empty()
            && self.ip_address.is_empty()
            && self.url_pattern.is_empty()
            && self.status_codes.is_empty()
            && self.http_methods.is_empty()
            && self.size_range.is_empty()
    }

    /// Prepare the spec for repeated evaluation.
    pub fn compile(&self) -> CompiledFilter {
        CompiledFilter {
            ip_lower: self.ip_address.to_lowercase(),
            path_lower: self.url_pattern.to_lowercase(),
            spec: self.clone(),
        }
    }
}

/// A `FilterSpec` with its substring needles lower-cased once.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    spec: FilterSpec,
    ip_lower: String,
    path_lower: String,
}

impl CompiledFilter {
    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }

    /// Check a single record against every active predicate.
    pub fn matches(&self, record: &LogRecord) -> bool {
        let spec = &self.spec;

        // Records without a timestamp are never excluded by the date range.
        if let Some(ts) = record.timestamp {
            if spec.date_range.start.is_some_and(|start| ts < start) {
                return false;
            }
            if spec.date_range.end.is_some_and(|end| ts > end) {
                return false;
            }
        }

        if !self.ip_lower.is_empty() && !record.ip.to_lowercase().contains(&self.ip_lower) {
            return false;
        }

        if !self.path_lower.is_empty() && !record.path.to_lowercase().contains(&self.path_lower) {
            return false;
        }

        if !spec.status_codes.is_empty() && !status_accepted(&spec.status_codes, record.status) {
            return false;
        }

        if !spec.http_methods.is_empty() && !spec.http_methods.contains(&record.method) {
            return false;
        }

        if spec.size_range.min.is_some_and(|min| record.size < min) {
            return false;
        }
        if spec.size_range.max.is_some_and(|max| record.size > max) {
            return false;
        }

        true
    }
}

/// Exact code, or its hundreds-group, is selected.
fn status_accepted(codes: &BTreeSet<u16>, status: u16) -> bool {
    codes.contains(&status) || codes.contains(&(status - status % 100))
}

/// Apply a filter to a slice of records, returning indices of matching records.
///
/// Indices point into `records` and preserve its order. An empty spec
/// returns every index.
pub fn apply_filters(records: &[LogRecord], spec: &FilterSpec) -> Vec<usize> {
    if spec.is_empty() {
        return (0..records.len()).collect();
    }
    let compiled = spec.compile();
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| compiled.matches(record))
        .map(|(idx, _)| idx)
        .collect()
}

// =============================================================================
// Lenient wire decoding
// =============================================================================

fn lenient_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    let parsed = timestamp::normalize(&raw, OffsetPolicy::default());
    if parsed.is_none() {
        tracing::warn!(value = %raw, "Ignoring unparseable date filter bound");
    }
    Ok(parsed)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Unsigned(u64),
    Float(f64),
    Text(String),
}

fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<NumberOrText> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(NumberOrText::Unsigned(n)) => Some(n),
        Some(NumberOrText::Float(f)) if f >= 0.0 => Some(f as u64),
        Some(NumberOrText::Text(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rec(ip: &str, path: &str, method: &str, status: u16, size: u64) -> LogRecord {
        LogRecord {
            line_number: 1,
            ip: ip.to_string(),
            timestamp: Some(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()),
            method: method.to_string(),
            path: path.to_string(),
            protocol: "HTTP/1.1".to_string(),
            status,
            size,
            referrer: None,
            user_agent: None,
            response_time: None,
            raw_line: String::new(),
        }
    }

    fn sample() -> Vec<LogRecord> {
        vec![
            rec("192.168.1.1", "/index.html", "GET", 200, 1000),
            rec("10.0.0.2", "/API/users", "POST", 404, 50),
            rec("10.0.0.3", "/api/orders", "GET", 499, 0),
            rec("192.168.1.4", "/login", "PUT", 300, 5000),
            rec("172.16.0.5", "/health", "GET", 500, 20),
        ]
    }

    #[test]
    fn test_empty_filter_passes_all() {
        let records = sample();
        assert_eq!(apply_filters(&records, &FilterSpec::default()), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_status_group_matches_whole_class() {
        let records = sample();
        let spec = FilterSpec {
            status_codes: [400].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &spec), vec![1, 2]);
    }

    #[test]
    fn test_exact_status_code() {
        let records = sample();
        let spec = FilterSpec {
            status_codes: [404].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &spec), vec![1]);
    }

    #[test]
    fn test_substring_filters_are_case_insensitive() {
        let records = sample();
        let spec = FilterSpec {
            url_pattern: "api".to_string(),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &spec), vec![1, 2]);

        let spec = FilterSpec {
            ip_address: "192.168".to_string(),
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &spec), vec![0, 3]);
    }

    #[test]
    fn test_methods_and_size_range_are_anded() {
        let records = sample();
        let spec = FilterSpec {
            http_methods: ["GET".to_string()].into_iter().collect(),
            size_range: SizeRange {
                min: Some(20),
                max: Some(1000),
            },
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &spec), vec![0, 4]);
    }

    #[test]
    fn test_method_match_is_exact() {
        let records = sample();
        let spec = FilterSpec {
            http_methods: ["get".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert!(apply_filters(&records, &spec).is_empty());
    }

    #[test]
    fn test_date_range_keeps_records_without_timestamp() {
        let mut records = sample();
        records[2].timestamp = None;
        records[3].timestamp = Some(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap());
        let spec = FilterSpec {
            date_range: DateRange {
                start: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                end: Some(Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()),
            },
            ..Default::default()
        };
        assert_eq!(apply_filters(&records, &spec), vec![0, 1, 2, 4]);
    }

    #[test]
    fn test_filter_is_idempotent_and_stable() {
        let records = sample();
        let spec = FilterSpec {
            http_methods: ["GET".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let first = apply_filters(&records, &spec);
        let subset: Vec<LogRecord> = first.iter().map(|&i| records[i].clone()).collect();
        let second = apply_filters(&subset, &spec);
        assert_eq!(second, (0..subset.len()).collect::<Vec<_>>());
        assert!(first.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_wire_shape_is_lenient() {
        let json = r#"{
            "dateRange": {"start": "2024-01-01T00:00:00Z", "end": ""},
            "ipAddress": "10.",
            "statusCodes": [400, 200],
            "httpMethods": ["GET"],
            "sizeRange": {"min": "100", "max": 2048}
        }"#;
        let spec: FilterSpec = serde_json::from_str(json).unwrap();
        assert!(spec.date_range.start.is_some());
        assert_eq!(spec.date_range.end, None);
        assert_eq!(spec.ip_address, "10.");
        assert!(spec.url_pattern.is_empty());
        assert_eq!(spec.status_codes.len(), 2);
        assert_eq!(spec.size_range.min, Some(100));
        assert_eq!(spec.size_range.max, Some(2048));

        let empty: FilterSpec = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_spec_json_round_trip() {
        let spec = FilterSpec {
            date_range: DateRange {
                start: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                end: None,
            },
            url_pattern: "/api".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&spec).unwrap();
        let back: FilterSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
    }
}
