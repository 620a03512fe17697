// AccessLens - core/analysis.rs
//
// The five aggregation jobs over a (filtered) record set.
// Core layer: pure, runs to completion without yielding.
//
// Rankings group on exact keys in an insertion-ordered map and then apply a
// stable sort by descending count, so ties keep first-encountered order.

use crate::core::model::{
    Analyses, AnalysisKind, AnalysisResult, Bandwidth, HourCount, IpCount, LogRecord, PageCount,
    PathBytes, Progress, StatusCount, UniqueIps,
};
use crate::util::constants;
use chrono::{Timelike, Utc};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Tally `values` by key, keeping first-seen order.
fn tally<'a, V, I>(items: I) -> IndexMap<&'a str, V>
where
    V: Default + std::ops::AddAssign + Copy,
    I: IntoIterator<Item = (&'a str, V)>,
{
    let mut map: IndexMap<&'a str, V> = IndexMap::new();
    for (key, value) in items {
        *map.entry(key).or_default() += value;
    }
    map
}

/// Top `limit` entries by descending value, ties in first-seen order.
fn rank<'a, V: Ord + Copy>(map: IndexMap<&'a str, V>, limit: usize) -> Vec<(&'a str, V)> {
    let mut entries: Vec<(&str, V)> = map.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(limit);
    entries
}

/// Distinct IP count and the top 10 IPs.
pub fn unique_ips(records: &[&LogRecord]) -> UniqueIps {
    let counts = tally(records.iter().map(|r| (r.ip.as_str(), 1usize)));
    let count = counts.len();
    UniqueIps {
        count,
        top_ips: rank(counts, constants::TOP_IPS_LIMIT)
            .into_iter()
            .map(|(ip, count)| IpCount {
                ip: ip.to_string(),
                count,
            })
            .collect(),
    }
}

/// The 20 most requested paths.
pub fn top_pages(records: &[&LogRecord]) -> Vec<PageCount> {
    let counts = tally(records.iter().map(|r| (r.path.as_str(), 1usize)));
    rank(counts, constants::TOP_PAGES_LIMIT)
        .into_iter()
        .map(|(path, count)| PageCount {
            path: path.to_string(),
            count,
        })
        .collect()
}

/// Requests per hour of day; always 24 buckets. Records without a
/// timestamp are not counted.
pub fn hourly_traffic(records: &[&LogRecord]) -> Vec<HourCount> {
    let mut buckets = [0usize; constants::HOURS_PER_DAY];
    for ts in records.iter().filter_map(|r| r.timestamp) {
        buckets[ts.hour() as usize] += 1;
    }
    buckets
        .iter()
        .enumerate()
        .map(|(hour, &count)| HourCount {
            hour: hour as u8,
            count,
        })
        .collect()
}

/// Exact status-code counts in ascending code order.
pub fn status_codes(records: &[&LogRecord]) -> Vec<StatusCount> {
    let mut counts: BTreeMap<u16, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.status).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(status, count)| StatusCount { status, count })
        .collect()
}

/// Total and average bytes, plus the 10 heaviest paths.
pub fn bandwidth(records: &[&LogRecord]) -> Bandwidth {
    let total_bytes: u64 = records.iter().map(|r| r.size).sum();
    let avg_size = if records.is_empty() {
        0.0
    } else {
        total_bytes as f64 / records.len() as f64
    };
    let by_path = tally(records.iter().map(|r| (r.path.as_str(), r.size)));
    Bandwidth {
        total_bytes,
        avg_size,
        by_path: rank(by_path, constants::TOP_BANDWIDTH_PATHS_LIMIT)
            .into_iter()
            .map(|(path, bytes)| PathBytes {
                path: path.to_string(),
                bytes,
            })
            .collect(),
    }
}

/// Run the requested jobs over `records`.
///
/// `total_records` is the size of the unfiltered set. Duplicate kinds run
/// once. `on_progress` is called after each job.
pub fn run_analyses<F>(
    records: &[&LogRecord],
    total_records: usize,
    kinds: &[AnalysisKind],
    mut on_progress: F,
) -> AnalysisResult
where
    F: FnMut(&Progress),
{
    let mut requested: Vec<AnalysisKind> = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if !requested.contains(kind) {
            requested.push(*kind);
        }
    }

    let mut analyses = Analyses::default();
    let n = requested.len();
    for (i, kind) in requested.iter().enumerate() {
        match kind {
            AnalysisKind::UniqueIps => analyses.unique_ips = Some(unique_ips(records)),
            AnalysisKind::TopPages => analyses.top_pages = Some(top_pages(records)),
            AnalysisKind::HourlyTraffic => analyses.hourly_traffic = Some(hourly_traffic(records)),
            AnalysisKind::StatusCodes => analyses.status_codes = Some(status_codes(records)),
            AnalysisKind::Bandwidth => analyses.bandwidth = Some(bandwidth(records)),
        }
        tracing::debug!(analysis = %kind, records = records.len(), "Analysis job complete");
        on_progress(&Progress::new(
            (((i + 1) * 100) / n) as u8,
            format!("Completed {kind} ({} of {n})", i + 1),
        ));
    }

    tracing::info!(
        jobs = n,
        total_records,
        filtered_records = records.len(),
        "Analysis complete"
    );

    AnalysisResult {
        generated_at: Utc::now(),
        total_records,
        filtered_records: records.len(),
        analyses,
    }
}
