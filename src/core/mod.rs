// AccessLens - core/mod.rs
//
// Core engine layer: detection, parsing, filtering, aggregation, export.
// Dependencies: standard library plus data crates (regex, chrono, serde,
// csv, indexmap) and tracing.
// Must NOT depend on: app or platform, and never touches the filesystem.

pub mod analysis;
pub mod csv_map;
pub mod detect;
pub mod export;
pub mod filter;
pub mod model;
pub mod parser;
pub mod scheduler;
pub mod timestamp;
