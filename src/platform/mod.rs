// AccessLens - platform/mod.rs
//
// Platform abstraction layer: directories, config.toml, filesystem.
// Dependencies: standard library, directories, memmap2, toml; core data
// types for export.
// Must NOT depend on: app.

pub mod config;
pub mod fs;
