// AccessLens - app/mod.rs
//
// Application layer: the analysis session and the remote collaborator.
// Dependencies: core, platform config.

pub mod remote;
pub mod session;
