//! Shared CLI plumbing: configuration, resolver wiring and output
//! rendering. The binary in `main.rs` is a thin layer over these modules.

pub mod bootstrap;
pub mod config;
pub mod output;
