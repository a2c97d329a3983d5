//! # cloudbox-cli
//!
//! Command definitions and output formatting for the `cloudbox` binary.

pub mod commands;
pub mod output;

pub use commands::Cli;
pub use output::OutputFormat;
