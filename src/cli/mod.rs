//! Command Line Interface (CLI) layer for eoprocess.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for the `ndvi`, `rgb`, `merge`
//! and `processes` subcommands. It wires settings and flags to the library
//! jobs exposed via `eoprocess::api`.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
