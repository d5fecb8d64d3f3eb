//! CLI module for sitekeep
//!
//! Provides command-line interface for:
//! - saveall: recurring dump of all sites marked for saving
//! - snapshot: time-stamped backup of one site
//! - restore / back: recover one site, optionally after a snapshot
//! - prepare: create a missing database and database user
//! - list, sites, settings: show archives and configuration

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{dispatch, run, run_command, write_listing, Context};
pub use errors::{CliError, CliErrorCode, CliResult};
