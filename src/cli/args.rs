//! CLI argument definitions using clap
//!
//! Commands:
//! - sitekeep saveall
//! - sitekeep snapshot <site> [altdir]
//! - sitekeep restore <site> [--timestamp T] [altdir]
//! - sitekeep back <site> [--timestamp T] [altdir]
//! - sitekeep prepare <site>
//! - sitekeep list <site> [altdir]
//! - sitekeep sites
//! - sitekeep settings

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Backup and recovery of websites with a database
#[derive(Parser, Debug)]
#[command(name = "sitekeep")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the settings file
    #[arg(short, long, global = true, default_value = "website_manager_config.toml")]
    pub config: PathBuf,

    /// Path to the site table
    #[arg(short, long, global = true, default_value = "website_table.txt")]
    pub websites: PathBuf,

    /// Log every external command
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Show what would be done without doing it
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Comment written to the site's action log
    #[arg(long, global = true, default_value = "")]
    pub comment: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Recurring dump of every site marked for saving
    Saveall,

    /// Time-stamped snapshot of one site
    Snapshot {
        site: String,
        /// Existing directory used instead of the snapshot directory
        altdir: Option<PathBuf>,
    },

    /// Recover a site from an archive
    Restore {
        site: String,
        /// Archive tag; asked for interactively when missing
        #[arg(short, long)]
        timestamp: Option<String>,
        altdir: Option<PathBuf>,
    },

    /// Take a snapshot, then recover from an archive
    Back {
        site: String,
        #[arg(short, long)]
        timestamp: Option<String>,
        altdir: Option<PathBuf>,
    },

    /// Create a missing database and database user
    Prepare { site: String },

    /// Show the archives of a site
    List {
        site: String,
        altdir: Option<PathBuf>,
    },

    /// Show the site table
    Sites,

    /// Show the settings
    Settings,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
