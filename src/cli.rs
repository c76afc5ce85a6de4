//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Keep a directory of HTTP downloads in line with a JSON job list.
///
/// Each job in the list names a `url` and a destination directory `dest`.
/// Job progress is written back into the list as each download runs.
#[derive(Parser, Debug)]
#[command(name = "download-manager")]
#[command(author, version, about)]
pub struct Args {
    /// JSON job list to reconcile (defaults to `jobs_file` from the config)
    #[arg(short, long, value_name = "FILE")]
    pub jobs: Option<PathBuf>,

    /// Config file (defaults to $XDG_CONFIG_HOME/download-manager/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Connect timeout in seconds (1-3600; no timeout by default)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Read timeout in seconds (1-3600; no timeout by default)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Keep running and follow edits to the job list until Ctrl-C
    #[arg(short, long)]
    pub watch: bool,
}

impl Args {
    /// Returns the log level the flags ask for, if any.
    #[must_use]
    pub fn log_level(&self) -> Option<&'static str> {
        if self.quiet {
            return Some("error");
        }
        match self.verbose {
            0 => None,
            1 => Some("debug"),
            _ => Some("trace"),
        }
    }
}
