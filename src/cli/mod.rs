//! Command-line interface for palin-dispatch
//!
//! Parses flags with clap, merges them over the figment configuration
//! layers, installs logging and signal handling, then hands the run to the
//! coordinator and turns its outcome into a process exit status.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

mod output;

pub use output::Output;

use crate::config::DispatchConfig;
use crate::parallel::Coordinator;
use crate::worker::EXIT_SUCCESS;

/// Classify items as palindromes with a bounded pool of workers
#[derive(Debug, Parser)]
#[command(
    name = "palin-dispatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Bounded-concurrency palindrome classifier",
    long_about = "Reads newline-separated items, dispatches one worker per item with at most \
                  CONCURRENCY running at once, and appends each item to the palindrome or \
                  non-palindrome file under a per-file lock. Events are journaled with a \
                  virtual clock."
)]
pub struct Cli {
    /// Maximum number of workers ever dispatched
    #[arg(short = 'n', long, value_name = "TOTAL")]
    pub total_jobs: Option<usize>,

    /// Maximum number of workers running at once (capped at 20)
    #[arg(short = 's', long, value_name = "CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Seconds before the run is cancelled
    #[arg(short = 't', long, value_name = "SECONDS")]
    pub max_runtime: Option<u64>,

    /// Newline-separated list of items
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Use custom configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the merged configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}

/// Flags that take precedence over every configuration layer.
///
/// Absent flags are skipped so they never mask a lower layer.
#[derive(Debug, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_jobs: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_runtime: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            total_jobs: self.total_jobs,
            concurrency: self.concurrency,
            max_runtime: self.max_runtime,
            input: self.input.clone(),
        }
    }

    /// Execute the run and return the process exit status
    pub async fn run(self) -> Result<i32> {
        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.verbose > 0, self.quiet);

        let config = DispatchConfig::load(self.config.as_deref(), Some(&self.overrides()))?;
        if self.print_config {
            print!("{}", config.to_toml()?);
            return Ok(EXIT_SUCCESS);
        }
        output.run_plan(&config);

        let coordinator = Coordinator::new(config.clone());
        let signals = coordinator.cancel_handle().listen_for_signals();
        let result = coordinator.run().await;
        signals.abort();

        let report = result.context("Dispatch setup failed")?;
        output.run_summary(&config, &report);
        Ok(report.outcome.exit_code())
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match (quiet, verbose) {
            (true, _) => tracing_subscriber::EnvFilter::new("error"),
            (false, 0) => tracing_subscriber::EnvFilter::new("warn"),
            (false, 1) => tracing_subscriber::EnvFilter::new("debug,journal=off"),
            // -vv mirrors journal lines as well
            (false, _) => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_short_flags_and_input() {
        let cli = Cli::try_parse_from(["palin-dispatch", "-n", "10", "-s", "5", "-t", "30", "words.txt"])
            .unwrap();
        assert_eq!(cli.total_jobs, Some(10));
        assert_eq!(cli.concurrency, Some(5));
        assert_eq!(cli.max_runtime, Some(30));
        assert_eq!(cli.input, Some(PathBuf::from("words.txt")));
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["palin-dispatch", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_absent_flags_do_not_override() {
        let cli = Cli::try_parse_from(["palin-dispatch", "-s", "3"]).unwrap();
        let merged = toml::to_string(&cli.overrides()).unwrap();
        assert_eq!(merged.trim(), "concurrency = 3");
    }

    #[test]
    fn test_overrides_beat_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "total_jobs = 7\nconcurrency = 4\n").unwrap();

        let cli = Cli::try_parse_from(["palin-dispatch", "-s", "1"]).unwrap();
        let config = DispatchConfig::load(Some(&path), Some(&cli.overrides())).unwrap();
        assert_eq!(config.total_jobs, 7);
        assert_eq!(config.concurrency, 1);
    }
}
