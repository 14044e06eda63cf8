//! Styled terminal output for palin-dispatch
//!
//! Status lines go to stdout, errors to stderr. Quiet mode keeps only
//! errors; verbose mode adds dimmed detail lines.

use console::style;

use crate::config::DispatchConfig;
use crate::parallel::{RunOutcome, RunReport};

/// Output handler for consistent CLI formatting
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✔").green(), message);
        }
    }

    /// Errors are shown even in quiet mode
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✖").red(), message);
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    /// Only printed with `-v`
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{} {}", style("ℹ").dim(), style(message).dim());
        }
    }

    pub fn header(&self, title: &str) {
        if !self.quiet {
            println!("\n{}", style(title).bold().underlined());
        }
    }

    pub fn key_value(&self, key: &str, value: &str, highlight: bool) {
        if !self.quiet {
            let styled_value = if highlight {
                style(value).green().bold()
            } else {
                style(value).white()
            };
            println!("  {:<18} {}", style(key).dim(), styled_value);
        }
    }

    /// One line per settings value that shapes the run
    pub fn run_plan(&self, config: &DispatchConfig) {
        self.verbose(&format!(
            "Dispatching up to {} jobs from {}, {} at a time, {} s limit",
            config.total_jobs,
            config.input.display(),
            config.concurrency,
            config.max_runtime
        ));
        self.verbose(&format!(
            "Journal {}, palindromes {}, others {}",
            config.output.journal.display(),
            config.output.palindromes.display(),
            config.output.others.display()
        ));
    }

    /// Final summary of a finished run
    pub fn run_summary(&self, config: &DispatchConfig, report: &RunReport) {
        match report.outcome {
            RunOutcome::Completed => self.success(&format!(
                "Classified {} of {} items",
                report.counters.terminated - report.failed_workers(),
                report.item_count
            )),
            RunOutcome::Cancelled(reason) => self.warning(&format!(
                "Run cancelled ({reason}) after {} of {} workers finished",
                report.counters.terminated, report.counters.started
            )),
        }

        if self.quiet {
            return;
        }

        self.header("Dispatch summary");
        self.key_value("Run key", &report.key.to_string(), false);
        self.key_value("Items loaded", &report.item_count.to_string(), false);
        self.key_value("Workers started", &report.counters.started.to_string(), false);
        self.key_value("Peak running", &report.peak_running.to_string(), false);
        let failed = report.failed_workers();
        self.key_value("Failed workers", &failed.to_string(), failed == 0);
        self.key_value("Virtual time", &report.final_clock.to_string(), false);
        self.key_value("Journal", &config.output.journal.display().to_string(), false);

        if self.verbose {
            for exit in report.exits.iter().filter(|exit| !exit.status.success()) {
                self.verbose(&format!(
                    "worker {} (index {}) {}",
                    exit.id, exit.index, exit.status
                ));
            }
        }

        if report.lingering_attachments > 0 {
            self.warning(&format!(
                "{} attachments were still open at teardown",
                report.lingering_attachments
            ));
        }
    }
}
