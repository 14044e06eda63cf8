//! Configuration management for palin-dispatch
//!
//! Settings are layered with figment (see [`core`]): built-in defaults, user
//! and repository config files, an explicit `--config` file, `PALIN_*`
//! environment variables, then command-line flags.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::shared::NANOS_PER_SEC;

pub mod core;

/// Hard ceiling on simultaneously running workers
pub const MAX_WORKERS: usize = 20;

/// Default ceiling on the size of a workspace
pub const DEFAULT_MAX_WORKSPACE_BYTES: usize = 16 * 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum number of workers ever dispatched
    pub total_jobs: usize,

    /// Maximum number of workers running at once
    pub concurrency: usize,

    /// Wall-clock seconds before the run is cancelled
    pub max_runtime: u64,

    /// Newline-separated list of items
    pub input: PathBuf,

    /// Upper bound for a workspace, header included
    pub max_workspace_bytes: usize,

    pub output: OutputConfig,
    pub clock: ClockConfig,
    pub worker: WorkerConfig,
    pub shutdown: ShutdownConfig,
}

/// Where the journal and the result sinks are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub journal: PathBuf,
    pub palindromes: PathBuf,
    pub others: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Virtual nanoseconds added per scheduler iteration
    pub tick_nanos: u64,
}

/// Pacing of a worker's critical-section work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Upper bound of the random delay before classification
    pub think_max_ms: u64,

    /// Delay held inside the sink lock, before and after the write
    pub hold_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long draining waits for voluntary exits before aborting workers
    pub grace_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            total_jobs: 4,
            concurrency: 2,
            max_runtime: 100,
            input: PathBuf::from("infile.txt"),
            max_workspace_bytes: DEFAULT_MAX_WORKSPACE_BYTES,
            output: OutputConfig::default(),
            clock: ClockConfig::default(),
            worker: WorkerConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            journal: PathBuf::from("output.log"),
            palindromes: PathBuf::from("palin.out"),
            others: PathBuf::from("nopalin.out"),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { tick_nanos: 100 }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            think_max_ms: 2000,
            hold_ms: 2000,
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_ms: 1000 }
    }
}

impl WorkerConfig {
    /// Delays that skip all sleeping, for tests and benchmarks
    pub fn immediate() -> Self {
        Self {
            think_max_ms: 0,
            hold_ms: 0,
        }
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }
}

impl DispatchConfig {
    pub fn max_runtime(&self) -> Duration {
        Duration::from_secs(self.max_runtime)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown.grace_ms)
    }

    /// Number of items that will actually be dispatched for `item_count` items
    pub fn dispatch_target(&self, item_count: usize) -> usize {
        self.total_jobs.min(item_count)
    }

    /// Check invariants and clamp values that have a hard limit
    pub fn validate(mut self) -> Result<Self> {
        if self.clock.tick_nanos == 0 {
            anyhow::bail!("clock.tick_nanos cannot be 0");
        }
        if self.clock.tick_nanos >= u64::from(NANOS_PER_SEC) {
            anyhow::bail!(
                "clock.tick_nanos must be below {NANOS_PER_SEC}, got {}",
                self.clock.tick_nanos
            );
        }
        if self.max_workspace_bytes == 0 {
            anyhow::bail!("max_workspace_bytes cannot be 0");
        }
        if self.concurrency > MAX_WORKERS {
            tracing::warn!(
                "Concurrency {} exceeds the limit of {MAX_WORKERS}, clamping",
                self.concurrency
            );
            self.concurrency = MAX_WORKERS;
        }
        if self.concurrency == 0 {
            tracing::warn!("Concurrency is 0: no worker will be dispatched");
        }
        Ok(self)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
