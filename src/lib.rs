//! # palin-dispatch
//!
//! Bounded-concurrency dispatcher that classifies a list of items as
//! palindromes or not, with every worker coordinating only through a keyed
//! shared workspace, three locks and two append-only result files.
//!
//! ## Features
//!
//! - **Bounded scheduling**: at most `concurrency` workers run at once and at
//!   most `total_jobs` are ever dispatched, lowest index first
//! - **Lock-protected sinks**: each result file has its own lock, so lines
//!   never interleave
//! - **Virtual clock journal**: every event is stamped `[seconds:nanos]` and
//!   the stamps never go backwards
//! - **Clean shutdown**: timeout, SIGINT and SIGTERM drain the workers before
//!   the shared resources are destroyed
//!
//! ## Quick Start
//!
//! ```bash
//! # Classify infile.txt with the defaults (4 jobs, 2 at a time, 100 s limit)
//! palin-dispatch
//!
//! # Ten jobs, five at a time, give up after 30 seconds
//! palin-dispatch -n 10 -s 5 -t 30 words.txt
//! ```

pub mod cli;
pub mod config;
pub mod parallel;
pub mod shared;
pub mod worker;
pub mod worklist;

pub use cli::{Cli, Output};
pub use config::DispatchConfig;

/// Result type alias for application-level operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
