//! Bounded-concurrency scheduling of workers
//!
//! The coordinator owns the run: it publishes the work list, spawns workers
//! up to the concurrency cap, reaps them as they exit, advances the virtual
//! clock and tears the shared resources down exactly once.
//!
//! # Lifecycle
//!
//! ```text
//! Initializing ──▶ Running ──▶ Draining ──▶ Terminated
//!   create           dispatch     grace wait     journal exit
//!   workspace,       reap         abort rest     destroy lock set
//!   sinks, locks     tick clock   reap all       destroy workspace
//! ```
//!
//! # Capacity gate
//!
//! Each dispatch acquires a permit from a semaphore sized to the concurrency
//! cap. The permit is stored in the worker's record and returned when the
//! worker is reaped, so the gate, the worker table and the counters always
//! agree. When no permit is available the loop suspends on the next event
//! (worker exit, free permit, cancellation) instead of polling.
//!
//! # Cancellation
//!
//! A [`CancelHandle`] may be triggered by the runtime timer, by SIGINT or
//! SIGTERM, or by the caller. The loop observes it at the top of every
//! iteration and while suspended. Running workers first get the shutdown
//! grace period to finish on their own; the rest are aborted and awaited
//! before any shared resource is destroyed.
//!
//! # Example
//!
//! ```rust,no_run
//! use palin_dispatch::config::DispatchConfig;
//! use palin_dispatch::parallel::Coordinator;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = DispatchConfig::default();
//! let coordinator = Coordinator::new(config);
//! let _signals = coordinator.cancel_handle().listen_for_signals();
//!
//! let report = coordinator.run().await?;
//! println!("{} workers terminated", report.counters.terminated);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod core;
pub mod table;

pub use cancel::{CancelHandle, CancelReason, Cancellation};
pub use core::{Coordinator, Counters, EXIT_CANCELLED, Phase, RunOutcome, RunReport, SetupError};
pub use table::{ExitStatus, WorkerExit, WorkerRecord, WorkerStatus, WorkerTable};
