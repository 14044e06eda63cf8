//! Worker task: classify one item and record it in the matching sink
//!
//! A worker knows only the namespace, the workspace key and its assigned
//! index. It attaches to the workspace and lock set (it never creates them),
//! resolves its item, classifies it, and appends it to a sink while holding
//! that sink's lock. Other workers are invisible to it.

use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

mod classify;

pub use classify::{Classifier, Palindrome, Verdict};

use crate::config::WorkerConfig;
use crate::shared::{LockSet, Namespace, SharedError, SinkKind, WorkspaceKey};

/// Exit code of a worker that finished its item
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code of a worker that could not do its job
pub const EXIT_FAILURE: i32 = 1;

/// Identifier the coordinator assigns to each spawned worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fatal worker errors; each ends the worker with [`EXIT_FAILURE`]
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("cannot attach shared resources: {0}")]
    Attach(#[from] SharedError),

    #[error("no item at index {0}")]
    ItemNotFound(usize),
}

impl WorkerError {
    pub fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }
}

/// Everything a worker is given at spawn time
#[derive(Clone)]
pub struct Worker {
    id: WorkerId,
    index: usize,
    key: WorkspaceKey,
    namespace: Namespace,
    classifier: Arc<dyn Classifier>,
    pacing: WorkerConfig,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl Worker {
    pub fn new(
        id: WorkerId,
        index: usize,
        key: WorkspaceKey,
        namespace: Namespace,
        classifier: Arc<dyn Classifier>,
        pacing: WorkerConfig,
    ) -> Self {
        Self {
            id,
            index,
            key,
            namespace,
            classifier,
            pacing,
        }
    }

    /// Run to completion, returning the verdict that was recorded
    pub async fn run(self) -> Result<Verdict, WorkerError> {
        let workspace = self.namespace.attach_workspace(self.key)?;
        let locks = self.namespace.attach_lock_set(self.key)?;

        let item = workspace
            .item(self.index)
            .ok_or(WorkerError::ItemNotFound(self.index))?;
        tracing::debug!("Worker {} picked up item {} ({item:?})", self.id, self.index);

        self.think().await;

        locks
            .log(format!("worker {} before critical section", self.id))
            .await;

        let verdict = self.classifier.classify(item);
        self.save(&locks, verdict.sink(), item).await;

        locks
            .log(format!("worker {} after critical section", self.id))
            .await;

        locks.detach();
        workspace.detach();
        tracing::debug!("Worker {} finished with {verdict:?}", self.id);
        Ok(verdict)
    }

    /// Append `item` to its sink while holding that sink's lock.
    ///
    /// Write failures are reported but never fail the worker.
    async fn save(&self, locks: &LockSet, kind: SinkKind, item: &str) {
        let mut sink = locks.lock_sink(kind).await;
        pause(self.pacing.hold()).await;
        let written = sink.append(item);
        pause(self.pacing.hold()).await;
        let path = sink.path().display().to_string();
        drop(sink);

        if let Err(e) = written {
            tracing::warn!("Worker {} failed to write {path}: {e}", self.id);
            locks
                .log(format!("worker {} failed to write {path}: {e}", self.id))
                .await;
        }
    }

    async fn think(&self) {
        let max = self.pacing.think_max_ms;
        if max == 0 {
            return;
        }
        let delay = rand::rng().random_range(0..=max);
        pause(Duration::from_millis(delay)).await;
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
