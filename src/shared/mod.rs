//! Shared workspace and lock set
//!
//! A [`Namespace`] plays the part of the host's IPC tables: it maps a
//! [`WorkspaceKey`] to a live workspace and a live lock set. The coordinator
//! creates both and receives owner handles; workers only ever attach by key.
//!
//! ```text
//! ┌──────────────┐ create   ┌───────────────────────────┐  attach  ┌──────────┐
//! │ Coordinator  │─────────▶│ Namespace                 │◀─────────│ Worker N │
//! │ (Owner<T>)   │ destroy  │  key → Workspace          │  detach  │ (View<T>)│
//! └──────────────┘          │  key → LockSet            │          └──────────┘
//!                           └───────────────────────────┘
//! ```
//!
//! Owner handles are consumed by `destroy`, so teardown happens once. A
//! handle dropped without `destroy` still removes its entry.

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

mod clock;
mod journal;
mod locks;
mod sink;
mod workspace;

pub use clock::{NANOS_PER_SEC, VirtualClock};
pub use journal::Journal;
pub use locks::{LockSet, Resource, Timeline};
pub use sink::{ResultSink, SinkKind};
pub use workspace::{HEADER_BYTES, Workspace};

use crate::worklist::WorkList;

/// Unique key of one run's shared resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkspaceKey(Uuid);

impl WorkspaceKey {
    /// Fresh random key, so concurrent runs never collide
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WorkspaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Errors from creating or attaching shared resources
#[derive(Debug, thiserror::Error)]
pub enum SharedError {
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: WorkspaceKey },

    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: WorkspaceKey },

    #[error("workspace needs {needed} bytes but at most {limit} may be reserved")]
    NoSpace { needed: usize, limit: usize },
}

/// A shared value plus the number of views attached to it
#[derive(Debug)]
struct Segment<T> {
    value: T,
    attached: AtomicUsize,
}

/// One keyed table of live segments
#[derive(Debug)]
struct Table<T> {
    kind: &'static str,
    entries: Mutex<HashMap<WorkspaceKey, Arc<Segment<T>>>>,
}

impl<T> Table<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<WorkspaceKey, Arc<Segment<T>>>> {
        // A poisoned table still holds consistent entries: every mutation is a
        // single insert or remove.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn create(self: &Arc<Self>, key: WorkspaceKey, value: T) -> Result<Owner<T>, SharedError> {
        let mut entries = self.entries();
        if entries.contains_key(&key) {
            return Err(SharedError::AlreadyExists { kind: self.kind, key });
        }
        let segment = Arc::new(Segment {
            value,
            attached: AtomicUsize::new(0),
        });
        entries.insert(key, segment.clone());
        tracing::debug!("Created {} {key}", self.kind);

        Ok(Owner {
            table: self.clone(),
            key,
            segment,
            released: false,
        })
    }

    fn attach(&self, key: WorkspaceKey) -> Result<View<T>, SharedError> {
        // Count the attachment while the table is locked so a concurrent
        // destroy observes it.
        let entries = self.entries();
        let segment = entries
            .get(&key)
            .cloned()
            .ok_or(SharedError::NotFound { kind: self.kind, key })?;
        segment.attached.fetch_add(1, Ordering::AcqRel);
        Ok(View { segment })
    }

    fn contains(&self, key: WorkspaceKey) -> bool {
        self.entries().contains_key(&key)
    }
}

/// Owning handle held by the coordinator
#[derive(Debug)]
pub struct Owner<T> {
    table: Arc<Table<T>>,
    key: WorkspaceKey,
    segment: Arc<Segment<T>>,
    released: bool,
}

impl<T> Owner<T> {
    pub fn key(&self) -> WorkspaceKey {
        self.key
    }

    /// Views currently attached
    pub fn attached(&self) -> usize {
        self.segment.attached.load(Ordering::Acquire)
    }

    /// Remove the segment from the namespace.
    ///
    /// Returns the number of views still attached at that moment; views keep
    /// their data alive, but no new attach can succeed.
    pub fn destroy(mut self) -> usize {
        self.release()
    }

    fn release(&mut self) -> usize {
        if self.released {
            return 0;
        }
        self.released = true;
        let mut entries = self.table.entries();
        entries.remove(&self.key);
        let lingering = self.attached();
        drop(entries);
        tracing::debug!("Destroyed {} {}", self.table.kind, self.key);
        lingering
    }
}

impl<T> Deref for Owner<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.segment.value
    }
}

impl<T> Drop for Owner<T> {
    fn drop(&mut self) {
        if !self.released {
            let lingering = self.release();
            tracing::warn!(
                "{} {} dropped without destroy ({lingering} still attached)",
                self.table.kind,
                self.key
            );
        }
    }
}

/// Attachment held by a worker; dropping it detaches
#[derive(Debug)]
pub struct View<T> {
    segment: Arc<Segment<T>>,
}

impl<T> View<T> {
    /// Explicit detach, same as dropping the view
    pub fn detach(self) {}
}

impl<T> Deref for View<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.segment.value
    }
}

impl<T> Drop for View<T> {
    fn drop(&mut self) {
        self.segment.attached.fetch_sub(1, Ordering::AcqRel);
    }
}

pub type WorkspaceHandle = Owner<Workspace>;
pub type WorkspaceView = View<Workspace>;
pub type LockSetHandle = Owner<LockSet>;
pub type LockSetView = View<LockSet>;

#[derive(Debug)]
struct NamespaceInner {
    workspaces: Arc<Table<Workspace>>,
    lock_sets: Arc<Table<LockSet>>,
    max_workspace_bytes: usize,
}

/// Registry of live workspaces and lock sets, shared by coordinator and workers
#[derive(Debug, Clone)]
pub struct Namespace {
    inner: Arc<NamespaceInner>,
}

impl Namespace {
    pub fn new(max_workspace_bytes: usize) -> Self {
        Self {
            inner: Arc::new(NamespaceInner {
                workspaces: Arc::new(Table::new("workspace")),
                lock_sets: Arc::new(Table::new("lock set")),
                max_workspace_bytes,
            }),
        }
    }

    /// Publish `items` under `key`, sized from the serialized list
    pub fn create_workspace(
        &self,
        key: WorkspaceKey,
        items: WorkList,
    ) -> Result<WorkspaceHandle, SharedError> {
        let needed = Workspace::size_for(&items);
        let limit = self.inner.max_workspace_bytes;
        if needed > limit {
            return Err(SharedError::NoSpace { needed, limit });
        }
        self.inner.workspaces.create(key, Workspace::new(items))
    }

    pub fn attach_workspace(&self, key: WorkspaceKey) -> Result<WorkspaceView, SharedError> {
        self.inner.workspaces.attach(key)
    }

    pub fn create_lock_set(
        &self,
        key: WorkspaceKey,
        locks: LockSet,
    ) -> Result<LockSetHandle, SharedError> {
        self.inner.lock_sets.create(key, locks)
    }

    pub fn attach_lock_set(&self, key: WorkspaceKey) -> Result<LockSetView, SharedError> {
        self.inner.lock_sets.attach(key)
    }

    /// Whether either resource of `key` is still registered
    pub fn is_live(&self, key: WorkspaceKey) -> bool {
        self.inner.workspaces.contains(key) || self.inner.lock_sets.contains(key)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_WORKSPACE_BYTES)
    }
}
