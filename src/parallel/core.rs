use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::Instant;

use super::cancel::{CancelHandle, CancelReason, Cancellation, SIGABRT, SIGTERM};
use super::table::{ExitStatus, WorkerExit, WorkerRecord, WorkerTable};
use crate::config::{DispatchConfig, MAX_WORKERS};
use crate::shared::{
    Journal, LockSet, LockSetHandle, Namespace, ResultSink, SharedError, SinkKind, Timeline,
    VirtualClock, WorkspaceHandle, WorkspaceKey,
};
use crate::worker::{Classifier, Palindrome, Verdict, Worker, WorkerError, WorkerId};
use crate::worklist::{WorkList, WorkListError};

/// Exit status of a run that cancelled before completing
pub const EXIT_CANCELLED: i32 = 2;

type WorkerOutput = Result<Verdict, WorkerError>;

/// Failures that abort a run before scheduling starts
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("cannot read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: WorkListError,
    },

    #[error("input {0} contains no items")]
    EmptyInput(PathBuf),

    #[error("cannot create {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Shared(#[from] SharedError),
}

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    Draining,
    Terminated,
}

/// Coordinator-local counters.
///
/// `running == started - terminated` holds at every observation point.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub started: usize,
    pub running: usize,
    pub terminated: usize,
}

impl Counters {
    fn dispatched(&mut self) {
        self.started += 1;
        self.running += 1;
    }

    fn reaped(&mut self) {
        self.running -= 1;
        self.terminated += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every dispatchable item was processed
    Completed,
    Cancelled(CancelReason),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::Cancelled(_) => EXIT_CANCELLED,
        }
    }
}

/// What happened during a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub key: WorkspaceKey,
    pub outcome: RunOutcome,
    pub item_count: usize,
    pub counters: Counters,
    /// Highest number of simultaneously running workers
    pub peak_running: usize,
    /// Indices in dispatch order
    pub dispatched: Vec<usize>,
    /// Workers in reap order
    pub exits: Vec<WorkerExit>,
    pub final_clock: VirtualClock,
    /// Views still attached when the shared resources were destroyed
    pub lingering_attachments: usize,
}

impl RunReport {
    pub fn failed_workers(&self) -> usize {
        self.exits.iter().filter(|exit| !exit.status.success()).count()
    }
}

/// Workspace and lock set owned for the duration of a run
struct SharedResources {
    workspace: WorkspaceHandle,
    locks: LockSetHandle,
}

impl SharedResources {
    fn destroy(self) -> usize {
        self.locks.destroy() + self.workspace.destroy()
    }
}

/// Mutable state of the scheduling loop
struct Scheduler {
    gate: Arc<Semaphore>,
    tasks: JoinSet<WorkerOutput>,
    table: WorkerTable,
    counters: Counters,
    peak_running: usize,
    next_index: usize,
    next_id: u32,
    dispatched: Vec<usize>,
    exits: Vec<WorkerExit>,
    cancelled: Option<CancelReason>,
}

enum Event {
    Cancelled(CancelReason),
    Exited(Result<(task::Id, WorkerOutput), JoinError>),
    Slot(OwnedSemaphorePermit),
}

/// Owns the shared resources of a run and schedules its workers
pub struct Coordinator {
    config: DispatchConfig,
    namespace: Namespace,
    key: WorkspaceKey,
    classifier: Arc<dyn Classifier>,
    cancel: CancelHandle,
    cancellation: Cancellation,
    phase: Phase,
}

impl Coordinator {
    /// Concurrency above [`MAX_WORKERS`] is clamped, as in
    /// [`DispatchConfig::validate`]
    pub fn new(mut config: DispatchConfig) -> Self {
        if config.concurrency > MAX_WORKERS {
            tracing::warn!(
                "Concurrency {} exceeds the limit of {MAX_WORKERS}, clamping",
                config.concurrency
            );
            config.concurrency = MAX_WORKERS;
        }
        let namespace = Namespace::new(config.max_workspace_bytes);
        let (cancel, cancellation) = Cancellation::channel();
        Self {
            config,
            namespace,
            key: WorkspaceKey::generate(),
            classifier: Arc::new(Palindrome),
            cancel,
            cancellation,
            phase: Phase::Initializing,
        }
    }

    /// Share an existing namespace instead of a private one
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn key(&self) -> WorkspaceKey {
        self.key
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Handle that external sources use to cancel the run
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run to completion or cancellation, tearing everything down once
    pub async fn run(mut self) -> Result<RunReport, SetupError> {
        let timer = self.cancel.arm_timeout(self.config.max_runtime());

        let result = match self.initialize().await {
            Ok(shared) => {
                let scheduler = self.schedule(&shared).await;
                Ok(self.teardown(shared, scheduler).await)
            }
            Err(e) => {
                tracing::error!("Setup failed: {e}");
                Err(e)
            }
        };

        timer.abort();
        result
    }

    fn enter(&mut self, phase: Phase) {
        tracing::info!("Coordinator {:?} -> {phase:?}", self.phase);
        self.phase = phase;
    }

    async fn initialize(&self) -> Result<SharedResources, SetupError> {
        let input = &self.config.input;
        let items = File::open(input)
            .map_err(WorkListError::from)
            .and_then(|file| WorkList::load(BufReader::new(file)))
            .map_err(|source| SetupError::Input {
                path: input.clone(),
                source,
            })?;
        if items.is_empty() {
            return Err(SetupError::EmptyInput(input.clone()));
        }
        let item_count = items.len();

        let workspace = self.namespace.create_workspace(self.key, items)?;
        tracing::debug!(
            "Workspace {} holds {item_count} items in {} bytes",
            self.key,
            workspace.size_bytes()
        );

        let locks = match self.create_lock_set() {
            Ok(locks) => locks,
            Err(e) => {
                workspace.destroy();
                return Err(e);
            }
        };

        locks
            .log(format!("coordinator loaded {item_count} items"))
            .await;

        Ok(SharedResources { workspace, locks })
    }

    fn create_lock_set(&self) -> Result<LockSetHandle, SetupError> {
        let output = &self.config.output;
        let journal = Journal::create(&output.journal).map_err(|source| SetupError::Output {
            path: output.journal.clone(),
            source,
        })?;
        let sink = |kind, path: &PathBuf| {
            ResultSink::create(kind, path).map_err(|source| SetupError::Output {
                path: path.clone(),
                source,
            })
        };
        let palindromes = sink(SinkKind::Palindrome, &output.palindromes)?;
        let others = sink(SinkKind::NonPalindrome, &output.others)?;

        let locks = LockSet::new(Timeline::new(journal), palindromes, others);
        Ok(self.namespace.create_lock_set(self.key, locks)?)
    }

    async fn schedule(&mut self, shared: &SharedResources) -> Scheduler {
        self.enter(Phase::Running);

        let locks: &LockSet = &shared.locks;
        let item_count = shared.workspace.item_count();
        let target = self.config.dispatch_target(item_count);
        let tick = self.config.clock.tick_nanos;
        let mut scheduler = Scheduler {
            gate: Arc::new(Semaphore::new(self.config.concurrency)),
            tasks: JoinSet::new(),
            table: WorkerTable::with_capacity(MAX_WORKERS),
            counters: Counters::default(),
            peak_running: 0,
            next_index: 0,
            next_id: 1,
            dispatched: Vec::with_capacity(target),
            exits: Vec::with_capacity(target),
            cancelled: None,
        };

        scheduler.cancelled = loop {
            if scheduler.counters.terminated >= target {
                break None;
            }
            if let Some(reason) = self.cancellation.reason() {
                break Some(reason);
            }

            let can_dispatch = scheduler.next_index < item_count
                && scheduler.counters.started < self.config.total_jobs;
            let gate = scheduler.gate.clone();

            // Suspends until a slot frees, a worker exits or the run is cancelled
            let event = tokio::select! {
                biased;
                reason = self.cancellation.cancelled() => Event::Cancelled(reason),
                Some(joined) = scheduler.tasks.join_next_with_id(), if !scheduler.tasks.is_empty() => {
                    Event::Exited(joined)
                }
                Ok(permit) = gate.acquire_owned(), if can_dispatch => Event::Slot(permit),
            };

            match event {
                Event::Cancelled(reason) => break Some(reason),
                Event::Exited(joined) => self.reap(&mut scheduler, locks, joined).await,
                Event::Slot(permit) => self.dispatch(&mut scheduler, shared, permit).await,
            }

            // Reap everything else that has already finished
            while let Some(joined) = scheduler.tasks.try_join_next_with_id() {
                self.reap(&mut scheduler, locks, joined).await;
            }

            locks.tick(tick).await;
        };

        if let Some(reason) = scheduler.cancelled {
            locks
                .log(format!("signal {} received ({reason})", reason.signal()))
                .await;
        }
        self.drain(&mut scheduler, locks).await;
        scheduler
    }

    /// Start a worker for the lowest unassigned index
    async fn dispatch(
        &self,
        scheduler: &mut Scheduler,
        shared: &SharedResources,
        permit: OwnedSemaphorePermit,
    ) {
        let locks: &LockSet = &shared.locks;
        if !scheduler.table.has_free_slot() {
            // The permit goes straight back to the gate
            drop(permit);
            tracing::warn!("Worker table full, dispatch deferred");
            locks.log("worker table full, dispatch deferred").await;
            return;
        }

        let index = scheduler.next_index;
        let id = WorkerId(scheduler.next_id);
        let item = shared.workspace.scan_item(index).unwrap_or_default();
        locks
            .log(format!("started worker {id} {index} for {item}"))
            .await;

        let worker = Worker::new(
            id,
            index,
            self.key,
            self.namespace.clone(),
            self.classifier.clone(),
            self.config.worker.clone(),
        );
        let handle = scheduler.tasks.spawn(worker.run());
        let record = WorkerRecord::new(id, index, handle.id(), permit);
        if scheduler.table.insert(record).is_err() {
            // Unreachable: a free slot was checked above and nothing ran since
            handle.abort();
            return;
        }

        scheduler.next_index += 1;
        scheduler.next_id += 1;
        scheduler.dispatched.push(index);
        scheduler.counters.dispatched();
        scheduler.peak_running = scheduler.peak_running.max(scheduler.counters.running);
        self.check_invariants(scheduler);
        tracing::debug!("Dispatched worker {id} for index {index}");
    }

    /// Record the termination of one worker
    async fn reap(
        &self,
        scheduler: &mut Scheduler,
        locks: &LockSet,
        joined: Result<(task::Id, WorkerOutput), JoinError>,
    ) {
        let (task, status) = match joined {
            Ok((task, Ok(_))) => (task, ExitStatus::Code(0)),
            Ok((task, Err(e))) => {
                tracing::warn!("Worker failed: {e}");
                (task, ExitStatus::Code(e.exit_code()))
            }
            Err(e) if e.is_cancelled() => (e.id(), ExitStatus::Killed(SIGTERM)),
            Err(e) => {
                tracing::error!("Worker panicked: {e}");
                (e.id(), ExitStatus::Killed(SIGABRT))
            }
        };

        let Some(exit) = scheduler.table.reap(task, status) else {
            tracing::warn!("Reaped unknown task {task}");
            return;
        };

        scheduler.counters.reaped();
        scheduler.exits.push(exit);
        self.check_invariants(scheduler);
        locks.log(format!("worker {} {status}", exit.id)).await;
    }

    /// Wait for voluntary exits, then abort the rest and block until they end
    async fn drain(&mut self, scheduler: &mut Scheduler, locks: &LockSet) {
        if scheduler.tasks.is_empty() {
            return;
        }
        self.enter(Phase::Draining);

        let deadline = Instant::now() + self.config.shutdown_grace();
        loop {
            let joined =
                match tokio::time::timeout_at(deadline, scheduler.tasks.join_next_with_id()).await {
                    Ok(Some(joined)) => joined,
                    Ok(None) | Err(_) => break,
                };
            self.reap(scheduler, locks, joined).await;
        }

        if !scheduler.tasks.is_empty() {
            tracing::info!("Terminating {} running workers", scheduler.tasks.len());
            locks
                .log(format!("terminating {} running workers", scheduler.tasks.len()))
                .await;
            scheduler.tasks.abort_all();
            while let Some(joined) = scheduler.tasks.join_next_with_id().await {
                self.reap(scheduler, locks, joined).await;
            }
        }
    }

    async fn teardown(&mut self, shared: SharedResources, mut scheduler: Scheduler) -> RunReport {
        self.enter(Phase::Terminated);

        let final_clock = {
            let mut timeline = shared.locks.lock_timeline().await;
            timeline.log("coordinator exit");
            timeline.now()
        };

        scheduler.table.clear();
        let item_count = shared.workspace.item_count();
        let lingering_attachments = shared.destroy();
        if lingering_attachments > 0 {
            tracing::warn!("{lingering_attachments} views still attached at teardown");
        }

        let outcome = match scheduler.cancelled {
            Some(reason) => RunOutcome::Cancelled(reason),
            None => RunOutcome::Completed,
        };
        tracing::info!(
            "Run {:?}: {} started, {} terminated",
            outcome,
            scheduler.counters.started,
            scheduler.counters.terminated
        );

        RunReport {
            key: self.key,
            outcome,
            item_count,
            counters: scheduler.counters,
            peak_running: scheduler.peak_running,
            dispatched: scheduler.dispatched,
            exits: scheduler.exits,
            final_clock,
            lingering_attachments,
        }
    }

    fn check_invariants(&self, scheduler: &Scheduler) {
        let counters = scheduler.counters;
        debug_assert_eq!(counters.running, counters.started - counters.terminated);
        debug_assert!(counters.running <= self.config.concurrency);
        debug_assert!(counters.started <= self.config.total_jobs);
        debug_assert_eq!(counters.running, scheduler.table.running());
    }
}
