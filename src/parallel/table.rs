use std::fmt;

use tokio::sync::OwnedSemaphorePermit;
use tokio::task;

use crate::worker::WorkerId;

/// How a worker ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Ran to completion with this exit code
    Code(i32),
    /// Ended abnormally: aborted by the coordinator or panicked
    Killed(i32),
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Code(0))
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Code(code) => write!(f, "terminated with exit code {code}"),
            ExitStatus::Killed(signal) => write!(f, "killed (signal {signal})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Running,
    Terminated(ExitStatus),
}

/// Coordinator-side bookkeeping for one spawned worker
#[derive(Debug)]
pub struct WorkerRecord {
    pub id: WorkerId,
    pub index: usize,
    pub task: task::Id,
    pub status: WorkerStatus,
    /// Concurrency slot, returned when the worker is reaped
    permit: Option<OwnedSemaphorePermit>,
}

impl WorkerRecord {
    pub fn new(id: WorkerId, index: usize, task: task::Id, permit: OwnedSemaphorePermit) -> Self {
        Self {
            id,
            index,
            task,
            status: WorkerStatus::Running,
            permit: Some(permit),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == WorkerStatus::Running
    }
}

/// Summary of a reaped worker, kept for the run report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub id: WorkerId,
    pub index: usize,
    pub status: ExitStatus,
}

/// Fixed-capacity table of worker records.
///
/// A slot is free when empty or when its record has terminated, so the
/// capacity bounds the number of running workers, not the total spawned.
#[derive(Debug)]
pub struct WorkerTable {
    slots: Vec<Option<WorkerRecord>>,
}

impl WorkerTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn running(&self) -> usize {
        self.records().filter(|record| record.is_running()).count()
    }

    pub fn has_free_slot(&self) -> bool {
        self.free_slot().is_some()
    }

    /// Store a record; hands it back when every slot holds a running worker
    pub fn insert(&mut self, record: WorkerRecord) -> Result<(), WorkerRecord> {
        match self.free_slot() {
            Some(slot) => {
                self.slots[slot] = Some(record);
                Ok(())
            }
            None => Err(record),
        }
    }

    /// Mark the worker running as `task` terminated and return its
    /// concurrency slot to the gate
    pub fn reap(&mut self, task: task::Id, status: ExitStatus) -> Option<WorkerExit> {
        let record = self
            .slots
            .iter_mut()
            .flatten()
            .find(|record| record.task == task && record.is_running())?;

        record.status = WorkerStatus::Terminated(status);
        record.permit = None;
        Some(WorkerExit {
            id: record.id,
            index: record.index,
            status,
        })
    }

    /// Drop every record, releasing any permit still held
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }

    pub fn records(&self) -> impl Iterator<Item = &WorkerRecord> {
        self.slots.iter().flatten()
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_none_or(|record| !record.is_running()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    async fn spawn_id() -> task::Id {
        tokio::spawn(async {}).id()
    }

    #[tokio::test]
    async fn test_reap_returns_permit_and_frees_slot() {
        let gate = Arc::new(Semaphore::new(1));
        let mut table = WorkerTable::with_capacity(1);

        let task = spawn_id().await;
        let permit = gate.clone().try_acquire_owned().unwrap();
        table.insert(WorkerRecord::new(WorkerId(1), 0, task, permit)).unwrap();

        assert_eq!(gate.available_permits(), 0);
        assert!(!table.has_free_slot());

        let exit = table.reap(task, ExitStatus::Code(0)).unwrap();
        assert_eq!(exit.id, WorkerId(1));
        assert_eq!(gate.available_permits(), 1);
        assert!(table.has_free_slot());
        assert_eq!(table.running(), 0);

        // Reaping twice is a no-op
        assert!(table.reap(task, ExitStatus::Code(0)).is_none());
    }

    #[tokio::test]
    async fn test_full_table_rejects_insert() {
        let gate = Arc::new(Semaphore::new(2));
        let mut table = WorkerTable::with_capacity(1);

        let first = gate.clone().try_acquire_owned().unwrap();
        table
            .insert(WorkerRecord::new(WorkerId(1), 0, spawn_id().await, first))
            .unwrap();

        let second = gate.clone().try_acquire_owned().unwrap();
        let rejected = table.insert(WorkerRecord::new(WorkerId(2), 1, spawn_id().await, second));
        assert!(rejected.is_err());

        drop(rejected);
        table.clear();
        assert_eq!(gate.available_permits(), 2);
    }

    #[test]
    fn test_exit_status_display() {
        assert_eq!(ExitStatus::Code(0).to_string(), "terminated with exit code 0");
        assert_eq!(ExitStatus::Killed(15).to_string(), "killed (signal 15)");
        assert!(ExitStatus::Code(0).success());
        assert!(!ExitStatus::Code(1).success());
        assert!(!ExitStatus::Killed(6).success());
    }
}
