use std::fmt;

use tokio::sync::{Mutex, MutexGuard};

use super::clock::VirtualClock;
use super::journal::Journal;
use super::sink::{ResultSink, SinkKind};

/// The three independently lockable shared resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Workspace,
    SinkA,
    SinkB,
}

impl From<SinkKind> for Resource {
    fn from(kind: SinkKind) -> Self {
        match kind {
            SinkKind::Palindrome => Resource::SinkA,
            SinkKind::NonPalindrome => Resource::SinkB,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Workspace => "workspace",
            Resource::SinkA => "sink-a",
            Resource::SinkB => "sink-b",
        };
        f.write_str(name)
    }
}

/// State behind the workspace lock: the virtual clock and the journal
#[derive(Debug)]
pub struct Timeline {
    clock: VirtualClock,
    journal: Journal,
}

impl Timeline {
    pub fn new(journal: Journal) -> Self {
        Self {
            clock: VirtualClock::default(),
            journal,
        }
    }

    pub fn now(&self) -> VirtualClock {
        self.clock
    }

    pub fn advance(&mut self, nanos: u64) {
        self.clock.advance(nanos);
    }

    /// Journal a line stamped with the current virtual time
    pub fn log(&mut self, message: impl AsRef<str>) {
        self.journal.record(self.clock, message.as_ref());
    }
}

/// Three binary locks, all created unlocked.
///
/// Each mutex owns the resource it guards, so the only way to touch the
/// clock, the journal or a sink is through a guard, and dropping the guard
/// is the unlock on every exit path. Waiting on one sink never blocks
/// writers of the other.
#[derive(Debug)]
pub struct LockSet {
    workspace: Mutex<Timeline>,
    sink_a: Mutex<ResultSink>,
    sink_b: Mutex<ResultSink>,
}

impl LockSet {
    pub fn new(timeline: Timeline, palindromes: ResultSink, others: ResultSink) -> Self {
        debug_assert_eq!(palindromes.kind(), SinkKind::Palindrome);
        debug_assert_eq!(others.kind(), SinkKind::NonPalindrome);
        Self {
            workspace: Mutex::new(timeline),
            sink_a: Mutex::new(palindromes),
            sink_b: Mutex::new(others),
        }
    }

    /// Block until the workspace lock is free, then hold it
    pub async fn lock_timeline(&self) -> MutexGuard<'_, Timeline> {
        tracing::trace!("acquiring {}", Resource::Workspace);
        self.workspace.lock().await
    }

    /// Block until the lock of the `kind` sink is free, then hold it
    pub async fn lock_sink(&self, kind: SinkKind) -> MutexGuard<'_, ResultSink> {
        tracing::trace!("acquiring {}", Resource::from(kind));
        match kind {
            SinkKind::Palindrome => self.sink_a.lock().await,
            SinkKind::NonPalindrome => self.sink_b.lock().await,
        }
    }

    /// Journal one line under the workspace lock and return its timestamp
    pub async fn log(&self, message: impl AsRef<str>) -> VirtualClock {
        let mut timeline = self.lock_timeline().await;
        timeline.log(message);
        timeline.now()
    }

    /// Advance the clock by one tick under the workspace lock
    pub async fn tick(&self, nanos: u64) -> VirtualClock {
        let mut timeline = self.lock_timeline().await;
        timeline.advance(nanos);
        timeline.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn lock_set(dir: &TempDir) -> LockSet {
        let journal = Journal::create(dir.path().join("output.log")).unwrap();
        let a = ResultSink::create(SinkKind::Palindrome, dir.path().join("palin.out")).unwrap();
        let b = ResultSink::create(SinkKind::NonPalindrome, dir.path().join("nopalin.out")).unwrap();
        LockSet::new(Timeline::new(journal), a, b)
    }

    #[tokio::test]
    async fn test_tick_and_log_share_the_clock() {
        let dir = TempDir::new().unwrap();
        let locks = lock_set(&dir);

        locks.tick(100).await;
        let stamp = locks.log("hello").await;
        assert_eq!(stamp, VirtualClock::new(0, 100));

        let journal = std::fs::read_to_string(dir.path().join("output.log")).unwrap();
        assert_eq!(journal, "[0:100] hello\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sinks_lock_independently() {
        let dir = TempDir::new().unwrap();
        let locks = Arc::new(lock_set(&dir));

        let held = locks.lock_sink(SinkKind::Palindrome).await;

        // The other sink and the workspace stay available
        let other = tokio::time::timeout(
            Duration::from_secs(1),
            locks.lock_sink(SinkKind::NonPalindrome),
        )
        .await;
        assert!(other.is_ok());
        drop(other);

        let timeline = tokio::time::timeout(Duration::from_secs(1), locks.lock_timeline()).await;
        assert!(timeline.is_ok());
        drop(timeline);

        // The same sink is exclusive until the guard drops
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock_sink(SinkKind::Palindrome).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_resource_for_sink() {
        assert_eq!(Resource::from(SinkKind::Palindrome), Resource::SinkA);
        assert_eq!(Resource::from(SinkKind::NonPalindrome), Resource::SinkB);
        assert_eq!(Resource::Workspace.to_string(), "workspace");
    }
}
