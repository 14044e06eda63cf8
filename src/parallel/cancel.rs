use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const SIGINT: i32 = 2;
pub const SIGABRT: i32 = 6;
pub const SIGALRM: i32 = 14;
pub const SIGTERM: i32 = 15;

/// Why a run was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The maximum runtime elapsed
    Timeout,
    /// An external termination signal arrived
    Signal(i32),
}

impl CancelReason {
    /// Signal number reported in the journal; a timeout is reported as SIGALRM
    pub fn signal(&self) -> i32 {
        match self {
            CancelReason::Timeout => SIGALRM,
            CancelReason::Signal(signal) => *signal,
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Timeout => f.write_str("maximum runtime elapsed"),
            CancelReason::Signal(signal) => write!(f, "signal {signal}"),
        }
    }
}

/// Setter side of the cancellation context. Cheap to clone; the first
/// reason wins and later ones are ignored.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<Option<CancelReason>>>,
}

impl CancelHandle {
    pub fn cancel(&self, reason: CancelReason) {
        let first = self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
        if first {
            tracing::info!("Cancellation requested: {reason}");
        }
    }

    /// Cancel with [`CancelReason::Timeout`] once `after` has elapsed
    pub fn arm_timeout(&self, after: Duration) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            handle.cancel(CancelReason::Timeout);
        })
    }

    /// Translate SIGINT / SIGTERM into cancellation
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            match wait_for_signal().await {
                Ok(signal) => handle.cancel(CancelReason::Signal(signal)),
                Err(e) => tracing::warn!("Cannot install signal handlers: {e}"),
            }
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<i32> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let received = tokio::select! {
        _ = terminate.recv() => SIGTERM,
        _ = interrupt.recv() => SIGINT,
    };
    Ok(received)
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<i32> {
    tokio::signal::ctrl_c().await?;
    Ok(SIGINT)
}

/// Observer side, polled by the coordinator
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<Option<CancelReason>>,
    // Keeps the channel open so `cancelled` never sees a closed sender
    _tx: Arc<watch::Sender<Option<CancelReason>>>,
}

impl Cancellation {
    pub fn channel() -> (CancelHandle, Cancellation) {
        let (tx, rx) = watch::channel(None);
        let tx = Arc::new(tx);
        (CancelHandle { tx: tx.clone() }, Cancellation { rx, _tx: tx })
    }

    /// Non-blocking check
    pub fn reason(&self) -> Option<CancelReason> {
        *self.rx.borrow()
    }

    /// Wait until a reason is set
    pub async fn cancelled(&mut self) -> CancelReason {
        let reason = match self.rx.wait_for(Option::is_some).await {
            Ok(reason) => *reason,
            Err(_) => None,
        };
        match reason {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_reason_wins() {
        let (handle, mut cancellation) = Cancellation::channel();
        assert_eq!(cancellation.reason(), None);

        handle.cancel(CancelReason::Signal(SIGTERM));
        handle.cancel(CancelReason::Timeout);

        assert_eq!(cancellation.reason(), Some(CancelReason::Signal(SIGTERM)));
        assert_eq!(cancellation.cancelled().await, CancelReason::Signal(SIGTERM));
    }

    #[tokio::test]
    async fn test_timeout_cancels() {
        let (handle, mut cancellation) = Cancellation::channel();
        let _timer = handle.arm_timeout(Duration::from_millis(20));

        let reason = cancellation.cancelled().await;
        assert_eq!(reason, CancelReason::Timeout);
        assert_eq!(reason.signal(), SIGALRM);
    }

    #[test]
    fn test_display() {
        assert_eq!(CancelReason::Signal(SIGINT).to_string(), "signal 2");
        assert_eq!(CancelReason::Timeout.to_string(), "maximum runtime elapsed");
    }
}
