//! Request-scoped cancellation signal.
//!
//! A [`Cancellation`] fires when its [`CancelHandle`] is triggered or when its
//! deadline elapses, whichever comes first. It is cheap to clone and is handed
//! to every downstream call spawned for one inbound request.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Triggers every [`Cancellation`] cloned from the paired receiver.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes cancellation of the inbound request.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// Create a linked handle/signal pair.
    pub fn new() -> (CancelHandle, Cancellation) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx },
            Cancellation {
                signal: Some(rx),
                deadline: None,
            },
        )
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    /// Fire at `deadline` at the latest; an earlier existing deadline wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        let signalled = self.signal.as_ref().is_some_and(|rx| *rx.borrow());
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        signalled || expired
    }

    /// Resolve once cancelled. Pending forever for [`Cancellation::never`].
    pub async fn cancelled(&self) {
        let mut signal = self.signal.clone();
        let signalled = async move {
            match signal.as_mut() {
                Some(rx) => {
                    // A dropped handle without a cancel never fires.
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = signalled => {}
            _ = expired => {}
        }
    }
}
