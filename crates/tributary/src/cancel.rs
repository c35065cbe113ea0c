//! Cancellation signals for long-running operations.
//!
//! Graph builds and critical path searches accept a [`CancelSignal`]. A signal
//! fires when its paired [`CancelHandle`] is triggered or when its deadline
//! passes. Interrupted operations return what they have so far, flagged as
//! truncated, instead of failing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Why an operation stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interruption {
    /// The caller cancelled the operation.
    Cancelled,
    /// The operation's deadline passed.
    DeadlineExceeded,
}

/// Triggers the [`CancelSignal`]s created alongside it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Cancel every signal paired with this handle.
    pub fn cancel(&self) {
        // Receivers may already be gone; nothing left to notify then.
        let _ = self.tx.send(true);
    }
}

/// Observed by long-running operations to stop early.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        Self::default()
    }

    /// Create a handle and a signal it controls.
    #[must_use]
    pub fn pair() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx: Arc::new(tx) },
            Self {
                rx: Some(rx),
                deadline: None,
            },
        )
    }

    /// Fire at `deadline` if not cancelled earlier.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Fire after `timeout` from now if not cancelled earlier.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Non-blocking check, for use inside synchronous loops.
    #[must_use]
    pub fn check(&self) -> Option<Interruption> {
        if self.rx.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(Interruption::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interruption::DeadlineExceeded),
            _ => None,
        }
    }

    /// Time left before the deadline, if one is set.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Resolves once the signal fires. Never resolves for [`CancelSignal::never`].
    pub async fn fired(&self) -> Interruption {
        let flag = async {
            match &self.rx {
                Some(rx) => {
                    let mut rx = rx.clone();
                    loop {
                        if *rx.borrow_and_update() {
                            return;
                        }
                        if rx.changed().await.is_err() {
                            // Handle dropped without cancelling.
                            std::future::pending::<()>().await;
                        }
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };
        let deadline = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            () = flag => Interruption::Cancelled,
            () = deadline => Interruption::DeadlineExceeded,
        }
    }
}
