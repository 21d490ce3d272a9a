//! Cancellation and deadlines for backend calls.
//!
//! The datastore never times out on its own. Callers hand an [`OpContext`]
//! to every operation and the context decides when to give up.

use std::future::Future;
use std::time::Duration;

use quarry_core::{QuarryError, QuarryResult};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation token plus optional deadline for one operation.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Give up `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline_at(Instant::now() + timeout)
    }

    /// Give up at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline_at(deadline)
    }

    /// Give up when `token` is cancelled.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancel: token,
            deadline: None,
        }
    }

    /// Tighten the deadline; an earlier existing deadline wins.
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// A context sharing this deadline whose token is a child of this one.
    ///
    /// Cancelling the child does not cancel the parent.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fails if the context is already cancelled or past its deadline.
    pub fn check(&self) -> QuarryResult<()> {
        if self.cancel.is_cancelled() {
            return Err(cancelled("cancelled by caller"));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(cancelled("deadline exceeded"));
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context ends first.
    ///
    /// An already-ended context fails without polling `fut`. When the
    /// context ends mid-flight `fut` is dropped and `Cancelled` returned.
    pub async fn run<T, F>(&self, fut: F) -> QuarryResult<T>
    where
        F: Future<Output = QuarryResult<T>>,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(cancelled("cancelled by caller")),
            _ = deadline => Err(cancelled("deadline exceeded")),
            result = fut => result,
        }
    }
}

fn cancelled(reason: &str) -> QuarryError {
    QuarryError::Cancelled {
        reason: reason.to_string(),
    }
}
