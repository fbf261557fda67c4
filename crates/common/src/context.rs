//! Cancellation context passed to every storage call.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Returned when a [`Context`] finishes before the work it guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Canceled {
    /// The caller cancelled the token.
    #[error("operation canceled")]
    ByCaller,

    /// The context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Cancellation signal plus an optional deadline.
///
/// Cloning is cheap and clones observe the same token. Contexts derived with
/// [`Context::child`] or [`Context::with_timeout`] are cancelled together with
/// their parent, never the other way round.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Wraps an existing token, e.g. one cancelled by a shutdown signal.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derives a context that is cancelled together with this one.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Derives a child context whose deadline is at most `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Cancels this context and every context derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context is finished, if it is.
    pub fn err(&self) -> Option<Canceled> {
        if self.token.is_cancelled() {
            return Some(Canceled::ByCaller);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Canceled::DeadlineExceeded),
            _ => None,
        }
    }

    /// Fails fast when the context is already finished.
    pub fn check(&self) -> Result<(), Canceled> {
        match self.err() {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    /// Drives `fut` until it completes or the context finishes.
    ///
    /// When the context wins the race `fut` is dropped without being polled
    /// again.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Canceled> {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Canceled::ByCaller),
            () = deadline => Err(Canceled::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}
