//! Per-call cancellation and deadlines.
//!
//! Every façade operation takes a [`CallContext`]. The context wraps a
//! [`CancellationToken`] and an optional deadline; remote round trips are
//! raced against both, and the losing future is dropped so the in-flight
//! request stops. A context that is already cancelled or expired never
//! polls the remote future at all.

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Why a call stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Interrupted {
    /// The context was cancelled.
    #[error("call cancelled")]
    Cancelled,
    /// The context deadline elapsed.
    #[error("call deadline exceeded")]
    DeadlineExceeded,
}

impl From<Interrupted> for io::Error {
    fn from(reason: Interrupted) -> Self {
        let kind = match reason {
            Interrupted::Cancelled => io::ErrorKind::Interrupted,
            Interrupted::DeadlineExceeded => io::ErrorKind::TimedOut,
        };
        io::Error::new(kind, reason)
    }
}

/// Cancellation signal plus optional deadline for one logical call.
///
/// Cloning shares the same token, so cancelling any clone cancels them all.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ssostore_storage::CallContext;
///
/// let ctx = CallContext::with_timeout(Duration::from_secs(5));
/// assert!(!ctx.is_cancelled());
/// ctx.cancel();
/// assert!(ctx.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context with no deadline that is cancelled only explicitly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Wrap an existing token, e.g. one tied to server shutdown.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// A context cancelled together with `self` but cancellable on its own.
    ///
    /// The child keeps the parent's deadline unless `timeout` is shorter.
    #[must_use]
    pub fn child(&self, timeout: Option<Duration>) -> Self {
        let own = timeout.map(|t| Instant::now() + t);
        let deadline = match (self.deadline, own) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// Cancel this context and every child derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check whether the call may still start.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Interrupted::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the context is cancelled or expires
    /// first. The future is not polled when the context is already done.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Interrupted>
    where
        F: Future,
    {
        self.check()?;

        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Interrupted::Cancelled),
            () = deadline => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

/// Readable handle to an object body.
///
/// Reads fail with [`io::ErrorKind::Interrupted`] once the originating
/// context is cancelled and with [`io::ErrorKind::TimedOut`] once its
/// deadline passes.
pub struct ObjectReader {
    inner: Pin<Box<dyn AsyncRead + Send>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    deadline: Option<Pin<Box<Sleep>>>,
}

impl ObjectReader {
    pub(crate) fn new(inner: Pin<Box<dyn AsyncRead + Send>>, ctx: &CallContext) -> Self {
        Self {
            inner,
            cancelled: Box::pin(ctx.token.clone().cancelled_owned()),
            deadline: ctx.deadline.map(|d| Box::pin(tokio::time::sleep_until(d))),
        }
    }

    /// Read the whole object into memory.
    pub async fn read_to_vec(mut self) -> io::Result<Vec<u8>> {
        use tokio::io::AsyncReadExt;

        let mut buf = Vec::new();
        self.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("has_deadline", &self.deadline.is_some())
            .finish_non_exhaustive()
    }
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(Interrupted::Cancelled.into()));
        }
        if let Some(deadline) = this.deadline.as_mut() {
            if deadline.as_mut().poll(cx).is_ready() {
                return Poll::Ready(Err(Interrupted::DeadlineExceeded.into()));
            }
        }
        this.inner.as_mut().poll_read(cx, buf)
    }
}
