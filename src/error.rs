use std::error::Error;
use std::fmt;

/// Boxed error carried as a cancellation cause.
pub type Cause = Box<dyn Error + Send + Sync>;

/// A cancellation produced by a take's context future.
///
/// The context passed to [`Pool::take`](crate::Pool::take) resolves to
/// something convertible into `Canceled`. Plain signal futures resolve to
/// `()`, which converts into a cause-less cancellation, so e.g.
/// `tokio_util::sync::CancellationToken::cancelled()` works directly. A
/// context built with [`Canceled::with_cause`] threads the underlying
/// reason through [`Error::source`].
#[derive(Debug, Default)]
pub struct Canceled {
    cause: Option<Cause>,
}

impl Canceled {
    /// A cancellation with no recorded cause.
    pub fn new() -> Self {
        Self { cause: None }
    }

    /// A cancellation carrying its underlying cause.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waitlist::Canceled;
    ///
    /// let canceled = Canceled::with_cause("deadline exceeded");
    /// assert_eq!(canceled.to_string(), "canceled: deadline exceeded");
    /// ```
    pub fn with_cause(cause: impl Into<Cause>) -> Self {
        Self {
            cause: Some(cause.into()),
        }
    }

    /// The underlying cause, if one was recorded.
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync)> {
        self.cause.as_deref()
    }
}

impl From<()> for Canceled {
    fn from(_: ()) -> Self {
        Self::new()
    }
}

impl fmt::Display for Canceled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "canceled: {cause}"),
            None => f.write_str("canceled"),
        }
    }
}

impl Error for Canceled {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => {
                let cause: &(dyn Error + 'static) = cause.as_ref();
                Some(cause)
            }
            None => None,
        }
    }
}

/// Errors returned by [`Pool::take`](crate::Pool::take) and
/// [`Pool::take_with`](crate::Pool::take_with).
#[derive(Debug, thiserror::Error)]
pub enum TakeError {
    /// The waiter queue is at its `max_waiters` limit.
    #[error("too many waiters")]
    MaxWaiters,

    /// The pool is closed and no ready item remains.
    #[error("closed")]
    Closed,

    /// The context resolved before an item arrived.
    #[error(transparent)]
    Canceled(#[from] Canceled),
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn canceled_without_cause() {
        let canceled = Canceled::from(());
        assert_eq!(canceled.to_string(), "canceled");
        assert!(canceled.cause().is_none());
        assert!(canceled.source().is_none());
    }

    #[test]
    fn canceled_cause_is_the_error_source() {
        let err = TakeError::from(Canceled::with_cause("shutting down"));
        assert_eq!(err.to_string(), "canceled: shutting down");
        let source = err.source().expect("cause is the source");
        assert_eq!(source.to_string(), "shutting down");
    }
}
