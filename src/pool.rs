use std::fmt;
use std::future::{Future, ready};
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::*;

use crossbeam_queue::SegQueue;
use futures_util::FutureExt;
use futures_util::future::{Either, select};
use parking_lot::Mutex;

use crate::builder::Builder;
use crate::cell::Cell;
use crate::error::{Canceled, TakeError};
use crate::queue::{Fifo, Lifo};

/// Limits for a [`Pool`].
///
/// Zero means unbounded, so the default configuration is a pool with no
/// limits.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Maximum number of items ever constructed through load functions over
    /// the pool's lifetime. Zero means no limit.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_items: usize,
    /// Maximum number of concurrently waiting takes. Zero means no limit.
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_waiters: usize,
}

/// A fair waiting pool for reusable resources.
///
/// Takes that have to wait are served in FIFO order. Items nobody is
/// waiting for sit on a LIFO stack, so the most recently returned item is
/// handed out first. When nothing is ready and the lifetime construction
/// budget allows, a take spawns a task to build a new item and waits for it
/// in line like any other waiter.
///
/// `Pool` is a cheap handle: clones share the same pool.
///
/// # Examples
///
/// ```rust
/// use std::future::pending;
///
/// use waitlist::{Config, Pool};
///
/// # tokio_test::block_on(async {
/// let pool = Pool::<u32>::with_config(Config {
///     max_items: 2,
///     max_waiters: 8,
/// });
///
/// // Nothing is ready, so this take constructs an item (the type's
/// // default) and receives it through the normal handoff path.
/// let item = pool.take(pending::<()>()).await.unwrap();
/// assert_eq!(item, 0);
/// assert_eq!(pool.loads(), 1);
///
/// // Returned items are served before any further construction.
/// pool.put(item).unwrap();
/// let again = pool.take(pending::<()>()).await.unwrap();
/// assert_eq!(again, 0);
/// assert_eq!(pool.loads(), 1);
/// # });
/// ```
///
/// Shared across tasks, with a caller-supplied constructor:
///
/// ```rust
/// use std::future::pending;
///
/// use waitlist::Pool;
///
/// # tokio_test::block_on(async {
/// let pool: Pool<String> = Pool::builder().max_items(1).build();
///
/// let worker = {
///     let pool = pool.clone();
///     tokio::spawn(async move {
///         let conn = pool
///             .take_with(pending::<()>(), || async { "conn-1".to_string() })
///             .await
///             .unwrap();
///         pool.put(conn).unwrap();
///     })
/// };
/// worker.await.unwrap();
///
/// // The single constructed item is recycled, not rebuilt.
/// let conn = pool.take(pending::<()>()).await.unwrap();
/// assert_eq!(conn, "conn-1");
/// assert_eq!(pool.loads(), 1);
/// # });
/// ```
pub struct Pool<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Pool<T> {
    /// Returns another handle to the same pool.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

struct Inner<T> {
    config: Config,
    /// Ready items and the construction counter share a lock so a take
    /// moving from the ready check to waiting cannot race a put stacking
    /// an item in between.
    ready: Mutex<Ready<T>>,
    /// Waiting takes, served head-first.
    waiters: Mutex<Fifo<Arc<Cell<T>>>>,
    /// Free-list of handoff cells.
    cells: SegQueue<Arc<Cell<T>>>,
    closed: AtomicBool,
    #[cfg(test)]
    hook_waiter_canceled: Mutex<Option<Box<dyn Fn(&Cell<T>) + Send>>>,
}

struct Ready<T> {
    stack: Lifo<T>,
    /// Construction invocations over the pool's lifetime. Recycled items
    /// do not count against it.
    loads: usize,
}

impl<T> Pool<T> {
    /// Create a pool with no limits.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waitlist::Pool;
    ///
    /// let pool: Pool<u32> = Pool::new();
    /// assert_eq!(pool.max_items(), 0);
    /// assert_eq!(pool.max_waiters(), 0);
    /// ```
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a pool with the given limits.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waitlist::{Config, Pool};
    ///
    /// let pool: Pool<u32> = Pool::with_config(Config {
    ///     max_items: 4,
    ///     max_waiters: 16,
    /// });
    /// assert_eq!(pool.max_items(), 4);
    /// ```
    pub fn with_config(config: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                ready: Mutex::new(Ready {
                    stack: Lifo::default(),
                    loads: 0,
                }),
                waiters: Mutex::new(Fifo::default()),
                cells: SegQueue::new(),
                closed: AtomicBool::new(false),
                #[cfg(test)]
                hook_waiter_canceled: Mutex::new(None),
            }),
        }
    }

    /// Create a [`Builder`] for a pool of `T`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waitlist::Pool;
    ///
    /// let pool: Pool<u32> = Pool::builder().max_items(2).build();
    /// assert_eq!(pool.max_items(), 2);
    /// ```
    pub fn builder() -> Builder<T> {
        Builder::new()
    }

    /// Return `value` to the pool.
    ///
    /// If a take is waiting, the value goes straight to the one that has
    /// waited longest. Otherwise it is stacked for the next take. Never
    /// blocks.
    ///
    /// A closed pool rejects the value and hands it back as `Err`, leaving
    /// the caller to decide what to do with it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waitlist::Pool;
    ///
    /// let pool = Pool::new();
    /// assert!(pool.put(7).is_ok());
    /// assert_eq!(pool.ready(), 1);
    ///
    /// pool.close();
    /// assert_eq!(pool.put(8), Err(8));
    /// ```
    pub fn put(&self, value: T) -> Result<(), T> {
        self.inner.put(value)
    }

    /// Pop a ready item without waiting.
    ///
    /// Only looks at the ready stack: never touches the waiter queue and
    /// never spawns construction. Works on a closed pool until the stack
    /// is drained.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waitlist::Pool;
    ///
    /// let pool = Pool::new();
    /// assert_eq!(pool.try_take(), None);
    /// pool.put(7).unwrap();
    /// assert_eq!(pool.try_take(), Some(7));
    /// ```
    pub fn try_take(&self) -> Option<T> {
        self.inner.ready.lock().stack.pop()
    }

    /// Close the pool.
    ///
    /// Every take currently waiting is unblocked with
    /// [`TakeError::Closed`]. Later puts are rejected. Ready items remain
    /// drainable through [`take`](Pool::take) or
    /// [`try_take`](Pool::try_take). Closing twice has no further effect.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waitlist::Pool;
    ///
    /// let pool = Pool::new();
    /// pool.put(7).unwrap();
    /// pool.close();
    /// pool.close();
    ///
    /// // Ready items survive the close.
    /// assert_eq!(pool.try_take(), Some(7));
    /// assert!(pool.put(8).is_err());
    /// ```
    pub fn close(&self) {
        if self.inner.closed.swap(true, AcqRel) {
            // Already closed.
            return;
        }

        let mut waiters = self.inner.waiters.lock();
        cfg_tracing! {
            if waiters.len() > 0 {
                tracing::debug!(waiters = waiters.len(), "pool closed, waking waiters");
            }
        }
        while let Some(cell) = waiters.pop() {
            cell.close();
        }
    }

    /// Number of items sitting on the ready stack.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waitlist::Pool;
    ///
    /// let pool = Pool::new();
    /// pool.put(1).unwrap();
    /// pool.put(2).unwrap();
    /// assert_eq!(pool.ready(), 2);
    /// ```
    pub fn ready(&self) -> usize {
        self.inner.ready.lock().stack.len()
    }

    /// Number of takes currently waiting in line.
    pub fn waiting(&self) -> usize {
        self.inner.waiters.lock().len()
    }

    /// Construction invocations issued so far over the pool's lifetime.
    ///
    /// # Example
    ///
    /// ```rust
    /// use waitlist::Pool;
    ///
    /// let pool = Pool::<u32>::new();
    /// pool.put(7).unwrap();
    /// assert_eq!(pool.loads(), 0);
    /// ```
    pub fn loads(&self) -> usize {
        self.inner.ready.lock().loads
    }

    /// Whether [`close`](Pool::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Acquire)
    }

    /// The configured lifetime construction limit. Zero means no limit.
    pub fn max_items(&self) -> usize {
        self.inner.config.max_items
    }

    /// The configured waiter limit. Zero means no limit.
    pub fn max_waiters(&self) -> usize {
        self.inner.config.max_waiters
    }
}

impl<T: Send + 'static> Pool<T> {
    /// Take an item, constructing missing ones as `T::default()`.
    ///
    /// Equivalent to [`take_with`](Pool::take_with) with a default-value
    /// constructor; see there for the full contract.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::future::pending;
    ///
    /// use waitlist::Pool;
    ///
    /// # tokio_test::block_on(async {
    /// let pool = Pool::new();
    /// pool.put(7u32).unwrap();
    /// let item = pool.take(pending::<()>()).await.unwrap();
    /// assert_eq!(item, 7);
    /// # });
    /// ```
    pub async fn take<C>(&self, ctx: C) -> Result<T, TakeError>
    where
        C: Future,
        C::Output: Into<Canceled>,
        T: Default,
    {
        self.take_with(ctx, || ready(T::default())).await
    }

    /// Take an item, waiting until one is available, `ctx` resolves, or
    /// the pool is closed.
    ///
    /// A ready item is returned immediately, even on a closed pool or with
    /// an already-resolved `ctx`, so a pool drains like a channel.
    /// Otherwise the call joins the waiter queue and is served in FIFO
    /// order; if the pool has issued fewer than `max_items` constructions,
    /// `load` is spawned onto a task and its result is delivered through
    /// the regular put path.
    ///
    /// `ctx` is the call's cancellation context: a future that resolves
    /// when the caller no longer wants the item, yielding the cancellation
    /// cause. Use `std::future::pending()` to wait indefinitely. A value
    /// that was already in flight when `ctx` resolved wins over the
    /// cancellation and is returned normally.
    ///
    /// `load` takes no arguments and cannot fail; it is invoked at most
    /// `max_items` times over the pool's lifetime.
    ///
    /// # Errors
    ///
    /// [`TakeError::Closed`] if the pool is closed with nothing ready,
    /// [`TakeError::MaxWaiters`] if the waiter queue is full, or
    /// [`TakeError::Canceled`] carrying the cause produced by `ctx`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tokio_util::sync::CancellationToken;
    /// use waitlist::{Pool, TakeError};
    ///
    /// # tokio_test::block_on(async {
    /// let pool: Pool<u32> = Pool::builder().max_waiters(4).build();
    /// let token = CancellationToken::new();
    /// token.cancel();
    ///
    /// // Nothing ready and the context is already gone.
    /// let err = pool
    ///     .take_with(token.cancelled(), || async { unreachable!() })
    ///     .await
    ///     .unwrap_err();
    /// assert!(matches!(err, TakeError::Canceled(_)));
    /// # });
    /// ```
    pub async fn take_with<C, F, Fut>(&self, ctx: C, load: F) -> Result<T, TakeError>
    where
        C: Future,
        C::Output: Into<Canceled>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut ctx = pin!(ctx);

        let cell = {
            let mut ready = self.inner.ready.lock();

            // A ready item wins over closed state and cancellation alike,
            // so the pool stays drainable after close.
            if let Some(value) = ready.stack.pop() {
                return Ok(value);
            }

            if self.inner.closed.load(Acquire) {
                return Err(TakeError::Closed);
            }

            if let Some(cause) = ctx.as_mut().now_or_never() {
                return Err(TakeError::Canceled(cause.into()));
            }

            let mut waiters = self.inner.waiters.lock();

            // The earlier read was a snapshot. Rechecking under the waiters
            // lock means close() either sees this registration when it
            // drains, or its flag is visible here.
            if self.inner.closed.load(Acquire) {
                return Err(TakeError::Closed);
            }

            if self.inner.config.max_waiters > 0 && waiters.len() >= self.inner.config.max_waiters
            {
                return Err(TakeError::MaxWaiters);
            }

            // Get in line before any loading starts; registration order is
            // service order.
            let cell = self.inner.alloc_cell();
            waiters.push(Arc::clone(&cell));

            if self.inner.config.max_items == 0 || ready.loads < self.inner.config.max_items {
                ready.loads += 1;
                cfg_tracing! {
                    tracing::trace!(loads = ready.loads, "spawning item construction");
                }
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    let value = load().await;
                    // Rejected only if the pool closed meanwhile; the
                    // construction budget is spent either way.
                    let _ = inner.put(value);
                });
            }

            cell
        };

        let mut guard = Deregister {
            inner: &self.inner,
            cell: Arc::clone(&cell),
            armed: true,
        };

        match select(cell.recv(), ctx).await {
            Either::Left((received, _)) => {
                guard.armed = false;
                match received {
                    Some(value) => {
                        self.inner.recycle_cell(cell);
                        Ok(value)
                    }
                    None => Err(TakeError::Closed),
                }
            }
            Either::Right((cause, _recv)) => {
                guard.armed = false;
                match self.inner.cancel_waiter(&cell) {
                    // Near miss: the value arrived as we were canceling.
                    // It wins over the cancellation.
                    Some(value) => Ok(value),
                    None => Err(TakeError::Canceled(cause.into())),
                }
            }
        }
    }
}

impl<T> Inner<T> {
    fn put(&self, value: T) -> Result<(), T> {
        if self.closed.load(Acquire) {
            cfg_tracing! {
                tracing::trace!("put rejected, pool is closed");
            }
            return Err(value);
        }

        // Fast path: hand off without touching the ready lock.
        let value = match self.try_handoff(value) {
            Ok(()) => return Ok(()),
            Err(value) => value,
        };

        let mut ready = self.ready.lock();

        // A close may have raced in while we acquired the lock.
        if self.closed.load(Acquire) {
            return Err(value);
        }

        // Waiters may have queued up while we acquired the lock.
        let value = match self.try_handoff(value) {
            Ok(()) => return Ok(()),
            Err(value) => value,
        };

        ready.stack.push(value);
        Ok(())
    }

    /// Hand `value` to the longest-waiting take, if any.
    fn try_handoff(&self, value: T) -> Result<(), T> {
        let cell = self.waiters.lock().pop();
        match cell {
            Some(cell) => {
                cell.send(value);
                Ok(())
            }
            None => Err(value),
        }
    }

    fn alloc_cell(&self) -> Arc<Cell<T>> {
        self.cells.pop().unwrap_or_else(|| Arc::new(Cell::new()))
    }

    fn recycle_cell(&self, cell: Arc<Cell<T>>) {
        // Close-marked cells stay out of circulation. A cell that caught a
        // late handoff keeps its value and delivers it to the next waiter
        // that draws it from the free-list.
        if !cell.is_closed() {
            self.cells.push(cell);
        }
    }

    /// Deregister a canceled waiter, salvaging a value that raced in.
    fn cancel_waiter(&self, cell: &Arc<Cell<T>>) -> Option<T> {
        #[cfg(test)]
        if let Some(hook) = &*self.hook_waiter_canceled.lock() {
            hook(cell);
        }

        self.waiters.lock().remove_where(|c| Arc::ptr_eq(c, cell));

        // A handoff may have popped this cell before the removal above; if
        // its value already landed, it must not be lost.
        let value = cell.try_recv();
        cfg_tracing! {
            if value.is_some() {
                tracing::trace!("canceled take recovered an in-flight item");
            }
        }
        self.recycle_cell(Arc::clone(cell));
        value
    }
}

/// Removes a registered waiter when its take future is dropped mid-wait.
struct Deregister<'a, T> {
    inner: &'a Inner<T>,
    cell: Arc<Cell<T>>,
    armed: bool,
}

impl<T> Drop for Deregister<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // The future was dropped while queued. A value handed off in the
        // same instant has no caller to go to anymore, so route it back
        // through put instead of dropping it with the future.
        if let Some(value) = self.inner.cancel_waiter(&self.cell) {
            let _ = self.inner.put(value);
        }
    }
}
