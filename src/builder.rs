use std::marker::PhantomData;

use crate::{Config, Pool};

/// A builder for creating a [`Pool`] with custom limits.
///
/// # Example
///
/// ```rust
/// use waitlist::Builder;
///
/// let mut builder = Builder::<u32>::new();
/// let pool = builder.max_items(2).max_waiters(16).build();
/// assert_eq!(pool.max_items(), 2);
/// assert_eq!(pool.max_waiters(), 16);
/// ```
pub struct Builder<T> {
    /// Limits for the pool.
    config: Config,
    _item: PhantomData<T>,
}

impl<T> Builder<T> {
    /// Create a new builder with the unbounded configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            _item: PhantomData,
        }
    }

    /// Set the lifetime construction limit. Zero means no limit.
    pub fn max_items(&mut self, max_items: usize) -> &mut Self {
        self.config.max_items = max_items;
        self
    }

    /// Set the waiter limit. Zero means no limit.
    pub fn max_waiters(&mut self, max_waiters: usize) -> &mut Self {
        self.config.max_waiters = max_waiters;
        self
    }

    /// Build the pool with the current limits.
    pub fn build(&mut self) -> Pool<T> {
        let config = std::mem::take(&mut self.config);
        Pool::with_config(config)
    }
}

impl<T> Default for Builder<T> {
    fn default() -> Self {
        Self::new()
    }
}
