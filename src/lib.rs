//! A fair waiting pool for reusable resources.
//!
//! `waitlist` pools items that are expensive to create, such as connections
//! or handles. It differs from a plain buffered channel in two ways:
//!
//! - **FIFO fairness**: takes that have to wait are served strictly in the
//!   order they got in line.
//! - **Bounded lazy construction**: items are only built when a take finds
//!   nothing ready, construction runs on its own task, and the total number
//!   of constructions over the pool's lifetime is capped.
//!
//! Items returned with [`Pool::put`] go to the longest-waiting take, or onto
//! a LIFO stack when nobody is waiting, so recycled items are preferred over
//! fresh construction. Closing the pool wakes all waiters; ready items stay
//! drainable afterwards, like a closed channel.
//!
//! The pool never inspects its items: no validation, no expiry, no reset.
//!
//! # Examples
//!
//! Recycling keeps construction under the cap:
//!
//! ```rust
//! use std::future::pending;
//!
//! use waitlist::{Config, Pool};
//!
//! # tokio_test::block_on(async {
//! let pool = Pool::<u64>::with_config(Config {
//!     max_items: 2,
//!     max_waiters: 0,
//! });
//!
//! let a = pool.take(pending::<()>()).await.unwrap();
//! let b = pool.take(pending::<()>()).await.unwrap();
//! assert_eq!(pool.loads(), 2);
//!
//! // From here on the two items circulate; nothing new is built.
//! pool.put(a).unwrap();
//! let c = pool.take(pending::<()>()).await.unwrap();
//! assert_eq!(pool.loads(), 2);
//! # drop((b, c));
//! # });
//! ```
//!
//! Cancellation is a future. Any future works as the context; its output
//! becomes the cancellation cause:
//!
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use waitlist::{Pool, TakeError};
//!
//! # tokio_test::block_on(async {
//! let pool: Pool<u64> = Pool::new();
//! let token = CancellationToken::new();
//! token.cancel();
//!
//! let err = pool.take(token.cancelled()).await.unwrap_err();
//! assert!(matches!(err, TakeError::Canceled(_)));
//!
//! // A ready item still wins over a canceled context.
//! pool.put(7).unwrap();
//! assert_eq!(pool.take(token.cancelled()).await.unwrap(), 7);
//! # });
//! ```

#[macro_use]
mod cfg;

mod builder;
mod cell;
mod error;
mod pool;
mod queue;

pub use builder::Builder;
pub use error::{Canceled, Cause, TakeError};
pub use pool::{Config, Pool};
