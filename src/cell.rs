use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::task::AtomicWaker;
use parking_lot::Mutex;

enum Slot<T> {
    /// Nothing has been written yet.
    Empty,
    /// A value is waiting for its owner.
    Value(T),
    /// The pool closed before a value arrived.
    Closed,
}

/// A single-slot rendezvous between one producer write and one waiting take.
///
/// A cell is written at most once per occupancy, either a value or the
/// closed mark, and consumed at most once by the take that registered it.
/// A cell whose slot has been emptied again goes back on the pool's
/// free-list for the next waiter.
pub(crate) struct Cell<T> {
    slot: Mutex<Slot<T>>,
    waker: AtomicWaker,
}

impl<T> Cell<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
            waker: AtomicWaker::new(),
        }
    }

    /// Hand a value to the owning waiter. Never blocks.
    ///
    /// # Panics
    ///
    /// Panics if the slot is already occupied. The pool pops a cell off the
    /// waiter queue exactly once before writing it, so a second write is a
    /// bug in waitlist, not a caller error.
    pub(crate) fn send(&self, value: T) {
        {
            let mut slot = self.slot.lock();
            match *slot {
                Slot::Empty => *slot = Slot::Value(value),
                Slot::Value(_) | Slot::Closed => {
                    panic!("handoff cell written twice (this is a bug in waitlist)")
                }
            }
        }
        self.waker.wake();
    }

    /// Mark the cell closed, waking the owner with no value.
    pub(crate) fn close(&self) {
        {
            let mut slot = self.slot.lock();
            if let Slot::Empty = *slot {
                *slot = Slot::Closed;
            }
        }
        self.waker.wake();
    }

    /// Take the value if one has already arrived.
    pub(crate) fn try_recv(&self) -> Option<T> {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Value(_)) {
            let Slot::Value(value) = std::mem::replace(&mut *slot, Slot::Empty) else {
                unreachable!()
            };
            Some(value)
        } else {
            None
        }
    }

    /// Whether the cell carries the closed mark. Close-marked cells stay
    /// out of the free-list.
    pub(crate) fn is_closed(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Closed)
    }

    /// Wait for a value, or `None` once the pool has closed this cell.
    pub(crate) fn recv(&self) -> Recv<'_, T> {
        Recv { cell: self }
    }
}

pub(crate) struct Recv<'a, T> {
    cell: &'a Cell<T>,
}

impl<T> Future for Recv<'_, T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Register before checking the slot so a write landing between the
        // check and returning Pending still wakes this task.
        self.cell.waker.register(cx.waker());

        let mut slot = self.cell.slot.lock();
        match *slot {
            Slot::Empty => Poll::Pending,
            Slot::Closed => Poll::Ready(None),
            Slot::Value(_) => {
                let Slot::Value(value) = std::mem::replace(&mut *slot, Slot::Empty) else {
                    unreachable!()
                };
                Poll::Ready(Some(value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures_util::FutureExt;

    use super::*;

    #[test]
    fn send_then_recv() {
        let cell = Cell::new();
        cell.send(7);
        assert_eq!(cell.recv().now_or_never(), Some(Some(7)));
    }

    #[test]
    fn close_then_recv() {
        let cell = Cell::<u32>::new();
        cell.close();
        assert_eq!(cell.recv().now_or_never(), Some(None));
        assert!(cell.is_closed());
    }

    #[test]
    fn empty_cell_is_pending() {
        let cell = Cell::<u32>::new();
        assert_eq!(cell.try_recv(), None);
        assert_eq!(cell.recv().now_or_never(), None);
    }

    #[test]
    fn reusable_after_consuming() {
        let cell = Cell::new();
        cell.send(1);
        assert_eq!(cell.try_recv(), Some(1));
        cell.send(2);
        assert_eq!(cell.recv().now_or_never(), Some(Some(2)));
    }

    #[test]
    #[should_panic(expected = "written twice")]
    fn double_send_panics() {
        let cell = Cell::new();
        cell.send(1);
        cell.send(2);
    }

    #[tokio::test]
    async fn recv_wakes_on_send() {
        let cell = Arc::new(Cell::new());
        let recv = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move { cell.recv().await })
        };
        tokio::task::yield_now().await;
        cell.send(42);
        assert_eq!(recv.await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn recv_wakes_on_close() {
        let cell = Arc::new(Cell::<u32>::new());
        let recv = {
            let cell = Arc::clone(&cell);
            tokio::spawn(async move { cell.recv().await })
        };
        tokio::task::yield_now().await;
        cell.close();
        assert_eq!(recv.await.unwrap(), None);
    }
}
