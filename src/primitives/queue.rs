//! # Bounded completion queue.
//!
//! [`CompletionQueue`] is a multi-producer, multi-consumer FIFO that also tracks
//! how many items have been put but not yet marked done.
//!
//! ## Architecture
//! ```text
//! put(item) ──► [slots]? ──► unfinished += 1 ──► items.push_back ──► ready += 1
//!                 (capacity)
//! get()     ──► ready.acquire ──► items.pop_front ──► slots += 1
//! mark_done ──► unfinished -= 1 ──► (0) ──► wake join()
//! join()    ──► wait until unfinished == 0
//! ```
//!
//! ## Rules
//! - `unfinished` is incremented **before** the item becomes visible, so `join`
//!   can never observe zero while an item is queued or being processed.
//! - `get` and `put` are cancel-safe: dropping either while suspended consumes
//!   nothing and enqueues nothing.
//! - `join` returns immediately when nothing is outstanding.
//! - `close` wakes every suspended `get`/`put` with [`QueueError::Closed`];
//!   the unfinished-count is left untouched.
//!
//! ## Example
//! ```rust
//! use poolvisor::CompletionQueue;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let queue = CompletionQueue::unbounded();
//! queue.put("10.0.0.1:8080").await.unwrap();
//!
//! let worker = queue.clone();
//! tokio::spawn(async move {
//!     while let Ok(_proxy) = worker.get().await {
//!         // validate...
//!         worker.mark_done().unwrap();
//!     }
//! });
//!
//! queue.join().await;
//! assert_eq!(queue.unfinished(), 0);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Semaphore, watch};

use crate::error::QueueError;

/// FIFO queue with completion tracking and optional backpressure.
///
/// Cloning is cheap and yields a handle to the same queue.
pub struct CompletionQueue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    /// One permit per item sitting in `items`.
    ready: Semaphore,
    /// Free capacity; `None` when unbounded.
    slots: Option<Semaphore>,
    bound: Option<usize>,
    unfinished: watch::Sender<usize>,
}

impl<T> Clone for CompletionQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for CompletionQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionQueue")
            .field("len", &self.len())
            .field("unfinished", &self.unfinished())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl<T> CompletionQueue<T> {
    /// Creates a queue; `None` means unbounded. A bound of 0 is clamped to 1.
    pub fn new(capacity: Option<usize>) -> Self {
        let (unfinished, _) = watch::channel(0usize);
        let bound = capacity.map(|n| n.max(1));
        Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::new()),
                ready: Semaphore::new(0),
                slots: bound.map(Semaphore::new),
                bound,
                unfinished,
            }),
        }
    }

    /// Creates a queue that never applies backpressure.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Creates a queue holding at most `capacity` items.
    pub fn bounded(capacity: usize) -> Self {
        Self::new(Some(capacity))
    }

    /// Adds an item, waiting for free capacity if the queue is bounded and full.
    pub async fn put(&self, item: T) -> Result<(), QueueError> {
        if let Some(slots) = &self.inner.slots {
            let permit = slots.acquire().await.map_err(|_| QueueError::Closed)?;
            permit.forget();
        } else if self.inner.ready.is_closed() {
            return Err(QueueError::Closed);
        }
        self.push(item);
        Ok(())
    }

    /// Adds an item without waiting; fails with [`QueueError::Full`] at capacity.
    pub fn try_put(&self, item: T) -> Result<(), QueueError> {
        if self.inner.ready.is_closed() {
            return Err(QueueError::Closed);
        }
        if let Some(slots) = &self.inner.slots {
            let permit = slots.try_acquire().map_err(|_| QueueError::Full)?;
            permit.forget();
        }
        self.push(item);
        Ok(())
    }

    /// Removes the next item, suspending while the queue is empty.
    pub async fn get(&self) -> Result<T, QueueError> {
        let permit = self
            .inner
            .ready
            .acquire()
            .await
            .map_err(|_| QueueError::Closed)?;
        permit.forget();

        let item = self.lock().pop_front().ok_or(QueueError::Closed)?;
        if let Some(slots) = &self.inner.slots {
            slots.add_permits(1);
        }
        Ok(item)
    }

    /// Records that one previously obtained item has been fully processed.
    ///
    /// Returns [`QueueError::NotPending`] instead of underflowing.
    pub fn mark_done(&self) -> Result<(), QueueError> {
        let mut underflow = false;
        self.inner.unfinished.send_if_modified(|n| {
            if *n == 0 {
                underflow = true;
                false
            } else {
                *n -= 1;
                *n == 0
            }
        });
        if underflow {
            Err(QueueError::NotPending)
        } else {
            Ok(())
        }
    }

    /// Suspends until every item put so far has been marked done.
    pub async fn join(&self) {
        let mut rx = self.inner.unfinished.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Wakes all suspended `get`/`put` calls with [`QueueError::Closed`].
    pub fn close(&self) {
        self.inner.ready.close();
        if let Some(slots) = &self.inner.slots {
            slots.close();
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.ready.is_closed()
    }

    /// Items put but not yet marked done.
    pub fn unfinished(&self) -> usize {
        *self.inner.unfinished.borrow()
    }

    /// Items waiting to be taken.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no item is waiting to be taken.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured bound, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.inner.bound
    }

    fn push(&self, item: T) {
        self.inner.unfinished.send_modify(|n| *n += 1);
        self.lock().push_back(item);
        self.inner.ready.add_permits(1);
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.inner
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
