//! Bounded hand-over queue between a reader and its consumer.
//!
//! `put` blocks while the queue is full and `take` blocks while it is empty.
//! Both wait on the shared [`CancellationSignal`] as well, so cancelling
//! unblocks either side immediately. Items still queued at cancellation are
//! dropped by the receiver.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender, bounded, select};
use thiserror::Error;

/// Reasons a queue operation gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The shared cancellation signal fired.
    #[error("queue operation cancelled")]
    Cancelled,
    /// The other end of the queue was dropped.
    #[error("queue peer disconnected")]
    Disconnected,
}

#[derive(Debug)]
struct SignalState {
    cancelled: AtomicBool,
    // Dropping the sender disconnects `closed`, which wakes every `select!`.
    trigger: Mutex<Option<Sender<()>>>,
    closed: Receiver<()>,
}

/// Cloneable cancellation flag observed at every queue suspension point.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    state: Arc<SignalState>,
}

impl Default for CancellationSignal {
    fn default() -> Self {
        let (trigger, closed) = bounded(1);
        Self {
            state: Arc::new(SignalState {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                closed,
            }),
        }
    }
}

impl CancellationSignal {
    /// Create an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state
            .trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Report whether the signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    fn closed(&self) -> &Receiver<()> {
        &self.state.closed
    }
}

/// Producer half of a bounded queue.
#[derive(Debug)]
pub struct QueueSender<T> {
    sender: Sender<T>,
    cancel: CancellationSignal,
}

/// Consumer half of a bounded queue.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    receiver: Receiver<T>,
    cancel: CancellationSignal,
}

/// Create a queue holding at most `capacity` items (at least one).
///
/// # Examples
/// ```
/// use kartlag_data::{CancellationSignal, bounded_queue};
///
/// let (sender, receiver) = bounded_queue(2, CancellationSignal::new());
/// sender.put(1)?;
/// sender.put(2)?;
/// drop(sender);
/// assert_eq!(receiver.take()?, Some(1));
/// assert_eq!(receiver.take()?, Some(2));
/// assert_eq!(receiver.take()?, None);
/// # Ok::<(), kartlag_data::QueueError>(())
/// ```
#[must_use]
pub fn bounded_queue<T>(
    capacity: usize,
    cancel: CancellationSignal,
) -> (QueueSender<T>, QueueReceiver<T>) {
    let (sender, receiver) = bounded(capacity.max(1));
    (
        QueueSender {
            sender,
            cancel: cancel.clone(),
        },
        QueueReceiver { receiver, cancel },
    )
}

impl<T> QueueSender<T> {
    /// Hand `item` to the consumer, blocking while the queue is full.
    ///
    /// # Errors
    /// [`QueueError::Cancelled`] when the signal fires before the item is
    /// accepted, [`QueueError::Disconnected`] when the receiver is gone.
    pub fn put(&self, item: T) -> Result<(), QueueError> {
        if self.cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }
        select! {
            send(self.sender, item) -> sent => sent.map_err(|_| QueueError::Disconnected),
            recv(self.cancel.closed()) -> _ => Err(QueueError::Cancelled),
        }
    }

    /// The signal this queue observes.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationSignal {
        &self.cancel
    }
}

impl<T> QueueReceiver<T> {
    /// Take the next item, blocking while the queue is empty.
    ///
    /// Returns `Ok(None)` once the sender is dropped and the queue drained.
    ///
    /// # Errors
    /// [`QueueError::Cancelled`] when the signal fires; any queued items are
    /// dropped first.
    pub fn take(&self) -> Result<Option<T>, QueueError> {
        if self.cancel.is_cancelled() {
            self.discard();
            return Err(QueueError::Cancelled);
        }
        select! {
            recv(self.receiver) -> item => Ok(item.ok()),
            recv(self.cancel.closed()) -> _ => {
                self.discard();
                Err(QueueError::Cancelled)
            }
        }
    }

    /// Number of items waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Report whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    fn discard(&self) {
        while self.receiver.try_recv().is_ok() {}
    }
}
