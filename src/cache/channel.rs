//! Watch Channel Module
//!
//! Per-key broadcast point that remembers the latest emitted value and
//! replays it to every new subscriber before fanning out later emissions.
//!
//! Every subscriber owns an unbounded queue, so publishing never blocks,
//! never drops an emission and never runs subscriber code. That makes it
//! safe to publish while the cache lock is held.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_stream::Stream;

use crate::error::TryRecvError;

// == Watch Channel ==
/// Latest-value broadcast channel for a single key.
pub struct WatchChannel<V> {
    state: Mutex<ChannelState<V>>,
}

struct ChannelState<V> {
    /// Last emitted value, None = key absent
    current: Option<V>,
    /// One queue per live subscription
    subscribers: Vec<UnboundedSender<Option<V>>>,
}

impl<V: Clone> WatchChannel<V> {
    // == Constructor ==
    /// Creates a channel whose first replayed value is `initial`.
    pub fn new(initial: Option<V>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ChannelState {
                current: initial,
                subscribers: Vec::new(),
            }),
        })
    }

    // == Publish ==
    /// Records `value` as current and delivers it to every subscriber.
    ///
    /// Subscribers whose handle was dropped are pruned here.
    pub fn publish(&self, value: Option<V>) {
        let mut state = self.state.lock();
        state
            .subscribers
            .retain(|tx| tx.send(value.clone()).is_ok());
        state.current = value;
    }

    // == Subscribe ==
    /// Attaches a new subscriber, which first receives the current value.
    pub fn subscribe(self: &Arc<Self>) -> Subscription<V> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        state.subscribers.retain(|sender| !sender.is_closed());
        // The receiver is alive, so the send cannot fail.
        let _ = tx.send(state.current.clone());
        state.subscribers.push(tx);

        Subscription {
            rx,
            _channel: Arc::clone(self),
        }
    }

    /// Returns the last emitted value.
    #[cfg(test)]
    pub fn current(&self) -> Option<V> {
        self.state.lock().current.clone()
    }

    /// True when the last emission was absence.
    pub fn is_absent(&self) -> bool {
        self.state.lock().current.is_none()
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}

impl<V> fmt::Debug for WatchChannel<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("WatchChannel")
            .field("present", &state.current.is_some())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

// == Subscription ==
/// Handle to the sequence of values observed for one key.
///
/// The first item is the key's value at subscribe time (`None` if absent),
/// followed by one item per later change. The sequence never completes.
/// Dropping the handle unsubscribes without affecting other subscribers.
///
/// The handle keeps its channel alive on its own, so it keeps working after
/// the cache forgets the channel.
pub struct Subscription<V> {
    rx: UnboundedReceiver<Option<V>>,
    _channel: Arc<WatchChannel<V>>,
}

impl<V> Subscription<V> {
    /// Waits for the next emission.
    pub async fn recv(&mut self) -> Option<V> {
        match self.rx.recv().await {
            Some(value) => value,
            // Unreachable while `_channel` holds our sender; never complete.
            None => std::future::pending().await,
        }
    }

    /// Returns the next emission if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<V>, TryRecvError> {
        self.rx.try_recv().map_err(|_| TryRecvError::Empty)
    }

    /// Blocks the current thread until the next emission.
    ///
    /// # Panics
    /// Panics when called from within an async runtime, like
    /// [`UnboundedReceiver::blocking_recv`].
    pub fn blocking_recv(&mut self) -> Option<V> {
        match self.rx.blocking_recv() {
            Some(value) => value,
            None => loop {
                std::thread::park();
            },
        }
    }
}

impl<V> Stream for Subscription<V> {
    type Item = Option<V>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(value)) => Poll::Ready(Some(value)),
            // The stream never terminates.
            Poll::Ready(None) | Poll::Pending => Poll::Pending,
        }
    }
}

impl<V> fmt::Debug for Subscription<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
