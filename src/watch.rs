//! Change events and streams for asynchronous observers.
//!
//! Synchronous update handlers run inside [`TypedStore::set`]. Consumers
//! that live on an async runtime can instead subscribe to a
//! [`ChangeStream`], which yields one [`ChangeEvent`] per successful write.
//!
//! [`TypedStore::set`]: crate::TypedStore::set

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use crate::value::RawValue;

/// Default capacity of a store's change channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// A write to a store's key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The key that changed.
    pub key: String,
    /// Raw value before the write, if one was stored.
    pub old_value: Option<RawValue>,
    /// Raw value written.
    pub new_value: RawValue,
}

impl ChangeEvent {
    /// Create an event for a write to `key`.
    pub fn new(key: impl Into<String>, old_value: Option<RawValue>, new_value: RawValue) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value,
        }
    }

    /// True if the key held no value before this write.
    pub fn is_first_write(&self) -> bool {
        self.old_value.is_none()
    }
}

/// A stream of change events for one store.
///
/// Lagged subscribers silently skip the events they missed.
pub struct ChangeStream {
    inner: BroadcastStream<ChangeEvent>,
}

impl ChangeStream {
    fn new(receiver: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
        }
    }

    /// Take the next buffered event without waiting.
    pub fn try_next(&mut self) -> Option<ChangeEvent> {
        self.next().now_or_never().flatten()
    }
}

impl Stream for ChangeStream {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
                Some(Ok(event)) => return Poll::Ready(Some(event)),
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    debug!(skipped, "Change subscriber lagged");
                }
                None => return Poll::Ready(None),
            }
        }
    }
}

/// Handle for publishing change events to subscribers.
#[derive(Clone)]
pub struct ChangeSender {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeSender {
    /// Create a new sender with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Send an event to all subscribers.
    pub fn send(&self, event: ChangeEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events sent after this call.
    pub fn subscribe(&self) -> ChangeStream {
        ChangeStream::new(self.sender.subscribe())
    }

    /// Get the number of current subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeSender {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
