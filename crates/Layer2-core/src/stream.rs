//! Stream topics
//!
//! Per-context pub/sub for streaming output (model chunks, progress).
//! Every subscriber gets its own `NonBlockingBuffer`, so `publish` never
//! waits on any subscriber, however slow, and works with none at all.

use forgeloop_foundation::NonBlockingBuffer;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::trace;

/// Topic model clients stream their output to.
pub const MODEL_TOPIC: &str = "model";

/// One published piece of streamed output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub topic: String,
    /// Name of the context that published the chunk.
    pub source: String,
    pub content: String,
}

struct Subscriber {
    id: u64,
    buffer: NonBlockingBuffer<StreamChunk>,
}

#[derive(Default)]
struct HubInner {
    topics: Mutex<HashMap<String, Vec<Arc<Subscriber>>>>,
    next_id: AtomicU64,
    closed: Mutex<bool>,
}

/// Topic registry owned by an execution context.
#[derive(Clone, Default)]
pub struct StreamHub {
    inner: Arc<HubInner>,
}

/// Removes one subscription from its topic.
pub struct Unsubscribe {
    hub: Weak<HubInner>,
    topic: String,
    id: u64,
}

impl Unsubscribe {
    /// Detach the subscriber and close its channel. Chunks already queued
    /// are still delivered.
    pub fn unsubscribe(self) {
        let Some(hub) = self.hub.upgrade() else {
            return;
        };
        let mut topics = hub.topics.lock();
        if let Some(subscribers) = topics.get_mut(&self.topic) {
            if let Some(pos) = subscribers.iter().position(|s| s.id == self.id) {
                let subscriber = subscribers.remove(pos);
                subscriber.buffer.close();
            }
            if subscribers.is_empty() {
                topics.remove(&self.topic);
            }
        }
    }
}

impl StreamHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `topic`. After `close_all` the returned channel is
    /// already closed.
    pub fn subscribe(&self, topic: &str) -> (mpsc::Receiver<StreamChunk>, Unsubscribe) {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let buffer = NonBlockingBuffer::new();
        // A fresh buffer always still has its receiver.
        let receiver = match buffer.take_receiver() {
            Some(rx) => rx,
            None => mpsc::channel(1).1,
        };

        let closed = self.inner.closed.lock();
        if *closed {
            buffer.close();
        } else {
            self.inner
                .topics
                .lock()
                .entry(topic.to_string())
                .or_default()
                .push(Arc::new(Subscriber { id, buffer }));
        }
        drop(closed);

        trace!(topic, subscriber = id, "Subscribed to topic");
        (
            receiver,
            Unsubscribe {
                hub: Arc::downgrade(&self.inner),
                topic: topic.to_string(),
                id,
            },
        )
    }

    /// Deliver a chunk to every current subscriber of its topic.
    pub fn publish(&self, chunk: StreamChunk) {
        let subscribers = match self.inner.topics.lock().get(&chunk.topic) {
            Some(subscribers) => subscribers.clone(),
            None => return,
        };
        for subscriber in subscribers {
            subscriber.buffer.send(chunk.clone());
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Close every topic. Later subscriptions receive closed channels and
    /// later publishes are dropped.
    pub fn close_all(&self) {
        let mut closed = self.inner.closed.lock();
        *closed = true;
        let topics = std::mem::take(&mut *self.inner.topics.lock());
        drop(closed);

        for subscriber in topics.into_values().flatten() {
            subscriber.buffer.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.lock()
    }
}
