// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Publish/subscribe event bus with wildcard dot-delimited topic matching.
//!
//! No teacher precedent exists for wildcard topics; the channel/delivery-
//! worker shape here follows `sven-core`'s `tokio::spawn`/`mpsc` idioms and
//! is supplemented by the broadcast-bus delivery pattern used elsewhere in
//! the retrieval pack.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

/// A dot-delimited routing key, e.g. `"task.progress.p1.t1"`.
pub type Topic = String;

/// A topic with `*` whole-component wildcards, e.g. `"task.progress.*.*"`.
pub type Pattern = String;

/// Returns `true` iff `pattern` matches `topic`: same component count, and
/// every non-`*` component of `pattern` equals the corresponding component
/// of `topic`. A pattern with no `*` matches only the identical topic.
pub fn pattern_matches(pattern: &str, topic: &str) -> bool {
    let p: Vec<&str> = pattern.split('.').collect();
    let t: Vec<&str> = topic.split('.').collect();
    if p.len() != t.len() {
        return false;
    }
    p.iter().zip(t.iter()).all(|(pc, tc)| *pc == "*" || pc == tc)
}

#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: Topic,
    pub payload: serde_json::Value,
}

pub type SubscriptionId = u64;

struct Subscriber {
    pattern: Pattern,
    sender: mpsc::Sender<BusMessage>,
    cancel: Arc<tokio::sync::Notify>,
}

/// A publish/subscribe bus. `Publish` never blocks: a subscriber whose
/// bounded buffer is full simply drops that message (back-pressure by
/// shedding). `Subscribe` spawns one delivery worker per subscription that
/// drains its buffer FIFO into the handler; ordering is guaranteed within a
/// subscription, not across subscriptions.
pub struct EventBus {
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl EventBus {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer_size,
        }
    }

    /// Publish `payload` on `topic`. Rejects an empty topic. Performs a
    /// non-blocking enqueue onto each matching subscriber's buffer; a full
    /// buffer drops the message for that subscriber only.
    pub fn publish(&self, topic: impl Into<String>, payload: serde_json::Value) -> Result<(), String> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err("topic must not be empty".to_string());
        }
        let subscribers = self.subscribers.read().expect("event bus lock poisoned");
        for sub in subscribers.values() {
            if pattern_matches(&sub.pattern, &topic) {
                let _ = sub.sender.try_send(BusMessage {
                    topic: topic.clone(),
                    payload: payload.clone(),
                });
            }
        }
        Ok(())
    }

    /// Subscribe `handler` to every topic matching `pattern`. Spawns a
    /// single delivery worker that drains the buffer FIFO, isolating
    /// handler panics so one subscriber's misbehavior cannot take down the
    /// bus or another subscription.
    pub fn subscribe<F>(&self, pattern: impl Into<String>, mut handler: F) -> Result<SubscriptionId, String>
    where
        F: FnMut(BusMessage) + Send + 'static,
    {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err("pattern must not be empty".to_string());
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::channel::<BusMessage>(self.buffer_size);
        let cancel = Arc::new(tokio::sync::Notify::new());
        let worker_cancel = Arc::clone(&cancel);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = worker_cancel.notified() => break,
                    msg = rx.recv() => {
                        match msg {
                            Some(m) => {
                                // Isolate the handler: a panic here must not
                                // take down the delivery worker or the bus.
                                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                    handler(m);
                                }));
                                if result.is_err() {
                                    tracing::warn!("event bus subscriber handler panicked");
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        });

        self.subscribers
            .write()
            .expect("event bus lock poisoned")
            .insert(id, Subscriber { pattern, sender: tx, cancel });
        Ok(id)
    }

    /// Idempotent: cancels the delivery worker and removes the subscription.
    /// Calling this twice on the same id is safe.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self.subscribers.write().expect("event bus lock poisoned").remove(&id);
        if let Some(sub) = removed {
            sub.cancel.notify_one();
        }
    }

    /// Cancel every subscription, as happens when the bus itself closes.
    pub fn close(&self) {
        let mut subscribers = self.subscribers.write().expect("event bus lock poisoned");
        for (_, sub) in subscribers.drain() {
            sub.cancel.notify_one();
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
