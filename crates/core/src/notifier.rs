//! Single-subscriber event channel from the core to the front end.
//!
//! A subscription is an unbounded channel. Subscribing again closes the
//! previous channel and opens a new one under the same lock; publishing with
//! no live subscriber drops the event.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::origin::OriginContext;

/// Events the core itself publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum CoreEvent {
    MigrationStarted { from: String, to: String },
    MigrationProgress { entry: String, done: usize, total: usize },
    MigrationFinished { root: String },
    /// Ends a started migration that did not complete; the old root stays
    /// current.
    MigrationFailed { error: String },
}

impl CoreEvent {
    /// Wire form handed to subscribers.
    pub fn to_payload(&self) -> String {
        // Plain string fields only; serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Receiving end of a subscription.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<String>,
}

impl EventStream {
    /// Next event, or `None` once this subscription has been replaced or
    /// cancelled and its backlog is drained.
    pub async fn next(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Blocking variant for callers outside the async runtime.
    pub fn blocking_next(&mut self) -> Option<String> {
        self.rx.blocking_recv()
    }

    pub fn try_next(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

#[derive(Default)]
pub struct EventNotifier {
    sink: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new subscriber, closing the previous one.
    pub fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let previous = self.lock_sink().replace(tx);
        if previous.is_some() {
            debug!("Replaced event subscriber");
        }
        EventStream { rx }
    }

    /// Attach a callback sink; events are delivered on `origin`.
    ///
    /// The forwarding task ends when the subscription is replaced or
    /// cancelled.
    pub fn subscribe_on<F>(&self, runtime: &Handle, origin: OriginContext, sink: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let mut stream = self.subscribe();
        let sink = Arc::new(sink);
        runtime.spawn(async move {
            while let Some(event) = stream.next().await {
                let sink = Arc::clone(&sink);
                if !origin.post(move || (*sink)(event)) {
                    break;
                }
            }
        });
    }

    /// Detach the current subscriber, if any.
    pub fn unsubscribe(&self) {
        if self.lock_sink().take().is_some() {
            debug!("Event subscriber detached");
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.lock_sink().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver `event` to the current subscriber.
    ///
    /// Returns whether a live subscriber accepted it. The lock covers only
    /// reading the sink, never the delivery.
    pub fn publish(&self, event: impl Into<String>) -> bool {
        let sink = self.lock_sink().clone();
        let Some(tx) = sink else {
            trace!("No event subscriber, dropping event");
            return false;
        };

        if tx.send(event.into()).is_ok() {
            return true;
        }

        // The receiver went away without unsubscribing; clear it unless a
        // newer subscriber took its place meanwhile.
        let mut current = self.lock_sink();
        if current.as_ref().is_some_and(|cur| cur.same_channel(&tx)) {
            *current = None;
        }
        false
    }

    pub fn publish_event(&self, event: &CoreEvent) -> bool {
        self.publish(event.to_payload())
    }

    fn lock_sink(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
