//! Event notification sink
//!
//! Renders each [`ChatEvent`] once and forwards it to every registered
//! observer in registration order. Dispatch is serialized, so all observers
//! see events in the same order they were emitted. A failing or panicking
//! observer is logged and skipped; the remaining observers still get the
//! event.
//!
//! Observers run outside the observer list lock and may subscribe or
//! unsubscribe from within `notify`. Changes apply from the next event on.
//! An observer must not emit events into the same sink.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::event::ChatEvent;

/// Error returned by an observer that could not handle a notification
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Receives rendered event notifications
pub trait Observer: Send + Sync {
    /// Handle one event. `line` is the event's one-line rendering.
    fn notify(&self, event: &ChatEvent, line: &str) -> Result<(), ObserverError>;
}

/// A rendered notification delivered through a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The typed event
    pub event: ChatEvent,
    /// One-line rendering
    pub line: String,
}

/// Observer that forwards notifications into an unbounded channel
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelObserver {
    /// Create an observer and the receiver it feeds
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Observer for ChannelObserver {
    fn notify(&self, event: &ChatEvent, line: &str) -> Result<(), ObserverError> {
        self.tx
            .send(Notification {
                event: event.clone(),
                line: line.to_string(),
            })
            .map_err(|_| "notification receiver dropped".into())
    }
}

/// Observer that writes notifications to the `tracing` log
#[derive(Debug, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn notify(&self, event: &ChatEvent, line: &str) -> Result<(), ObserverError> {
        tracing::info!(event = event.kind(), "{}", line);
        Ok(())
    }
}

/// Handle returned by [`EventSink::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Fan-out point for relay events
pub struct EventSink {
    observers: Mutex<Vec<(ObserverId, Arc<dyn Observer>)>>,
    /// Held for the whole of one dispatch to keep emission order
    dispatch: Mutex<()>,
    next_id: AtomicU64,
}

impl EventSink {
    /// Create a sink with no observers
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            dispatch: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer
    pub fn subscribe(&self, observer: Arc<dyn Observer>) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, observer));
        id
    }

    /// Register a channel observer and return its receiver
    pub fn subscribe_channel(&self) -> (ObserverId, mpsc::UnboundedReceiver<Notification>) {
        let (observer, rx) = ChannelObserver::new();
        (self.subscribe(Arc::new(observer)), rx)
    }

    /// Remove an observer; returns false if it was not registered
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver an event to every observer exactly once
    pub fn notify(&self, event: ChatEvent) {
        let line = event.to_string();
        let _dispatch = self
            .dispatch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let observers = self.lock().clone();

        tracing::trace!(event = event.kind(), observers = observers.len(), "Dispatching event");

        for (id, observer) in observers.iter() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| observer.notify(&event, &line)));

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(observer = id.0, event = event.kind(), error = %e, "Observer failed");
                }
                Err(_) => {
                    tracing::warn!(observer = id.0, event = event.kind(), "Observer panicked");
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ObserverId, Arc<dyn Observer>)>> {
        self.observers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}
