//! Event Stream (§4.12): publishes execution lifecycle transitions to
//! subscribers, synchronously and in order from the driver's point of view.
//!
//! No teacher module owns a pub/sub mechanism, so this is a new construct.
//! A channel-per-subscriber (`tokio::sync::mpsc`) was chosen over
//! `tokio::sync::broadcast` because §4.12 requires that "delivery failures
//! to individual subscribers must not propagate" — with per-subscriber
//! channels a dropped receiver is detected and pruned independently, whereas
//! a broadcast channel's lagged-receiver semantics would entangle one slow
//! subscriber with the others.

use std::sync::Mutex;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::protocol::Execution;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Started,
    Updated,
    Paused,
    Resumed,
    Cancelled,
    Completed,
    Failed,
}

impl EventKind {
    /// The `execution:*` topic name used in §4.12's taxonomy.
    pub fn topic(&self) -> &'static str {
        match self {
            EventKind::Started => "execution:started",
            EventKind::Updated => "execution:updated",
            EventKind::Paused => "execution:paused",
            EventKind::Resumed => "execution:resumed",
            EventKind::Cancelled => "execution:cancelled",
            EventKind::Completed => "execution:completed",
            EventKind::Failed => "execution:failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Completed | EventKind::Failed | EventKind::Cancelled)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    pub kind: EventKind,
    pub execution: Execution,
}

#[derive(Default)]
pub struct EventStream {
    subscribers: Mutex<Vec<UnboundedSender<ExecutionEvent>>>,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<ExecutionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Publishes `kind` with a snapshot of `execution`. Prunes subscribers
    /// whose receiver has been dropped; never panics or returns an error —
    /// engine behavior must not depend on subscriber presence or success
    /// (§9, "Observation vs. action separation").
    pub fn emit(&self, kind: EventKind, execution: &Execution) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|tx| {
            tx.send(ExecutionEvent {
                kind,
                execution: execution.clone(),
            })
            .is_ok()
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}
