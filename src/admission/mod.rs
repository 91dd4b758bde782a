//! Admission Controller (§4.9): process-wide bounded concurrency with a FIFO
//! waiter queue.
//!
//! Grounded on the teacher's `planner/mod.rs`, which already reaches for
//! `tokio::sync::Semaphore` to bound `max_parallel` *within* one execution's
//! wave; this module generalizes the same primitive to bound concurrent
//! *executions* process-wide, which is the scope §4.9 actually calls for.
//! `tokio::sync::Semaphore` grants permits in FIFO order by construction,
//! which is exactly the ordering guarantee §4.9/§8 require.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// An acquired slot. Dropping it releases capacity — this is what makes
/// release "guaranteed-to-run" on any driver exit path (§4.9) without a
/// manual cleanup call.
pub struct AdmissionSlot {
    _permit: OwnedSemaphorePermit,
}

#[derive(Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
}

impl AdmissionController {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    /// Returns immediately if capacity is available; otherwise enqueues as a
    /// FIFO waiter until a slot frees up.
    pub async fn acquire(&self) -> AdmissionSlot {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore is never closed");
        AdmissionSlot { _permit: permit }
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
