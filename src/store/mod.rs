//! Execution Store (§4.11): an in-memory `executionId -> Execution`
//! registry with a background sweeper doing a TTL pass then a size pass.
//!
//! Holds each execution behind its own `Arc<Mutex<Execution>>` rather than
//! owned values, so the same handle the DAG Scheduler mutates while driving
//! an execution is the one `getExecution` reads — no separate sync step is
//! needed to keep the store current while a driver is running.
//!
//! No teacher module owns a keyed, swept registry — the teacher is a
//! one-shot CLI runner with no persistent execution history. Grounded
//! instead on the shape of the teacher's `limits/mod.rs::RetryCounter`
//! (an `Arc`-shareable, lock-guarded piece of process-wide state) for the
//! "simple shared state behind a single lock" texture, generalized here to
//! a `tokio::sync::Mutex<HashMap<..>>` since inserts/removals always pair
//! with a scan.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::protocol::Execution;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub cleanup_interval: Duration,
    pub cleanup_ttl: Duration,
    pub cleanup_max_executions: usize,
}

#[derive(Clone)]
pub struct ExecutionStore {
    executions: Arc<Mutex<HashMap<String, Arc<Mutex<Execution>>>>>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self {
            executions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a fresh execution and returns the live handle the caller
    /// (the Engine Façade) hands to the DAG Scheduler. A plain overwrite is
    /// correct for a pre-existing id since a given id is only ever owned by
    /// one driver at a time (§3, "Ownership").
    pub async fn insert(&self, execution: Execution) -> Arc<Mutex<Execution>> {
        let handle = Arc::new(Mutex::new(execution));
        let id = handle.lock().await.id.clone();
        self.executions.lock().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, id: &str) -> Option<Execution> {
        let handle = self.executions.lock().await.get(id).cloned()?;
        Some(handle.lock().await.clone())
    }

    /// The live handle backing `id`, for callers (the Façade) that need to
    /// act on the same execution the scheduler is mutating.
    pub async fn get_handle(&self, id: &str) -> Option<Arc<Mutex<Execution>>> {
        self.executions.lock().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> Option<Execution> {
        let handle = self.executions.lock().await.remove(id)?;
        Some(handle.lock().await.clone())
    }

    pub async fn non_terminal_ids(&self) -> Vec<String> {
        let executions = self.executions.lock().await.clone();
        let mut ids = Vec::new();
        for (id, handle) in executions {
            if !handle.lock().await.status.is_terminal() {
                ids.push(id);
            }
        }
        ids
    }

    pub async fn len(&self) -> usize {
        self.executions.lock().await.len()
    }

    /// One sweep: TTL pass, then size pass (§4.11). Exposed standalone so
    /// the background sweeper and tests can both drive it deterministically.
    pub async fn sweep(&self, ttl: Duration, max_executions: usize) {
        let now = chrono::Utc::now();
        let mut executions = self.executions.lock().await;

        let mut snapshots: Vec<(String, Execution)> = Vec::new();
        for (id, handle) in executions.iter() {
            snapshots.push((id.clone(), handle.lock().await.clone()));
        }

        let expired: Vec<String> = snapshots
            .iter()
            .filter(|(_, e)| {
                e.status.is_terminal()
                    && e.completed_at
                        .map(|completed| now.signed_duration_since(completed).to_std().unwrap_or_default() > ttl)
                        .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            executions.remove(id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "execution store: TTL pass evicted executions");
        }

        if executions.len() > max_executions {
            let mut terminal: Vec<(String, chrono::DateTime<chrono::Utc>)> = snapshots
                .into_iter()
                .filter(|(id, _)| executions.contains_key(id))
                .filter(|(_, e)| e.status.is_terminal())
                .map(|(id, e)| (id, e.completed_at.unwrap_or(now)))
                .collect();
            terminal.sort_by_key(|(_, completed_at)| *completed_at);
            let overflow = executions.len() - max_executions;
            for (id, _) in terminal.into_iter().take(overflow) {
                executions.remove(&id);
            }
        }
    }
}

impl Default for ExecutionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the sweeper's background task; dropping/`stop()`-ing aborts it,
/// matching §4.11's "destroy() must stop the sweeper and free its timer".
pub struct Sweeper {
    handle: JoinHandle<()>,
}

impl Sweeper {
    pub fn spawn(store: ExecutionStore, config: StoreConfig) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(config.cleanup_interval);
            loop {
                interval.tick().await;
                store.sweep(config.cleanup_ttl, config.cleanup_max_executions).await;
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ExecutionStatus, Mode};
    use chrono::Utc;

    fn terminal_execution(id: &str, completed_at: chrono::DateTime<Utc>) -> Execution {
        let mut execution = Execution::new("scenario", Mode::Simulation, None);
        execution.id = id.to_string();
        execution.status = ExecutionStatus::Completed;
        execution.completed_at = Some(completed_at);
        execution
    }

    #[tokio::test]
    async fn ttl_pass_evicts_only_expired_terminal_executions() {
        let store = ExecutionStore::new();
        let now = Utc::now();
        store.insert(terminal_execution("old", now - chrono::Duration::minutes(40))).await;
        store.insert(terminal_execution("fresh", now)).await;

        store.sweep(Duration::from_secs(30 * 60), 50).await;

        assert!(store.get("old").await.is_none());
        assert!(store.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn size_pass_evicts_oldest_terminal_first() {
        let store = ExecutionStore::new();
        let now = Utc::now();
        for (id, age_minutes) in [("a", 3), ("b", 2), ("c", 1), ("d", 0)] {
            store.insert(terminal_execution(id, now - chrono::Duration::minutes(age_minutes))).await;
        }

        store.sweep(Duration::from_secs(30 * 60), 2).await;

        assert_eq!(store.len().await, 2);
        assert!(store.get("c").await.is_some());
        assert!(store.get("d").await.is_some());
        assert!(store.get("a").await.is_none());
        assert!(store.get("b").await.is_none());
    }

    #[tokio::test]
    async fn non_terminal_executions_are_never_evicted_by_either_pass() {
        let store = ExecutionStore::new();
        let mut running = Execution::new("scenario", Mode::Simulation, None);
        running.id = "running".into();
        running.status = ExecutionStatus::Running;
        store.insert(running).await;

        store.sweep(Duration::from_secs(0), 0).await;

        assert!(store.get("running").await.is_some());
    }

    #[tokio::test]
    async fn sweeper_stop_aborts_the_background_task() {
        let store = ExecutionStore::new();
        let sweeper = Sweeper::spawn(
            store.clone(),
            StoreConfig {
                cleanup_interval: Duration::from_millis(5),
                cleanup_ttl: Duration::from_secs(1800),
                cleanup_max_executions: 50,
            },
        );
        sweeper.stop();
    }
}
