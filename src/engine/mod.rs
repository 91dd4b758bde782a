//! Engine Façade (§6): the single entry point consumers use to start,
//! observe, and control executions. Owns the Catalog, the Execution Store,
//! the Admission Controller, the Event Stream and a per-execution registry
//! of Control Planes, and spawns one driver task per execution.
//!
//! No teacher module owns this shape — the teacher's `main.rs` wires a
//! single plan's executors, planner, and reporter together once per
//! process and exits. This façade generalizes that wiring into a
//! long-lived, multi-execution object, grounded on the teacher's top-level
//! `main.rs` orchestration order (load -> validate -> plan -> execute ->
//! report) for the sequence `start_scenario` performs per call.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::admission::AdmissionController;
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::context::Context;
use crate::control::ControlPlane;
use crate::errors::EngineError;
use crate::events::EventStream;
use crate::protocol::{Execution, Mode};
use crate::requester::Requester;
use crate::scheduler;
use crate::store::{ExecutionStore, Sweeper};

/// Registry of live control planes, keyed by execution id. Entries are
/// removed as soon as a driver exits, so `pause_execution`/`resume_execution`
/// against a terminal execution correctly fail rather than acting on a stale
/// handle (§4.8).
type Controls = Arc<Mutex<HashMap<String, ControlPlane>>>;

pub struct Engine {
    catalog: Arc<dyn Catalog>,
    store: ExecutionStore,
    admission: AdmissionController,
    events: Arc<EventStream>,
    requester: Arc<dyn Requester>,
    controls: Controls,
    sweeper: Option<Sweeper>,
}

impl Engine {
    pub fn new(catalog: Arc<dyn Catalog>, requester: Arc<dyn Requester>, config: EngineConfig) -> Self {
        let store = ExecutionStore::new();
        let sweeper = Sweeper::spawn(
            store.clone(),
            crate::store::StoreConfig {
                cleanup_interval: config.cleanup_interval,
                cleanup_ttl: config.cleanup_ttl,
                cleanup_max_executions: config.cleanup_max_executions,
            },
        );
        Self {
            catalog,
            store,
            admission: AdmissionController::new(config.max_concurrency),
            events: Arc::new(EventStream::new()),
            requester,
            controls: Arc::new(Mutex::new(HashMap::new())),
            sweeper: Some(sweeper),
        }
    }

    pub fn events(&self) -> Arc<EventStream> {
        self.events.clone()
    }

    /// `startScenario`: looks the scenario up, registers a fresh pending
    /// execution, and spawns its driver. The driver acquires its admission
    /// slot itself so `start_scenario` returns immediately even when the
    /// engine is already at capacity (§4.9: callers observe `pending` while
    /// queued, not a blocked call).
    pub async fn start_scenario(
        &self,
        scenario_id: &str,
        mode: Mode,
        trigger_data: Option<serde_json::Value>,
    ) -> Result<String, EngineError> {
        let scenario = self
            .catalog
            .get_scenario(scenario_id)
            .await
            .ok_or_else(|| EngineError::ScenarioNotFound { scenario_id: scenario_id.to_string() })?;

        let execution = Execution::new(scenario.id.clone(), mode, trigger_data);
        let execution_id = execution.id.clone();
        let handle = self.store.insert(execution).await;

        let control = ControlPlane::new();
        self.controls.lock().await.insert(execution_id.clone(), control.clone());

        tracing::info!(execution_id = %execution_id, scenario_id = %scenario_id, ?mode, "execution queued");

        let context = Arc::new(RwLock::new(Context::new()));
        let admission = self.admission.clone();
        let requester = self.requester.clone();
        let events = self.events.clone();
        let controls = self.controls.clone();
        let id_for_cleanup = execution_id.clone();

        tokio::spawn(async move {
            let _slot = admission.acquire().await;
            scheduler::drive(&scenario, handle, context, requester, control, events).await;
            controls.lock().await.remove(&id_for_cleanup);
        });

        Ok(execution_id)
    }

    pub async fn get_execution(&self, execution_id: &str) -> Option<Execution> {
        self.store.get(execution_id).await
    }

    /// Legal only while `status == running` (§4.8). Returns `false` for an
    /// unknown or already-terminal/paused execution.
    pub async fn pause_execution(&self, execution_id: &str) -> bool {
        let Some(execution) = self.store.get(execution_id).await else { return false };
        if execution.status != crate::protocol::ExecutionStatus::Running {
            return false;
        }
        let Some(control) = self.controls.lock().await.get(execution_id).cloned() else { return false };
        control.request_pause();
        true
    }

    /// Legal only while `status == paused`.
    pub async fn resume_execution(&self, execution_id: &str) -> bool {
        let Some(execution) = self.store.get(execution_id).await else { return false };
        if execution.status != crate::protocol::ExecutionStatus::Paused {
            return false;
        }
        let Some(control) = self.controls.lock().await.get(execution_id).cloned() else { return false };
        control.request_resume();
        true
    }

    /// Legal while `status ∈ {pending, running, paused}` (§4.8).
    pub async fn cancel_execution(&self, execution_id: &str) -> bool {
        let Some(execution) = self.store.get(execution_id).await else { return false };
        if execution.status.is_terminal() {
            return false;
        }
        let Some(control) = self.controls.lock().await.get(execution_id).cloned() else { return false };
        tracing::info!(execution_id = %execution_id, "cancel requested");
        control.request_cancel();
        true
    }

    /// Cancels `execution_id` if still active, then starts a fresh execution
    /// of the same scenario with `parent_execution_id` set to the original
    /// (§6). Returns `None` if the original execution is unknown.
    pub async fn restart_execution(&self, execution_id: &str) -> Option<String> {
        let original = self.store.get(execution_id).await?;
        if !original.status.is_terminal() {
            self.cancel_execution(execution_id).await;
        }

        let scenario = self.catalog.get_scenario(&original.scenario_id).await?;
        let mut execution = Execution::new(scenario.id.clone(), original.mode, original.trigger_data.clone());
        execution.parent_execution_id = Some(execution_id.to_string());
        let new_id = execution.id.clone();
        let handle = self.store.insert(execution).await;

        let control = ControlPlane::new();
        self.controls.lock().await.insert(new_id.clone(), control.clone());

        let context = Arc::new(RwLock::new(Context::new()));
        let admission = self.admission.clone();
        let requester = self.requester.clone();
        let events = self.events.clone();
        let controls = self.controls.clone();
        let id_for_cleanup = new_id.clone();

        tokio::spawn(async move {
            let _slot = admission.acquire().await;
            scheduler::drive(&scenario, handle, context, requester, control, events).await;
            controls.lock().await.remove(&id_for_cleanup);
        });

        Some(new_id)
    }

    pub async fn pause_all(&self) -> usize {
        let mut count = 0;
        for id in self.store.non_terminal_ids().await {
            if self.pause_execution(&id).await {
                count += 1;
            }
        }
        count
    }

    pub async fn resume_all(&self) -> usize {
        let mut count = 0;
        for id in self.store.non_terminal_ids().await {
            if self.resume_execution(&id).await {
                count += 1;
            }
        }
        count
    }

    pub async fn cancel_all(&self) -> usize {
        let mut count = 0;
        for id in self.store.non_terminal_ids().await {
            if self.cancel_execution(&id).await {
                count += 1;
            }
        }
        count
    }

    /// Stops the background sweeper. Does not cancel in-flight executions —
    /// their driver tasks keep running to their own terminal state (§6).
    pub fn destroy(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.stop();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.destroy();
    }
}
