//! Step Runner (§4.6): drives exactly one step end to end — guard check,
//! delay gate, template resolution, the iteration loop against the
//! Requester, extraction, assertion evaluation, and retry/classification.
//!
//! No teacher module owns this shape as a single function (the teacher's
//! `executors/http.rs::StepExecutor::execute` covers request/extract/assert
//! for one attempt with no retry or guard logic of its own — retries live
//! separately in its `retry/mod.rs`). This module composes those two
//! teacher concerns into the single attempt-loop this spec calls for.
//!
//! `Execution` and `Context` are shared across every Step Runner in a wave
//! (the DAG Scheduler runs a wave's steps concurrently), so both are passed
//! in behind the same lock shapes the teacher's `planner/mod.rs` uses for
//! its concurrent DAG nodes: `Arc<Mutex<..>>` for the append-mostly
//! Execution, `Arc<RwLock<..>>` for the read-heavy Context. Locks are held
//! only across the small mutation, never across a network call — the
//! iteration loop's `requester.perform` call runs lock-free.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::assertions;
use crate::context::Context;
use crate::events::{EventKind, EventStream};
use crate::extract;
use crate::protocol::{Body, Execution, Step, StepResult, StepStatus, When};
use crate::requester::{RequestError, Requester, ResolvedRequest, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

/// Runs `step` to completion, mutating `execution` (appending/overwriting its
/// single StepResult) and `context` (extracted variables), emitting
/// `execution:updated` at every transition §4.6 names.
#[tracing::instrument(skip_all, fields(step_id = %step.id))]
pub async fn run_step(
    step: &Step,
    execution: &Arc<Mutex<Execution>>,
    context: &Arc<RwLock<Context>>,
    requester: &Arc<dyn Requester>,
    cancel: &CancellationToken,
    events: &Arc<EventStream>,
) -> StepOutcome {
    if let Some(when) = &step.when {
        let skip = {
            let exec = execution.lock().await;
            guard_says_skip(when, &exec)
        };
        if skip {
            let mut exec = execution.lock().await;
            exec.steps.push(StepResult::new_skipped(step.id.clone()));
            events.emit(EventKind::Updated, &exec);
            return StepOutcome::Skipped;
        }
    }

    {
        let mut exec = execution.lock().await;
        exec.steps.push(StepResult::new_running(step.id.clone()));
        events.emit(EventKind::Updated, &exec);
    }

    let max_attempts = step.retries + 1;

    for attempt in 1..=max_attempts {
        tracing::debug!(step_id = %step.id, attempt, max_attempts, "attempt starting");
        {
            let mut exec = execution.lock().await;
            if let Some(result) = exec.find_step_result_mut(&step.id) {
                result.attempts = attempt;
            }
        }

        if cancel.is_cancelled() {
            return finish(execution, &step.id, StepStatus::Cancelled, None, events).await;
        }
        let delay_ms = if step.jitter > 0 {
            step.delay_ms + rand::thread_rng().gen_range(0..step.jitter)
        } else {
            step.delay_ms
        };
        if delay_ms > 0 {
            tracing::debug!(step_id = %step.id, attempt, delay_ms, "delaying before attempt");
            tokio::select! {
                _ = cancel.cancelled() => {
                    return finish(execution, &step.id, StepStatus::Cancelled, None, events).await;
                }
                _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
            }
        }

        let request = {
            let ctx = context.read().await;
            resolve_request(step, &ctx)
        };

        let iteration_result = run_iterations(step, &request, requester.as_ref(), cancel).await;
        let response = match iteration_result {
            IterationOutcome::Cancelled => {
                return finish(execution, &step.id, StepStatus::Cancelled, None, events).await;
            }
            IterationOutcome::Response(response) => response,
            IterationOutcome::Error(err) => {
                if attempt == max_attempts {
                    return finish(
                        execution,
                        &step.id,
                        StepStatus::Failed,
                        Some(err.to_string()),
                        events,
                    )
                    .await;
                }
                tracing::warn!(
                    step_id = %step.id, attempt, max_attempts, error = %err,
                    "attempt failed, retrying"
                );
                continue;
            }
        };

        {
            let extracted = extract::extract(&step.extract, &response);
            let mut ctx = context.write().await;
            ctx.extend(extracted);
        }

        let results = assertions::evaluate(&step.expect, &response);
        let passed = assertions::all_passed(&results);
        {
            let mut exec = execution.lock().await;
            if let Some(result) = exec.find_step_result_mut(&step.id) {
                result.assertions = Some(results.clone());
            }
        }

        if passed {
            return finish(execution, &step.id, StepStatus::Completed, None, events).await;
        }
        if attempt < max_attempts {
            tracing::warn!(
                step_id = %step.id, attempt, max_attempts,
                reason = %assertions::failure_summary(&results),
                "assertions failed, retrying"
            );
            continue;
        }
        let message = assertions::failure_summary(&results);
        return finish(execution, &step.id, StepStatus::Failed, Some(message), events).await;
    }

    unreachable!("retries + 1 >= 1, so the attempt loop always returns")
}

fn guard_says_skip(when: &When, execution: &Execution) -> bool {
    let Some(result) = execution.find_step_result(&when.step) else {
        return true;
    };
    let succeeded_mismatch = when
        .succeeded
        .is_some_and(|expected| (result.status == StepStatus::Completed) != expected);
    let status_mismatch = when.status.is_some_and(|expected| {
        let actual_status = result
            .assertions
            .as_ref()
            .and_then(|assertions| assertions.iter().find(|a| a.field == "status"))
            .and_then(|a| a.actual.as_i64());
        actual_status != Some(expected)
    });
    succeeded_mismatch || status_mismatch
}

enum IterationOutcome {
    Response(Response),
    Error(RequestError),
    Cancelled,
}

/// Runs the `1..=iterations` loop for one attempt (§4.6.3.d). The last
/// successful response wins; a non-cancel error on the final iteration with
/// no prior success surfaces to the attempt loop.
async fn run_iterations(
    step: &Step,
    request: &ResolvedRequest,
    requester: &dyn Requester,
    cancel: &CancellationToken,
) -> IterationOutcome {
    let iterations = step.iterations.max(1);
    let mut last_response = None;
    let mut last_error = None;

    for i in 1..=iterations {
        match requester.perform(request, cancel).await {
            Ok(response) => {
                last_response = Some(response);
                last_error = None;
            }
            Err(RequestError::Cancelled) => return IterationOutcome::Cancelled,
            Err(e) => {
                last_error = Some(e);
                if i == iterations && last_response.is_none() {
                    break;
                }
            }
        }
    }

    match (last_response, last_error) {
        (Some(response), _) => IterationOutcome::Response(response),
        (None, Some(err)) => IterationOutcome::Error(err),
        (None, None) => unreachable!("iterations >= 1 always calls perform at least once"),
    }
}

/// Resolves URL (plus query params, appended through `reqwest::Url` so
/// percent-encoding comes from the `url` crate reqwest already depends on —
/// no separate encoding dependency needed), headers, and body (§4.6.3.c).
fn resolve_request(step: &Step, context: &Context) -> ResolvedRequest {
    let url = resolve_url(step, context);
    let headers = step
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), context.interpolate_str(value)))
        .collect();
    let body = step.body.as_ref().map(|body| match body {
        Body::Raw(text) => Body::Raw(context.interpolate_str(text)),
        Body::Structured(value) => Body::Structured(context.interpolate_value(value)),
    });
    ResolvedRequest {
        method: step.method,
        url,
        headers,
        body,
    }
}

fn resolve_url(step: &Step, context: &Context) -> String {
    let base = context.interpolate_str(&step.url);
    if step.query.is_empty() {
        return base;
    }
    match reqwest::Url::parse(&base) {
        Ok(mut url) => {
            {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in &step.query {
                    pairs.append_pair(&context.interpolate_str(key), &context.interpolate_str(value));
                }
            }
            url.to_string()
        }
        Err(_) => base,
    }
}

async fn finish(
    execution: &Arc<Mutex<Execution>>,
    step_id: &str,
    status: StepStatus,
    error: Option<String>,
    events: &Arc<EventStream>,
) -> StepOutcome {
    let mut exec = execution.lock().await;
    let now = Utc::now();
    if let Some(result) = exec.find_step_result_mut(step_id) {
        result.status = status;
        result.completed_at = Some(now);
        result.duration_ms = result
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0) as u64);
        result.error = error;
    }
    if status == StepStatus::Completed {
        exec.passed_steps += 1;
    }
    tracing::debug!(step_id = %step_id, ?status, "step finished");
    events.emit(EventKind::Updated, &exec);
    match status {
        StepStatus::Completed => StepOutcome::Completed,
        StepStatus::Failed => StepOutcome::Failed,
        StepStatus::Cancelled => StepOutcome::Cancelled,
        StepStatus::Skipped => StepOutcome::Skipped,
        StepStatus::Pending | StepStatus::Running => {
            unreachable!("finish() is only called with a terminal step status")
        }
    }
}
