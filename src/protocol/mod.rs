//! Data model: Scenario (input, immutable), Execution (state, mutable), and the
//! result types that get appended to an execution as its steps run.
//!
//! Serde derives follow the same convention as the rest of the crate: field
//! names are `snake_case` on the Rust side and camelCase on the wire, matching
//! how a Catalog collaborator or Broadcaster would naturally hand these
//! structures across a process boundary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A declarative plan: id, name, ordered steps with their request and
/// flow-control clauses. Immutable once handed to the engine by a Catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// HTTP method, restricted to the set the Requester is contracted to support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

/// A request body: either a raw templated string or a structured JSON value
/// whose string leaves get template-resolved before serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    Raw(String),
    Structured(Value),
}

/// The `expect` block: any subset of the fixed assertion vocabulary, each
/// clause optional. Order of evaluation is fixed by the Assertion Evaluator,
/// not by field declaration order here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expect {
    pub status: Option<u16>,
    pub blocked: Option<bool>,
    pub body_contains: Option<String>,
    pub body_not_contains: Option<String>,
    pub header_present: Option<String>,
    /// Preserves insertion order: header name (original casing) -> expected value.
    #[serde(default)]
    pub header_equals: IndexMap<String, String>,
}

impl Expect {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.blocked.is_none()
            && self.body_contains.is_none()
            && self.body_not_contains.is_none()
            && self.header_present.is_none()
            && self.header_equals.is_empty()
    }
}

/// `from ∈ {body, header, status}` with an optional dot-path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractFrom {
    Body,
    Header,
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRule {
    pub from: ExtractFrom,
    #[serde(default)]
    pub path: Option<String>,
}

/// Guard referencing another step's outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct When {
    pub step: String,
    #[serde(default)]
    pub succeeded: Option<bool>,
    #[serde(default)]
    pub status: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stage: Option<String>,

    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Body>,
    #[serde(default)]
    pub query: HashMap<String, String>,

    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub jitter: u64,
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    #[serde(default)]
    pub expect: Expect,
    #[serde(default)]
    pub extract: HashMap<String, ExtractRule>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub when: Option<When>,
}

fn default_iterations() -> u32 {
    1
}

/// Execution mode. `Assessment` additionally computes a scored report on
/// completion (§4.10); `Simulation` does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Simulation,
    Assessment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Skipped,
}

impl StepStatus {
    /// The statuses that unblock dependents in the DAG Scheduler (§3 invariants, §4.7).
    pub fn is_terminal_step_status(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed
                | StepStatus::Failed
                | StepStatus::Skipped
                | StepStatus::Cancelled
        )
    }
}

/// One assertion clause's outcome. `field` is the stable name used by §4.5:
/// `status`, `blocked`, `bodyContains`, `bodyNotContains`, `headerPresent`, or
/// `headerEquals.<name>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub field: String,
    pub expected: Value,
    pub actual: Value,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub attempts: u32,
    #[serde(default)]
    pub assertions: Option<Vec<AssertionResult>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StepResult {
    pub fn new_running(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Running,
            started_at: Some(Utc::now()),
            completed_at: None,
            duration_ms: None,
            attempts: 0,
            assertions: None,
            error: None,
        }
    }

    pub fn new_skipped(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Skipped,
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            duration_ms: Some(0),
            attempts: 0,
            assertions: None,
            error: None,
        }
    }
}

/// Snapshot taken when an execution is paused (§3 Execution.pausedState).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PausedState {
    pub pending: Vec<String>,
    pub completed: Vec<String>,
    pub context: HashMap<String, Option<Value>>,
    pub passed_steps: u32,
    pub steps_so_far: Vec<StepResult>,
}

/// Assessment-mode scoring report (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub score: u32,
    pub passed: bool,
    pub summary: String,
    pub artifacts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub scenario_id: String,
    pub mode: Mode,
    #[serde(default)]
    pub parent_execution_id: Option<String>,
    #[serde(default)]
    pub trigger_data: Option<Value>,

    pub status: ExecutionStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<u64>,

    #[serde(default)]
    pub steps: Vec<StepResult>,
    #[serde(default)]
    pub context: HashMap<String, Option<Value>>,
    #[serde(default)]
    pub passed_steps: u32,
    #[serde(default)]
    pub paused_state: Option<PausedState>,
    #[serde(default)]
    pub report: Option<Report>,
    /// Driver-level diagnostic (deadlock, internal invariant) — not named as
    /// a distinct field by the data model, but §7 requires these to surface
    /// on the execution itself rather than on any single StepResult.
    #[serde(default)]
    pub error: Option<String>,
}

impl Execution {
    pub fn new(scenario_id: impl Into<String>, mode: Mode, trigger_data: Option<Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            scenario_id: scenario_id.into(),
            mode,
            parent_execution_id: None,
            trigger_data,
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            steps: Vec::new(),
            context: HashMap::new(),
            passed_steps: 0,
            paused_state: None,
            report: None,
            error: None,
        }
    }

    /// A step's most recent StepResult, if it has been appended yet.
    pub fn find_step_result(&self, step_id: &str) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn find_step_result_mut(&mut self, step_id: &str) -> Option<&mut StepResult> {
        self.steps.iter_mut().find(|s| s.step_id == step_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expect_is_empty_when_no_clauses_set() {
        assert!(Expect::default().is_empty());
    }

    #[test]
    fn expect_is_not_empty_with_header_equals() {
        let mut expect = Expect::default();
        expect.header_equals.insert("X-Trace".into(), "abc".into());
        assert!(!expect.is_empty());
    }

    #[test]
    fn header_equals_preserves_insertion_order() {
        let json = serde_json::json!({
            "headerEquals": {"Zeta": "1", "Alpha": "2", "Mid": "3"}
        });
        let expect: Expect = serde_json::from_value(json).unwrap();
        let names: Vec<&str> = expect.header_equals.keys().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn step_status_terminal_set_matches_scheduler_contract() {
        assert!(StepStatus::Completed.is_terminal_step_status());
        assert!(StepStatus::Failed.is_terminal_step_status());
        assert!(StepStatus::Skipped.is_terminal_step_status());
        assert!(StepStatus::Cancelled.is_terminal_step_status());
        assert!(!StepStatus::Running.is_terminal_step_status());
        assert!(!StepStatus::Pending.is_terminal_step_status());
    }
}
