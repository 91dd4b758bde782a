//! A scenario execution engine: DAG-scheduled HTTP steps with retries,
//! assertions, variable extraction, and lifecycle control.
//!
//! [`Engine`] is the entry point — it owns the scenario Catalog, the
//! Execution Store, admission control, and the event stream, and spawns one
//! driver per started execution. See [`engine::Engine`] for the full
//! surface.

pub mod admission;
pub mod assertions;
pub mod catalog;
pub mod config;
pub mod context;
pub mod control;
pub mod engine;
pub mod errors;
pub mod events;
pub mod extract;
pub mod path;
pub mod protocol;
pub mod requester;
pub mod scheduler;
pub mod step_runner;
pub mod store;
pub mod telemetry;

pub use catalog::{Catalog, InMemoryCatalog};
pub use config::EngineConfig;
pub use engine::Engine;
pub use errors::{EngineError, ErrorCategory, ErrorCode};
pub use events::{EventKind, EventStream, ExecutionEvent};
pub use protocol::{
    AssertionResult, Body, Execution, ExecutionStatus, Expect, ExtractFrom, ExtractRule,
    HttpMethod, Mode, PausedState, Report, Scenario, Step, StepResult, StepStatus, When,
};
pub use requester::{ReqwestRequester, Requester};
