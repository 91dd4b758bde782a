//! Structured error codes (§7, expanded in SPEC_FULL.md §10.2).
//!
//! Grounded on the teacher's `errors/mod.rs`: a numeric `ErrorCode` whose
//! leading digit names a category, a `formatted()`/`Display` pair for
//! `E<NNNN>`-style messages, and a `category()` lookup. Narrowed to the five
//! categories §7 actually names for this domain — Configuration, Deadlock,
//! Request, Assertion, Internal. Cancellation is deliberately not a variant
//! here: the spec treats it as a status (`StepStatus::Cancelled`,
//! `ExecutionStatus::Cancelled`), never as an `Err` (§7: "cancellation ...
//! reported via status, never as failure").

use std::fmt;

/// A numeric error code in the teacher's `E<4 digits>` style, where the
/// leading digit names the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(u16);

impl ErrorCode {
    // E1xxx: Configuration — scenario/execution lookup, engine setup.
    pub const SCENARIO_NOT_FOUND: Self = Self(1001);
    pub const EXECUTION_NOT_FOUND: Self = Self(1002);
    pub const INVALID_CONFIGURATION: Self = Self(1003);

    // E2xxx: Deadlock — the DAG cannot advance.
    pub const DEADLOCK: Self = Self(2001);

    // E3xxx: Request — transport/timeout failures from the Requester.
    pub const REQUEST_TRANSPORT_ERROR: Self = Self(3001);

    // E4xxx: Assertion — a step's expectations were not met.
    pub const ASSERTION_FAILED: Self = Self(4001);

    // E5xxx: Internal — invariants that must be impossible by construction.
    pub const INTERNAL_INVARIANT: Self = Self(5001);

    pub fn code(&self) -> u16 {
        self.0
    }

    pub fn formatted(&self) -> String {
        format!("E{:04}", self.0)
    }

    pub fn category(&self) -> ErrorCategory {
        match self.0 / 1000 {
            1 => ErrorCategory::Configuration,
            2 => ErrorCategory::Deadlock,
            3 => ErrorCategory::Request,
            4 => ErrorCategory::Assertion,
            5 => ErrorCategory::Internal,
            _ => ErrorCategory::Unknown,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Deadlock,
    Request,
    Assertion,
    Internal,
    Unknown,
}

/// Façade-level errors (§6): reported to the caller, no execution created or
/// advanced.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{code} scenario not found: {scenario_id}", code = ErrorCode::SCENARIO_NOT_FOUND)]
    ScenarioNotFound { scenario_id: String },

    #[error("{code} execution not found: {execution_id}", code = ErrorCode::EXECUTION_NOT_FOUND)]
    ExecutionNotFound { execution_id: String },

    #[error("{code} invalid configuration: {reason}", code = ErrorCode::INVALID_CONFIGURATION)]
    InvalidConfiguration { reason: String },
}

/// Builds the "Deadlock detected" diagnostic §4.7/§8 require. The message
/// itself must begin with the literal text "Deadlock" (§7), so the error
/// code is appended rather than led with.
pub fn deadlock_message(pending: &[String]) -> String {
    format!(
        "Deadlock detected: {} step(s) cannot advance: {} ({})",
        pending.len(),
        pending.join(", "),
        ErrorCode::DEADLOCK,
    )
}

/// Builds the internal-invariant diagnostic (§7: "must be impossible by
/// construction; if detected, terminate as failed with a diagnostic").
pub fn internal_invariant_message(what: &str) -> String {
    format!("{} internal invariant violated: {what}", ErrorCode::INTERNAL_INVARIANT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_formats_with_leading_e() {
        assert_eq!(ErrorCode::DEADLOCK.to_string(), "E2001");
    }

    #[test]
    fn error_code_category_mapping() {
        assert_eq!(ErrorCode::SCENARIO_NOT_FOUND.category(), ErrorCategory::Configuration);
        assert_eq!(ErrorCode::DEADLOCK.category(), ErrorCategory::Deadlock);
        assert_eq!(ErrorCode::REQUEST_TRANSPORT_ERROR.category(), ErrorCategory::Request);
        assert_eq!(ErrorCode::ASSERTION_FAILED.category(), ErrorCategory::Assertion);
        assert_eq!(ErrorCode::INTERNAL_INVARIANT.category(), ErrorCategory::Internal);
    }

    #[test]
    fn deadlock_message_begins_with_deadlock_and_names_steps() {
        let message = deadlock_message(&["a".to_string(), "b".to_string()]);
        assert!(message.starts_with("Deadlock"));
        assert!(message.contains("a, b"));
    }

    #[test]
    fn engine_error_messages_embed_their_code() {
        let err = EngineError::ScenarioNotFound { scenario_id: "s1".into() };
        assert!(err.to_string().contains("E1001"));
        assert!(err.to_string().contains("s1"));
    }
}
