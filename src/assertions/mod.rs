//! Assertion Evaluator (§4.5): produces an ordered list of pass/fail
//! assertion results for a step against a response, in a fixed clause order.
//!
//! Grounded on the teacher's `executors/http.rs::validate_assertions`
//! (match-on-type dispatch, its `compare_values` helper) but restructured:
//! the teacher short-circuits on the first failing assertion and returns
//! `Option<String>`; this spec requires every present clause to be evaluated
//! and recorded regardless of earlier failures (§4.5, "append one
//! AssertionResult per clause"), and the assertion vocabulary itself is the
//! fixed six-clause set from §3/§4.5 rather than the teacher's open-ended
//! `status_code`/`status_range`/`json_body`/`header`/`latency`/`json_schema`
//! types.

use serde_json::{json, Value};

use crate::protocol::{AssertionResult, Expect};
use crate::requester::Response;

const BLOCKED_STATUSES: [u16; 2] = [403, 429];

/// Evaluates every present clause of `expect` against `response`, in the
/// order: status, blocked, bodyContains, bodyNotContains, headerPresent,
/// then headerEquals.<name> in the map's insertion order.
pub fn evaluate(expect: &Expect, response: &Response) -> Vec<AssertionResult> {
    let mut results = Vec::new();
    let stringified_body = response.body.as_stringified();

    if let Some(expected) = expect.status {
        let actual = response.status;
        results.push(AssertionResult {
            field: "status".to_string(),
            expected: json!(expected),
            actual: json!(actual),
            passed: actual == expected,
        });
    }

    if let Some(expected) = expect.blocked {
        let actual = BLOCKED_STATUSES.contains(&response.status);
        results.push(AssertionResult {
            field: "blocked".to_string(),
            expected: json!(expected),
            actual: json!(actual),
            passed: actual == expected,
        });
    }

    if let Some(needle) = &expect.body_contains {
        let passed = stringified_body.contains(needle.as_str());
        results.push(AssertionResult {
            field: "bodyContains".to_string(),
            expected: json!(needle),
            actual: json!(stringified_body),
            passed,
        });
    }

    if let Some(needle) = &expect.body_not_contains {
        let passed = !stringified_body.contains(needle.as_str());
        results.push(AssertionResult {
            field: "bodyNotContains".to_string(),
            expected: json!(needle),
            actual: json!(stringified_body),
            passed,
        });
    }

    if let Some(header_name) = &expect.header_present {
        let present = response.headers.contains(header_name);
        results.push(AssertionResult {
            field: "headerPresent".to_string(),
            expected: json!(header_name),
            actual: json!(present),
            passed: present,
        });
    }

    for (name, expected_value) in &expect.header_equals {
        let actual = response.headers.get(name);
        let passed = actual == Some(expected_value.as_str());
        results.push(AssertionResult {
            field: format!("headerEquals.{name}"),
            expected: json!(expected_value),
            actual: actual.map(Value::from).unwrap_or(Value::Null),
            passed,
        });
    }

    results
}

/// A step passes iff every assertion result passed. An empty/absent `expect`
/// passes on any non-error response (§4.5).
pub fn all_passed(results: &[AssertionResult]) -> bool {
    results.iter().all(|r| r.passed)
}

/// Human-readable summary naming each failing field, expected, and actual,
/// for the StepResult's `error` field (§7: "names each failing field").
pub fn failure_summary(results: &[AssertionResult]) -> String {
    let failing: Vec<String> = results
        .iter()
        .filter(|r| !r.passed)
        .map(|r| format!("{} (expected {}, got {})", r.field, r.expected, r.actual))
        .collect();
    format!("assertion(s) failed: {}", failing.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requester::{DecodedBody, Headers};

    fn response(status: u16, body: Value, headers: Vec<(&str, &str)>) -> Response {
        Response {
            status,
            headers: Headers::from_pairs(
                headers.into_iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ),
            body: DecodedBody::Json(body),
            duration_ms: 1,
        }
    }

    #[test]
    fn empty_expect_yields_no_results_and_passes() {
        let expect = Expect::default();
        let results = evaluate(&expect, &response(200, json!({}), vec![]));
        assert!(results.is_empty());
        assert!(all_passed(&results));
    }

    #[test]
    fn status_assertion() {
        let expect = Expect { status: Some(200), ..Default::default() };
        let results = evaluate(&expect, &response(200, json!({}), vec![]));
        assert_eq!(results.len(), 1);
        assert!(results[0].passed);
        assert_eq!(results[0].field, "status");
    }

    #[test]
    fn blocked_assertion_true_on_403_and_429() {
        let expect = Expect { blocked: Some(true), ..Default::default() };
        assert!(evaluate(&expect, &response(403, json!({}), vec![]))[0].passed);
        assert!(evaluate(&expect, &response(429, json!({}), vec![]))[0].passed);
        assert!(!evaluate(&expect, &response(200, json!({}), vec![]))[0].passed);
    }

    #[test]
    fn body_contains_and_not_contains() {
        let expect = Expect {
            body_contains: Some("hello".into()),
            body_not_contains: Some("goodbye".into()),
            ..Default::default()
        };
        let results = evaluate(&expect, &response(200, json!("hello world"), vec![]));
        assert!(results[0].passed);
        assert!(results[1].passed);
    }

    #[test]
    fn header_present_and_equals_case_insensitive() {
        let mut expect = Expect {
            header_present: Some("X-Trace".into()),
            ..Default::default()
        };
        expect.header_equals.insert("Content-Type".into(), "application/json".into());
        let results = evaluate(
            &expect,
            &response(200, json!({}), vec![("x-trace", "abc"), ("content-type", "application/json")]),
        );
        assert!(results[0].passed);
        assert_eq!(results[1].field, "headerEquals.Content-Type");
        assert!(results[1].passed);
    }

    #[test]
    fn clause_order_is_fixed_regardless_of_declaration_order() {
        let mut expect = Expect {
            status: Some(200),
            blocked: Some(false),
            body_contains: Some("x".into()),
            body_not_contains: Some("y".into()),
            header_present: Some("X-A".into()),
            ..Default::default()
        };
        expect.header_equals.insert("X-B".into(), "1".into());
        expect.header_equals.insert("X-A".into(), "2".into());
        let results = evaluate(
            &expect,
            &response(200, json!("x"), vec![("X-A", "2"), ("X-B", "1")]),
        );
        let fields: Vec<&str> = results.iter().map(|r| r.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "status",
                "blocked",
                "bodyContains",
                "bodyNotContains",
                "headerPresent",
                "headerEquals.X-B",
                "headerEquals.X-A",
            ]
        );
    }

    #[test]
    fn all_clauses_evaluated_even_after_an_earlier_failure() {
        let expect = Expect {
            status: Some(999),
            blocked: Some(true),
            ..Default::default()
        };
        let results = evaluate(&expect, &response(200, json!({}), vec![]));
        assert_eq!(results.len(), 2);
        assert!(!results[0].passed);
        assert!(!results[1].passed);
    }

    #[test]
    fn failure_summary_names_each_failing_field() {
        let expect = Expect { status: Some(201), ..Default::default() };
        let results = evaluate(&expect, &response(500, json!({}), vec![]));
        let summary = failure_summary(&results);
        assert!(summary.contains("status"));
        assert!(summary.contains("201"));
        assert!(summary.contains("500"));
    }
}
