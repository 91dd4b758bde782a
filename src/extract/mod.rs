//! Extractor (§4.4): applies a step's extract rules to a response, writing
//! results into the execution context.
//!
//! Grounded on the teacher's `extractors/mod.rs` (`ExtractionResult`,
//! `Extractor::process`, case-insensitive header lookup via its
//! `extract_from_header`). Trimmed: the teacher additionally supports
//! regex-sourced extraction, an `all_values` flag, and array-index JSONPath —
//! none of those have a counterpart in this spec's fixed `from ∈ {body,
//! header, status}` vocabulary (§4.4), so they were not carried over.

use std::collections::HashMap;

use serde_json::Value;

use crate::path;
use crate::protocol::{ExtractFrom, ExtractRule};
use crate::requester::Response;

/// Computes `context[varName] = value` for every `(varName, rule)` pair.
/// `None` represents the *absent* marker (§4.4) distinct from a literal
/// `null`/`""`/`0`.
pub fn extract(
    rules: &HashMap<String, ExtractRule>,
    response: &Response,
) -> HashMap<String, Option<Value>> {
    let body = response.body.as_json();
    rules
        .iter()
        .map(|(var_name, rule)| {
            let value = match rule.from {
                ExtractFrom::Status => Some(Value::from(response.status)),
                ExtractFrom::Header => match &rule.path {
                    Some(name) => response.headers.get(name).map(|v| Value::String(v.to_string())),
                    None => Some(response.headers.as_value_map()),
                },
                ExtractFrom::Body => match &rule.path {
                    Some(p) => path::get(&body, p).cloned(),
                    None => Some(body.clone()),
                },
            };
            (var_name.clone(), value)
        })
        .collect()
}
