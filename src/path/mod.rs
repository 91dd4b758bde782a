//! Path Accessor (§4.2): dot-path traversal over a decoded JSON value.
//!
//! Deliberately narrower than the teacher's JSONPath-flavored navigator
//! (`extractors::navigate_json_multi` in the source this module is grounded
//! on) — no `[N]` index or `[*]` wildcard segments, because nothing in the
//! scenario data model needs them. A path is just dot-separated object keys.

use serde_json::Value;

/// `get(value, "a.b.c")`. An empty or omitted path returns the root value.
/// Traversal through a non-mapping, or a missing key, yields `None` (absent).
pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }

    let mut current = value;
    for segment in path.split('.') {
        let object = current.as_object()?;
        current = object.get(segment)?;
    }
    Some(current)
}
