//! Template Resolver (§4.1) and the execution's variable map (the `Context`
//! referenced throughout the spec's data model, §3).
//!
//! Grounded on the teacher's `context/mod.rs` (`Context` struct,
//! `interpolate_str`/`interpolate_value` recursive-over-`Value` shape), but
//! the token syntax changed from `${name}` to `{{name}}`, built-ins were
//! added, and an unresolved token is left untouched rather than erroring —
//! the teacher's `resolve_token` returns `Err("Missing context variable")` on
//! a miss, which §4.1 rule 3 explicitly forbids.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde_json::Value;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("static token regex is valid"));

const RANDOM_TOKEN_LEN: usize = 12;
const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// The execution's variable map. A value of `None` represents an explicit
/// *absent* extraction (§4.4) — distinct from the literal JSON values `null`,
/// `""`, and `0`, all of which are `Some(...)`.
#[derive(Debug, Clone, Default)]
pub struct Context {
    variables: HashMap<String, Option<Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Option<Value>) {
        self.variables.insert(name.into(), value);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = (String, Option<Value>)>) {
        self.variables.extend(other);
    }

    pub fn get(&self, name: &str) -> Option<&Option<Value>> {
        self.variables.get(name)
    }

    pub fn snapshot(&self) -> HashMap<String, Option<Value>> {
        self.variables.clone()
    }

    /// Resolves `{{name}}` tokens in `template` per §4.1's three-step order.
    pub fn interpolate_str(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut last_end = 0;
        for caps in TOKEN_RE.captures_iter(template) {
            let whole = caps.get(0).expect("capture group 0 always matches");
            let name = &caps[1];
            out.push_str(&template[last_end..whole.start()]);
            out.push_str(&self.resolve_token(name));
            last_end = whole.end();
        }
        out.push_str(&template[last_end..]);
        out
    }

    /// Recursively resolves string leaves of a structured JSON value,
    /// leaving non-string leaves untouched (§4.1, "Structured bodies").
    pub fn interpolate_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.interpolate_str(s)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.interpolate_value(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.interpolate_value(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_token(&self, name: &str) -> String {
        if let Some(builtin) = builtin_value(name) {
            return builtin;
        }
        match self.variables.get(name) {
            // Present and absent: renders as empty string. Present and a
            // literal value: render per the value's natural string form.
            Some(None) => String::new(),
            Some(Some(v)) => stringify(v),
            None => format!("{{{{{name}}}}}"),
        }
    }
}

fn builtin_value(name: &str) -> Option<String> {
    match name {
        "random" => Some(random_alphanumeric(RANDOM_TOKEN_LEN)),
        "random_ip" => Some(random_ip()),
        "timestamp" => Some(chrono::Utc::now().timestamp_millis().to_string()),
        _ => None,
    }
}

fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char)
        .collect()
}

fn random_ip() -> String {
    let mut rng = rand::thread_rng();
    (0..4)
        .map(|_| rng.gen_range(1..=255u8).to_string())
        .collect::<Vec<_>>()
        .join(".")
}

/// `String(value)` per §4.1 rule 2: numbers decimalized, booleans
/// `true`/`false`, objects/arrays in their JSON form, strings unquoted.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
