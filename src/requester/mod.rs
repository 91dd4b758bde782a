//! Requester (§4.3): performs one HTTP request with cancellation, returning a
//! normalized response.
//!
//! Grounded on the teacher's `executors/http.rs` for request construction
//! (base URL join, header application, JSON body via `reqwest::Client`) and
//! on `other_examples/8ba7febb_mondalsuman-boternity__..._workflow-executor.rs.rs`
//! for the cancellation-token race, which the teacher's HTTP executor has no
//! equivalent of at all (it has no cancellation concept).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::protocol::{Body, HttpMethod};

/// A fully template-resolved request, ready to send.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Body>,
}

/// A decoded response body: JSON-parsed when `content-type` contains
/// `application/json`, otherwise the raw text (§4.3).
#[derive(Debug, Clone)]
pub enum DecodedBody {
    Json(Value),
    Text(String),
}

impl DecodedBody {
    /// Stringified form used by `bodyContains`/`bodyNotContains` (§4.5):
    /// raw text if already text, else the JSON form.
    pub fn as_stringified(&self) -> String {
        match self {
            DecodedBody::Text(s) => s.clone(),
            DecodedBody::Json(v) => v.to_string(),
        }
    }

    /// The JSON value used by the Path Accessor and Extractor. Raw text is
    /// represented as a JSON string so extraction rules compose uniformly.
    pub fn as_json(&self) -> Value {
        match self {
            DecodedBody::Json(v) => v.clone(),
            DecodedBody::Text(s) => Value::String(s.clone()),
        }
    }
}

/// Case-insensitive header map that preserves original casing for reporting
/// (§4.3: "store original names for reporting but compare lower-cased").
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn from_pairs(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn as_value_map(&self) -> Value {
        Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: DecodedBody,
    pub duration_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request cancelled")]
    Cancelled,
    #[error("transport error: {0}")]
    Transport(String),
}

/// Operation `perform(request, cancelToken) → Response | Error` (§4.3).
#[async_trait]
pub trait Requester: Send + Sync {
    async fn perform(
        &self,
        request: &ResolvedRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, RequestError>;
}

/// Production Requester backed by `reqwest`, matching the teacher's
/// `HttpExecutor { client: Client }` shape.
pub struct ReqwestRequester {
    client: reqwest::Client,
}

impl ReqwestRequester {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestRequester {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Requester for ReqwestRequester {
    #[tracing::instrument(
        name = "http_request",
        skip_all,
        fields(
            http.method = request.method.as_str(),
            http.url = %request.url,
            http.status_code = tracing::field::Empty,
            http.duration_ms = tracing::field::Empty,
            otel.kind = "client"
        )
    )]
    async fn perform(
        &self,
        request: &ResolvedRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, RequestError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .expect("HttpMethod variants are always valid reqwest methods");

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = match body {
                Body::Raw(text) => builder.body(text.clone()),
                Body::Structured(value) => builder.json(value),
            };
        }

        let start = std::time::Instant::now();
        let send = builder.send();
        tokio::select! {
            _ = cancel.cancelled() => Err(RequestError::Cancelled),
            result = send => {
                let duration_ms = start.elapsed().as_millis() as u64;
                let resp = result.map_err(|e| RequestError::Transport(e.to_string()))?;
                let status = resp.status().as_u16();
                let headers = Headers::from_pairs(
                    resp.headers()
                        .iter()
                        .filter_map(|(k, v)| {
                            v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string()))
                        })
                        .collect(),
                );
                let is_json = headers
                    .get("content-type")
                    .map(|v| v.contains("application/json"))
                    .unwrap_or(false);
                let raw = resp.text().await.map_err(|e| RequestError::Transport(e.to_string()))?;
                let body = if is_json {
                    match serde_json::from_str(&raw) {
                        Ok(v) => DecodedBody::Json(v),
                        Err(_) => DecodedBody::Text(raw),
                    }
                } else {
                    DecodedBody::Text(raw)
                };

                tracing::Span::current().record("http.status_code", status as i64);
                tracing::Span::current().record("http.duration_ms", duration_ms as i64);

                Ok(Response { status, headers, body, duration_ms })
            }
        }
    }
}

/// Test double: a scripted queue of responses/errors, indexed by call order.
/// Grounded on the teacher's retry-module test fakes (`AtomicU32` call
/// counters), generalized to also hand back canned responses.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub enum Scripted {
        Response(Response),
        Error(RequestError),
    }

    pub struct MockRequester {
        script: Mutex<Vec<Scripted>>,
        calls: AtomicUsize,
        pub recorded_requests: Mutex<Vec<ResolvedRequest>>,
    }

    impl MockRequester {
        pub fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
                recorded_requests: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Requester for MockRequester {
        async fn perform(
            &self,
            request: &ResolvedRequest,
            cancel: &CancellationToken,
        ) -> Result<Response, RequestError> {
            if cancel.is_cancelled() {
                return Err(RequestError::Cancelled);
            }
            self.recorded_requests.lock().unwrap().push(request.clone());
            let index = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if index >= script.len() {
                return Err(RequestError::Transport("mock script exhausted".into()));
            }
            match std::mem::replace(
                &mut script[index],
                Scripted::Error(RequestError::Transport("consumed".into())),
            ) {
                Scripted::Response(r) => Ok(r),
                Scripted::Error(e) => Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockRequester, Scripted};
    use super::*;

    fn req() -> ResolvedRequest {
        ResolvedRequest {
            method: HttpMethod::Get,
            url: "http://example.test/".into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn mock_requester_replays_scripted_responses_in_order() {
        let mock = MockRequester::new(vec![
            Scripted::Response(Response {
                status: 500,
                headers: Headers::default(),
                body: DecodedBody::Text(String::new()),
                duration_ms: 1,
            }),
            Scripted::Response(Response {
                status: 200,
                headers: Headers::default(),
                body: DecodedBody::Text(String::new()),
                duration_ms: 1,
            }),
        ]);
        let cancel = CancellationToken::new();
        let first = mock.perform(&req(), &cancel).await.unwrap();
        let second = mock.perform(&req(), &cancel).await.unwrap();
        assert_eq!(first.status, 500);
        assert_eq!(second.status, 200);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_mock() {
        let mock = MockRequester::new(vec![Scripted::Response(Response {
            status: 200,
            headers: Headers::default(),
            body: DecodedBody::Text(String::new()),
            duration_ms: 1,
        })]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = mock.perform(&req(), &cancel).await;
        assert!(matches!(result, Err(RequestError::Cancelled)));
    }

    #[test]
    fn headers_lookup_is_case_insensitive() {
        let headers = Headers::from_pairs(vec![("Content-Type".into(), "application/json".into())]);
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert!(headers.contains("content-TYPE"));
    }
}
