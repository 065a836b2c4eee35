//! Testing utilities.
//!
//! `ScriptedModel` is a deterministic `DocumentModel` that answers by request
//! purpose and document base name, so pipelines can be exercised without
//! network calls.

use crate::error::ServiceError;
use crate::llm_providers::{DocumentModel, ModelRequest, RequestPurpose};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Failures a script can inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFailure {
    RateLimited,
    Unavailable,
    Connectivity,
    ContentBlocked,
    BadRequest,
}

impl ScriptedFailure {
    fn to_error(self) -> ServiceError {
        match self {
            Self::RateLimited => ServiceError::RateLimited("scripted quota exhaustion".into()),
            Self::Unavailable => ServiceError::Unavailable("scripted outage".into()),
            Self::Connectivity => ServiceError::Connectivity("scripted connection reset".into()),
            Self::ContentBlocked => ServiceError::ContentBlocked("SAFETY".into()),
            Self::BadRequest => ServiceError::Api {
                status: 400,
                message: "scripted bad request".into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
enum Script {
    Reply(String),
    Fail(ScriptedFailure),
    /// Fail this many times, then reply
    FailThenReply {
        failures: usize,
        failure: ScriptedFailure,
        reply: String,
    },
}

/// Record of a call made to the scripted model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub purpose: RequestPurpose,
    pub case_id: String,
    pub base_name: String,
    pub part_count: usize,
    pub instruction: String,
}

/// A `DocumentModel` with canned answers and call tracking
#[derive(Default)]
pub struct ScriptedModel {
    scripts: Mutex<HashMap<(RequestPurpose, String), Script>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply, to exercise deadlines and concurrency limits
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer classification of `base_name` with this raw text
    pub fn with_classification_reply(self, base_name: &str, reply: impl Into<String>) -> Self {
        self.script(RequestPurpose::Classification, base_name, Script::Reply(reply.into()))
    }

    /// Classify `base_name` as `doc_type`
    pub fn with_classification(self, base_name: &str, doc_type: &str, confidence: f64) -> Self {
        let reply = json!({
            "classified_type": doc_type,
            "confidence": confidence,
            "reasoning": format!("Scripted as {doc_type}"),
        });
        self.with_classification_reply(base_name, reply.to_string())
    }

    /// Answer extraction of `base_name` with this raw text
    pub fn with_extraction_reply(self, base_name: &str, reply: impl Into<String>) -> Self {
        self.script(RequestPurpose::Extraction, base_name, Script::Reply(reply.into()))
    }

    /// Extract `(field, value)` pairs with a fixed confidence
    pub fn with_extraction(self, base_name: &str, fields: &[(&str, Option<&str>)]) -> Self {
        let entries: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(name, value)| {
                (
                    (*name).to_string(),
                    json!({
                        "value": value,
                        "confidence": if value.is_some() { 0.95 } else { 0.0 },
                        "reasoning": "scripted",
                    }),
                )
            })
            .collect();
        self.with_extraction_reply(base_name, serde_json::Value::Object(entries).to_string())
    }

    /// Fail every call of `purpose` for `base_name`
    pub fn with_failure(
        self,
        purpose: RequestPurpose,
        base_name: &str,
        failure: ScriptedFailure,
    ) -> Self {
        self.script(purpose, base_name, Script::Fail(failure))
    }

    /// Fail `failures` times, then send `reply`
    pub fn with_flaky_reply(
        self,
        purpose: RequestPurpose,
        base_name: &str,
        failures: usize,
        failure: ScriptedFailure,
        reply: impl Into<String>,
    ) -> Self {
        self.script(
            purpose,
            base_name,
            Script::FailThenReply {
                failures,
                failure,
                reply: reply.into(),
            },
        )
    }

    fn script(self, purpose: RequestPurpose, base_name: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .insert((purpose, base_name.to_string()), script);
        self
    }

    /// Every call made so far, in arrival order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, purpose: RequestPurpose, base_name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.purpose == purpose && c.base_name == base_name)
            .count()
    }

    /// Highest number of calls that were in progress at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, purpose: RequestPurpose, base_name: &str) -> Result<String, ServiceError> {
        let mut scripts = self.scripts.lock();
        let Some(script) = scripts.get_mut(&(purpose, base_name.to_string())) else {
            return Err(ServiceError::Api {
                status: 404,
                message: format!("no scripted {purpose} reply for '{base_name}'"),
            });
        };

        match script {
            Script::Reply(reply) => Ok(reply.clone()),
            Script::Fail(failure) => Err(failure.to_error()),
            Script::FailThenReply {
                failures,
                failure,
                reply,
            } => {
                if *failures > 0 {
                    *failures -= 1;
                    Err(failure.to_error())
                } else {
                    Ok(reply.clone())
                }
            }
        }
    }
}

/// Decrements the in-flight counter even when the call is cancelled
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &ModelRequest) -> Result<String, ServiceError> {
        let (case_id, base_name) = request
            .label
            .split_once('/')
            .unwrap_or(("", request.label.as_str()));

        self.calls.lock().push(RecordedCall {
            purpose: request.purpose,
            case_id: case_id.to_string(),
            base_name: base_name.to_string(),
            part_count: request.parts.len(),
            instruction: request.instruction.clone(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.respond(request.purpose, base_name)
    }
}
