use casedocs::error::{ErrorKind, ServiceError};
use casedocs::llm_providers::{ModelRequest, RequestPurpose};
use casedocs::retry::{RetryPolicy, RetryingClient};
use casedocs::testing::{ScriptedFailure, ScriptedModel};

use std::sync::Arc;
use std::time::Duration;

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
        backoff_base: 2.0,
        jitter_fraction: 0.0,
        attempt_timeout: Some(Duration::from_secs(5)),
    }
}

fn request(base_name: &str) -> ModelRequest {
    ModelRequest {
        purpose: RequestPurpose::Classification,
        label: format!("C1/{base_name}"),
        instruction: "Classify this document".into(),
        parts: Vec::new(),
    }
}

#[tokio::test]
async fn test_always_transient_uses_every_attempt() {
    let model = Arc::new(ScriptedModel::new().with_failure(
        RequestPurpose::Classification,
        "Invoice",
        ScriptedFailure::RateLimited,
    ));
    let client = RetryingClient::new(model.clone(), fast_policy(4));

    let err = client.invoke(&request("Invoice")).await.expect_err("must give up");
    match err {
        ServiceError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 4);
            assert!(matches!(*last, ServiceError::RateLimited(_)));
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
    assert_eq!(model.call_count(RequestPurpose::Classification, "Invoice"), 4);
}

#[tokio::test]
async fn test_success_after_transient_failures() {
    let model = Arc::new(ScriptedModel::new().with_flaky_reply(
        RequestPurpose::Classification,
        "Invoice",
        2,
        ScriptedFailure::Unavailable,
        "{}",
    ));
    let client = RetryingClient::new(model.clone(), fast_policy(5));

    let reply = client.invoke(&request("Invoice")).await.expect("third attempt succeeds");
    assert_eq!(reply, "{}");
    assert_eq!(model.call_count(RequestPurpose::Classification, "Invoice"), 3);
}

#[tokio::test]
async fn test_terminal_error_is_not_retried() {
    for failure in [ScriptedFailure::ContentBlocked, ScriptedFailure::BadRequest] {
        let model = Arc::new(ScriptedModel::new().with_failure(
            RequestPurpose::Classification,
            "Invoice",
            failure,
        ));
        let client = RetryingClient::new(model.clone(), fast_policy(5));

        let err = client.invoke(&request("Invoice")).await.expect_err("terminal");
        assert_eq!(err.kind(), ErrorKind::Terminal);
        assert!(!matches!(err, ServiceError::RetriesExhausted { .. }));
        assert_eq!(model.call_count(RequestPurpose::Classification, "Invoice"), 1);
    }
}

#[tokio::test]
async fn test_single_attempt_policy() {
    let model = Arc::new(ScriptedModel::new().with_failure(
        RequestPurpose::Classification,
        "Invoice",
        ScriptedFailure::Connectivity,
    ));
    let client = RetryingClient::new(model.clone(), fast_policy(1));

    let err = client.invoke(&request("Invoice")).await.expect_err("one attempt only");
    assert!(matches!(err, ServiceError::RetriesExhausted { attempts: 1, .. }));
    assert_eq!(model.call_count(RequestPurpose::Classification, "Invoice"), 1);
}

#[tokio::test]
async fn test_slow_reply_hits_attempt_deadline() {
    let model = Arc::new(
        ScriptedModel::new()
            .with_latency(Duration::from_millis(200))
            .with_classification_reply("Invoice", "{}"),
    );
    let mut policy = fast_policy(2);
    policy.attempt_timeout = Some(Duration::from_millis(20));
    let client = RetryingClient::new(model.clone(), policy);

    let err = client.invoke(&request("Invoice")).await.expect_err("deadline");
    match err {
        ServiceError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, ServiceError::DeadlineExceeded(_)));
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
    assert_eq!(model.call_count(RequestPurpose::Classification, "Invoice"), 2);
}

#[test]
fn test_http_status_taxonomy() {
    assert_eq!(ServiceError::from_status(429, "quota").kind(), ErrorKind::Transient);
    assert_eq!(ServiceError::from_status(503, "down").kind(), ErrorKind::Transient);
    assert_eq!(ServiceError::from_status(504, "slow").kind(), ErrorKind::Transient);
    assert_eq!(ServiceError::from_status(400, "bad").kind(), ErrorKind::Terminal);
    assert_eq!(ServiceError::from_status(403, "denied").kind(), ErrorKind::Terminal);
}
