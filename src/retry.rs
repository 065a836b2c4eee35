//! Retry with bounded exponential backoff
//!
//! `RetryPolicy` is independent of any error type: it only needs to know
//! whether a failure is transient. `RetryingClient` composes it around a
//! `DocumentModel` and adds the per-attempt deadline.

use crate::error::{ErrorKind, ServiceError};
use crate::llm_providers::{DocumentModel, ModelRequest};
use crate::{log_debug, log_warn, trace_warn};

use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry::RetryIf;

/// Errors that can say whether repeating the call might help
pub trait Retryable {
    fn error_kind(&self) -> ErrorKind;
}

impl Retryable for ServiceError {
    fn error_kind(&self) -> ErrorKind {
        self.kind()
    }
}

/// Why a retried operation finally gave up
#[derive(Debug)]
pub enum RetryError<E> {
    /// A terminal error, returned on first occurrence
    Terminal(E),
    /// Every attempt failed transiently
    Exhausted { attempts: u32, last: E },
}

/// Backoff parameters: `min(max_delay, initial_delay * backoff_base^attempt)`
/// plus up to `jitter_fraction` of that delay at random
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_base: f64,
    pub jitter_fraction: f64,
    /// Deadline applied to each individual attempt
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_base: 2.0,
            jitter_fraction: 0.25,
            attempt_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows the zero-based `attempt`, without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_secs_f64();
        if initial <= 0.0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = initial * self.backoff_base.powi(exponent);
        Duration::try_from_secs_f64(scaled)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay including random jitter in `[0, base * jitter_fraction]`
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let max_jitter = base.as_secs_f64() * self.jitter_fraction;
        if max_jitter <= 0.0 || !max_jitter.is_finite() {
            return base;
        }
        let jitter = rand::rng().random_range(0.0..=max_jitter);
        base + Duration::try_from_secs_f64(jitter).unwrap_or(Duration::ZERO)
    }

    /// The sleeps between attempts; one fewer than `max_attempts`
    pub fn delays(&self) -> Vec<Duration> {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.delay(attempt))
            .collect()
    }

    /// Run `operation` until it succeeds, fails terminally, or runs out of attempts.
    ///
    /// The operation receives the one-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let delays = self.delays();
        let attempts = AtomicU32::new(0);
        let result = RetryIf::start(
            delays.clone(),
            || {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                operation(attempt)
            },
            |err: &E| {
                let transient = err.error_kind() == ErrorKind::Transient;
                let attempt = attempts.load(Ordering::Relaxed);
                if transient
                    && let Some(delay) = usize::try_from(attempt.saturating_sub(1))
                        .ok()
                        .and_then(|i| delays.get(i))
                {
                    trace_warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient failure, retrying: {}",
                        err
                    );
                }
                transient
            },
        )
        .await;

        let attempts = attempts.into_inner();
        result.map_err(|err| match err.error_kind() {
            ErrorKind::Transient => RetryError::Exhausted {
                attempts,
                last: err,
            },
            ErrorKind::Terminal => RetryError::Terminal(err),
        })
    }
}

/// A `DocumentModel` wrapped in a retry policy, shared by all workers
#[derive(Clone)]
pub struct RetryingClient {
    model: Arc<dyn DocumentModel>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(model: Arc<dyn DocumentModel>, policy: RetryPolicy) -> Self {
        Self { model, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Send a request, retrying transient failures.
    ///
    /// Terminal errors come back unchanged; exhausting the budget yields
    /// `ServiceError::RetriesExhausted` carrying the last transient error.
    pub async fn invoke(&self, request: &ModelRequest) -> Result<String, ServiceError> {
        let result = self
            .policy
            .run(|attempt| async move {
                log_debug!(
                    "{} attempt {} for {}",
                    request.purpose,
                    attempt,
                    request.label
                );
                match self.policy.attempt_timeout {
                    Some(deadline) => {
                        match tokio::time::timeout(deadline, self.model.generate(request)).await {
                            Ok(result) => result,
                            Err(_) => Err(ServiceError::DeadlineExceeded(format!(
                                "no reply within {}s",
                                deadline.as_secs_f64()
                            ))),
                        }
                    }
                    None => self.model.generate(request).await,
                }
            })
            .await;

        result.map_err(|err| match err {
            RetryError::Terminal(err) => err,
            RetryError::Exhausted { attempts, last } => {
                log_warn!(
                    "Giving up on {} for {} after {} attempts",
                    request.purpose,
                    request.label,
                    attempts
                );
                ServiceError::RetriesExhausted {
                    attempts,
                    last: Box::new(last),
                }
            }
        })
    }
}
