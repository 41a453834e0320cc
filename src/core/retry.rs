//! Bounded retry as an around advice.
//!
//! The attempt budget is read from an annotation on the invoked operation
//! (`@Retry(value = N)` by default) or fixed when the interceptor is built.
//! Every call owns its own [`RetryState`]; nothing is shared between calls.
use tracing::{info, warn};

use crate::{
    core::{
        advice::{AdviceKind, Interceptor},
        chain::Invocation,
        error::{AopError, AopResult},
        joinpoint::{Failure, Value},
        signature::Signature,
    },
    ports::event_sink::{AdviceEvent, Phase},
};

pub const DEFAULT_RETRY_ANNOTATION: &str = "Retry";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> AopResult<Self> {
        if max_attempts == 0 {
            return Err(AopError::invalid_config(
                "retry attempts must be at least 1",
            ));
        }
        Ok(Self { max_attempts })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 1 }
    }
}

/// Per-call retry bookkeeping.
#[derive(Debug)]
pub struct RetryState {
    attempt: u32,
    last_failure: Option<Failure>,
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryState {
    pub fn new() -> Self {
        Self {
            attempt: 1,
            last_failure: None,
        }
    }

    /// 1-indexed number of the attempt in progress.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_failure(&self) -> Option<&Failure> {
        self.last_failure.as_ref()
    }

    fn record(&mut self, failure: Failure) {
        self.last_failure = Some(failure);
    }

    fn advance(&mut self) {
        self.attempt += 1;
    }

    fn into_failure(self) -> Option<Failure> {
        self.last_failure
    }
}

/// Around advice retrying the rest of the chain on failure.
#[derive(Debug, Clone)]
pub struct RetryInterceptor {
    annotation: String,
    default_policy: RetryPolicy,
    fixed: Option<RetryPolicy>,
}

impl Default for RetryInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryInterceptor {
    pub fn new() -> Self {
        Self {
            annotation: DEFAULT_RETRY_ANNOTATION.to_string(),
            default_policy: RetryPolicy::default(),
            fixed: None,
        }
    }

    /// Read the attempt budget from a differently named annotation.
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = annotation.into();
        self
    }

    /// Budget used when the annotation is absent or has no `value`.
    pub fn with_default(mut self, policy: RetryPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Ignore annotations and always use `policy`.
    pub fn fixed(policy: RetryPolicy) -> Self {
        Self {
            fixed: Some(policy),
            ..Self::new()
        }
    }

    pub fn policy_for(&self, signature: &Signature) -> AopResult<RetryPolicy> {
        if let Some(policy) = self.fixed {
            return Ok(policy);
        }
        let Some(annotation) = signature.annotation(&self.annotation) else {
            return Ok(self.default_policy);
        };
        let Some(value) = annotation.value() else {
            return Ok(self.default_policy);
        };
        let attempts = value
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| {
                AopError::invalid_config(format!(
                    "@{} on {signature} needs a positive integer value, got {value}",
                    self.annotation
                ))
            })?;
        RetryPolicy::new(attempts).map_err(|_| {
            AopError::invalid_config(format!(
                "@{} on {signature} must allow at least 1 attempt",
                self.annotation
            ))
        })
    }
}

impl Interceptor for RetryInterceptor {
    fn kind(&self) -> AdviceKind {
        AdviceKind::Around
    }

    fn validate(&self, signature: &Signature) -> AopResult<()> {
        self.policy_for(signature).map(|_| ())
    }

    fn intercept(&self, invocation: &Invocation<'_>) -> Result<Value, Failure> {
        let signature = invocation.signature();
        let policy = self
            .policy_for(signature)
            .map_err(|e| Failure::new("InvalidConfiguration", e.to_string()))?;
        let max = policy.max_attempts();
        let mut state = RetryState::new();

        loop {
            let attempt = state.attempt();
            info!(%signature, attempt, max, "[retry] try count={attempt}/{max}");
            invocation.emit(AdviceEvent::new(Phase::RetryAttempt, signature).attempt(attempt));

            match invocation.proceed() {
                Ok(value) => return Ok(value),
                Err(failure) => {
                    warn!(%signature, attempt, max, error = %failure, "attempt failed");
                    invocation.emit(
                        AdviceEvent::new(Phase::RetryFailure, signature)
                            .attempt(attempt)
                            .error(&failure),
                    );
                    state.record(failure);
                    if attempt >= max {
                        break;
                    }
                    state.advance();
                }
            }
        }

        let attempts = state.attempt();
        // the loop only exits after recording a failure
        let last = state
            .into_failure()
            .unwrap_or_else(|| Failure::new("IllegalStateException", "retry finished without a result"));
        invocation.emit(
            AdviceEvent::new(Phase::RetryExhausted, signature)
                .attempt(attempts)
                .error(&last),
        );
        Err(last)
    }
}
