use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::core::joinpoint::Failure;

/// Step of an interception that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Phase {
    /// A pointcut was evaluated for an operation
    MatchDecision,
    /// An advice unit started running
    AdviceEnter,
    /// An advice unit finished, normally or not
    AdviceExit,
    /// The chain reached the real operation
    TargetInvoke,
    /// The real operation returned normally
    TargetReturn,
    RetryAttempt,
    RetryFailure,
    RetryExhausted,
    /// A failure left the outermost advice
    Failure,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::MatchDecision => "match_decision",
            Phase::AdviceEnter => "advice_enter",
            Phase::AdviceExit => "advice_exit",
            Phase::TargetInvoke => "target_invoke",
            Phase::TargetReturn => "target_return",
            Phase::RetryAttempt => "retry_attempt",
            Phase::RetryFailure => "retry_failure",
            Phase::RetryExhausted => "retry_exhausted",
            Phase::Failure => "failure",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured record of one significant interception step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdviceEvent {
    /// Correlates every event of one call; absent for registration-time events
    pub invocation: Option<Uuid>,
    pub signature: String,
    pub phase: Phase,
    /// Advisor that produced the event, if any
    pub advice: Option<String>,
    pub attempt: Option<u32>,
    pub error: Option<String>,
    pub matched: Option<bool>,
}

impl AdviceEvent {
    pub fn new(phase: Phase, signature: impl fmt::Display) -> Self {
        Self {
            invocation: None,
            signature: signature.to_string(),
            phase,
            advice: None,
            attempt: None,
            error: None,
            matched: None,
        }
    }

    pub fn invocation(mut self, id: Uuid) -> Self {
        self.invocation = Some(id);
        self
    }

    pub fn advice(mut self, name: impl Into<String>) -> Self {
        self.advice = Some(name.into());
        self
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn error(mut self, failure: &Failure) -> Self {
        self.error = Some(failure.to_string());
        self
    }

    pub fn matched(mut self, matched: bool) -> Self {
        self.matched = Some(matched);
        self
    }
}

/// EventSink defines the port (interface) for the opaque destination of
/// interception events.
///
/// `emit` is called inline on the caller's thread; implementations must not
/// block for long and must tolerate concurrent calls.
pub trait EventSink: Send + Sync + 'static {
    /// Record one event
    fn emit(&self, event: &AdviceEvent);
}
