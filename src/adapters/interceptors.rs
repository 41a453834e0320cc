//! Builtin interceptors that configuration files can refer to by name.
//!
//! * `log` - one line per call, shaped by the advice kind it is bound as
//! * `trace` - signature plus argument values before the call
//! * `timing` - measures the call, warns when it exceeds a threshold
//! * `retry` - see [`crate::core::retry`]
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::{
    config::models::{AdviceConfig, RetryConfig},
    core::{
        advice::{AdviceKind, Interceptor},
        chain::Invocation,
        error::{AopError, AopResult},
        joinpoint::{Failure, Value},
        retry::{RetryInterceptor, RetryPolicy},
    },
};

pub const BUILTIN_INTERCEPTORS: [&str; 4] = ["log", "trace", "timing", "retry"];

/// Logs the join point at the position its kind dictates.
#[derive(Debug, Clone, Copy)]
pub struct LogInterceptor {
    kind: AdviceKind,
}

impl LogInterceptor {
    pub fn new(kind: AdviceKind) -> Self {
        Self { kind }
    }
}

impl Default for LogInterceptor {
    fn default() -> Self {
        Self::new(AdviceKind::Around)
    }
}

impl Interceptor for LogInterceptor {
    fn kind(&self) -> AdviceKind {
        self.kind
    }

    fn intercept(&self, invocation: &Invocation<'_>) -> Result<Value, Failure> {
        let signature = invocation.signature();
        match self.kind {
            AdviceKind::Around => {
                info!("[log] {signature}");
                invocation.proceed()
            }
            AdviceKind::Before => {
                info!("[before] {signature}");
                invocation.proceed()
            }
            AdviceKind::AfterReturning => {
                let value = invocation.proceed()?;
                info!("[return] {signature} return={value}");
                Ok(value)
            }
            AdviceKind::AfterThrowing => invocation.proceed().inspect_err(|failure| {
                info!("[ex] {signature} message={failure}");
            }),
            AdviceKind::After => {
                let outcome = invocation.proceed();
                info!("[after] {signature}");
                outcome
            }
        }
    }
}

/// Logs the signature and argument values before continuing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceInterceptor;

impl Interceptor for TraceInterceptor {
    fn kind(&self) -> AdviceKind {
        AdviceKind::Before
    }

    fn intercept(&self, invocation: &Invocation<'_>) -> Result<Value, Failure> {
        let args: Vec<String> = invocation.args().iter().map(Value::to_string).collect();
        info!(
            invocation = %invocation.join_point().id(),
            "[trace] {} args=[{}]",
            invocation.signature(),
            args.join(", ")
        );
        invocation.proceed()
    }
}

/// Measures each call, on both the success and failure path.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingInterceptor {
    threshold: Option<Duration>,
}

impl TimingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls slower than `threshold` are logged at warn level.
    pub fn with_threshold(threshold: Duration) -> Self {
        Self {
            threshold: Some(threshold),
        }
    }

    pub fn threshold(&self) -> Option<Duration> {
        self.threshold
    }
}

impl Interceptor for TimingInterceptor {
    fn intercept(&self, invocation: &Invocation<'_>) -> Result<Value, Failure> {
        let start = Instant::now();
        let outcome = invocation.proceed();
        let elapsed = start.elapsed();

        let signature = invocation.signature();
        let took = humantime::format_duration(elapsed);
        match self.threshold {
            Some(threshold) if elapsed > threshold => warn!(
                %signature,
                ok = outcome.is_ok(),
                threshold = %humantime::format_duration(threshold),
                "[timing] {signature} took {took}"
            ),
            _ => debug!(%signature, ok = outcome.is_ok(), "[timing] {signature} took {took}"),
        }
        outcome
    }
}

/// Factory for building builtin interceptors from configuration
pub struct InterceptorFactory;

impl InterceptorFactory {
    /// Kind an interceptor runs as when the configuration does not say.
    pub fn natural_kind(interceptor: &str) -> Option<AdviceKind> {
        match interceptor {
            "log" | "timing" | "retry" => Some(AdviceKind::Around),
            "trace" => Some(AdviceKind::Before),
            _ => None,
        }
    }

    /// Check one advice entry without building it.
    pub fn check(advice: &AdviceConfig) -> Result<(), String> {
        let Some(natural) = Self::natural_kind(&advice.interceptor) else {
            return Err(format!(
                "unknown interceptor '{}' (expected one of {})",
                advice.interceptor,
                BUILTIN_INTERCEPTORS.join(", ")
            ));
        };
        let kind = advice.kind.unwrap_or(natural);
        if advice.interceptor != "log" && kind != natural {
            return Err(format!(
                "interceptor '{}' can only run as {natural} advice, not {kind}",
                advice.interceptor
            ));
        }
        if let Some(threshold) = &advice.threshold {
            humantime::parse_duration(threshold)
                .map_err(|e| format!("invalid threshold '{threshold}': {e}"))?;
        }
        if advice.attempts == Some(0) {
            return Err("retry attempts must be at least 1".to_string());
        }
        Ok(())
    }

    /// Build the retry interceptor described by the global retry settings,
    /// optionally pinned to a fixed budget.
    pub fn retry(config: &RetryConfig, attempts: Option<u32>) -> AopResult<RetryInterceptor> {
        if let Some(attempts) = attempts {
            return Ok(RetryInterceptor::fixed(RetryPolicy::new(attempts)?)
                .with_annotation(&config.annotation));
        }
        Ok(RetryInterceptor::new()
            .with_annotation(&config.annotation)
            .with_default(RetryPolicy::new(config.default_attempts)?))
    }

    pub fn create(advice: &AdviceConfig, retry: &RetryConfig) -> AopResult<Arc<dyn Interceptor>> {
        Self::check(advice).map_err(AopError::invalid_config)?;

        let interceptor = match advice.interceptor.as_str() {
            "log" => LogInterceptor::new(advice.kind.unwrap_or(AdviceKind::Around)).shared(),
            "trace" => TraceInterceptor.shared(),
            "timing" => match &advice.threshold {
                Some(threshold) => {
                    let threshold = humantime::parse_duration(threshold).map_err(|e| {
                        AopError::invalid_config(format!("invalid threshold '{threshold}': {e}"))
                    })?;
                    TimingInterceptor::with_threshold(threshold).shared()
                }
                None => TimingInterceptor::new().shared(),
            },
            "retry" => Self::retry(retry, advice.attempts)?.shared(),
            other => {
                return Err(AopError::invalid_config(format!(
                    "unknown interceptor '{other}'"
                )));
            }
        };
        Ok(interceptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advice(interceptor: &str) -> AdviceConfig {
        AdviceConfig {
            name: None,
            kind: None,
            pointcut: "execution(* *(..))".to_string(),
            interceptor: interceptor.to_string(),
            order: None,
            threshold: None,
            attempts: None,
        }
    }

    #[test]
    fn test_natural_kinds() {
        assert_eq!(InterceptorFactory::natural_kind("trace"), Some(AdviceKind::Before));
        assert_eq!(InterceptorFactory::natural_kind("retry"), Some(AdviceKind::Around));
        assert_eq!(InterceptorFactory::natural_kind("audit"), None);
    }

    #[test]
    fn test_log_accepts_every_kind() {
        let mut log = advice("log");
        log.kind = Some(AdviceKind::AfterThrowing);
        let interceptor = InterceptorFactory::create(&log, &RetryConfig::default()).unwrap();
        assert_eq!(interceptor.kind(), AdviceKind::AfterThrowing);
    }

    #[test]
    fn test_retry_must_be_around() {
        let mut retry = advice("retry");
        retry.kind = Some(AdviceKind::Before);
        let err = InterceptorFactory::check(&retry).unwrap_err();
        assert!(err.contains("around"));
    }

    #[test]
    fn test_timing_threshold_parses_humantime() {
        let mut timing = advice("timing");
        timing.threshold = Some("250ms".to_string());
        assert!(InterceptorFactory::check(&timing).is_ok());
        assert!(InterceptorFactory::create(&timing, &RetryConfig::default()).is_ok());

        timing.threshold = Some("a while".to_string());
        assert!(InterceptorFactory::check(&timing).unwrap_err().contains("threshold"));
    }

    #[test]
    fn test_fixed_retry_attempts() {
        let retry = InterceptorFactory::retry(&RetryConfig::default(), Some(3)).unwrap();
        let sig = crate::core::signature::TypeRegistry::builder()
            .register(
                crate::core::signature::TypeDescriptor::class("app.Repo")
                    .method(crate::core::signature::MethodDecl::new("save")),
            )
            .build()
            .unwrap()
            .describe("app.Repo", "save")
            .unwrap();
        assert_eq!(retry.policy_for(&sig).unwrap().max_attempts(), 3);
        assert!(InterceptorFactory::retry(&RetryConfig::default(), Some(0)).is_err());
    }
}
