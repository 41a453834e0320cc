//! The interceptor chain and its continuation.
//!
//! A chain is resolved once per operation when a stand-in is built and is
//! read-only afterwards. Each call walks it front to back: entry `i`
//! receives an [`Invocation`] whose `proceed()` runs entry `i + 1`, and the
//! real operation sits behind the last entry. Entries whose pointcut could
//! only be decided at runtime are re-checked against the live join point
//! when the walk reaches them and skipped if they do not match.
use std::sync::Arc;

use tracing::{debug, error};

use crate::{
    core::{
        advice::Advisor,
        joinpoint::{Failure, JoinPoint, Value},
        pointcut::{Bindings, Bound},
        signature::{Signature, TypeRegistry},
    },
    ports::event_sink::{AdviceEvent, EventSink, Phase},
};

/// Shared, read-only state every call needs.
pub struct ChainEnv {
    pub registry: Arc<TypeRegistry>,
    pub events: Arc<dyn EventSink>,
}

impl ChainEnv {
    pub fn new(registry: Arc<TypeRegistry>, events: Arc<dyn EventSink>) -> Self {
        Self { registry, events }
    }
}

/// One advisor resolved for one operation.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub advisor: Arc<Advisor>,
    /// The pointcut could not be decided statically and is re-evaluated per call
    pub runtime_check: bool,
}

/// Ordered advice for a single operation.
#[derive(Debug, Clone)]
pub struct InterceptorChain {
    signature: Arc<Signature>,
    entries: Vec<ChainEntry>,
}

impl InterceptorChain {
    /// `entries` must already be sorted by advisor order.
    pub fn new(signature: Arc<Signature>, entries: Vec<ChainEntry>) -> Self {
        Self { signature, entries }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_runtime_checks(&self) -> bool {
        self.entries.iter().any(|e| e.runtime_check)
    }

    /// Run the whole chain for one call.
    pub fn invoke(&self, join_point: &JoinPoint, env: &ChainEnv) -> Result<Value, Failure> {
        let result = self.run_from(0, join_point, env);
        if let Err(failure) = &result {
            error!(
                invocation = %join_point.id(),
                signature = %self.signature,
                error = %failure,
                "call failed"
            );
            env.events.emit(
                &AdviceEvent::new(Phase::Failure, &self.signature)
                    .invocation(join_point.id())
                    .error(failure),
            );
        }
        result
    }

    fn run_from(&self, start: usize, join_point: &JoinPoint, env: &ChainEnv) -> Result<Value, Failure> {
        for (index, entry) in self.entries.iter().enumerate().skip(start) {
            let advisor = &entry.advisor;
            if entry.runtime_check {
                let matched = advisor.pointcut.matches_join_point(join_point, &env.registry);
                debug!(
                    invocation = %join_point.id(),
                    advisor = %advisor.name,
                    matched,
                    "runtime pointcut check"
                );
                env.events.emit(
                    &AdviceEvent::new(Phase::MatchDecision, &self.signature)
                        .invocation(join_point.id())
                        .advice(&advisor.name)
                        .matched(matched),
                );
                if !matched {
                    continue;
                }
            }

            let invocation = Invocation {
                join_point,
                chain: self,
                next: index + 1,
                env,
                advisor,
                bindings: advisor.pointcut.bind(join_point, &env.registry),
            };
            env.events.emit(
                &AdviceEvent::new(Phase::AdviceEnter, &self.signature)
                    .invocation(join_point.id())
                    .advice(&advisor.name),
            );
            let result = advisor.interceptor.intercept(&invocation);
            let mut exit = AdviceEvent::new(Phase::AdviceExit, &self.signature)
                .invocation(join_point.id())
                .advice(&advisor.name);
            if let Err(failure) = &result {
                exit = exit.error(failure);
            }
            env.events.emit(&exit);
            return result;
        }

        env.events.emit(
            &AdviceEvent::new(Phase::TargetInvoke, &self.signature).invocation(join_point.id()),
        );
        let result = join_point
            .target()
            .invoke(join_point.signature(), join_point.args());
        if result.is_ok() {
            env.events.emit(
                &AdviceEvent::new(Phase::TargetReturn, &self.signature)
                    .invocation(join_point.id()),
            );
        }
        result
    }
}

/// The continuation handed to an interceptor.
///
/// `proceed` may be called any number of times (zero short-circuits the
/// call); each call runs the remainder of the chain afresh.
pub struct Invocation<'a> {
    join_point: &'a JoinPoint,
    chain: &'a InterceptorChain,
    next: usize,
    env: &'a ChainEnv,
    advisor: &'a Advisor,
    bindings: Bindings,
}

impl Invocation<'_> {
    pub fn join_point(&self) -> &JoinPoint {
        self.join_point
    }

    pub fn signature(&self) -> &Signature {
        self.join_point.signature()
    }

    pub fn args(&self) -> &[Value] {
        self.join_point.args()
    }

    /// Value of a parameter the advisor's pointcut bound, e.g. `arg` in
    /// `args(arg, ..)`.
    pub fn bound(&self, name: &str) -> Option<&Bound> {
        self.bindings.get(name)
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Advisor currently running.
    pub fn advisor(&self) -> &Advisor {
        self.advisor
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.env.registry
    }

    /// Continue with the next advice, or the real operation.
    pub fn proceed(&self) -> Result<Value, Failure> {
        self.chain.run_from(self.next, self.join_point, self.env)
    }

    /// Continue with replaced arguments. The replacement must have the same
    /// arity and each value must fit the declared parameter type.
    pub fn proceed_with(&self, args: Vec<Value>) -> Result<Value, Failure> {
        let params = &self.signature().parameter_types;
        if args.len() != params.len() {
            return Err(Failure::new(
                "IllegalArgumentException",
                format!(
                    "expecting {} arguments to proceed, but was passed {}",
                    params.len(),
                    args.len()
                ),
            ));
        }
        if let Some((value, param)) = args
            .iter()
            .zip(params)
            .find(|(value, param)| !self.env.registry.is_assignable(value.runtime_type(), param))
        {
            return Err(Failure::new(
                "IllegalArgumentException",
                format!("{} is not assignable to {param}", value.runtime_type()),
            ));
        }
        let replaced = self.join_point.with_args(args);
        self.chain.run_from(self.next, &replaced, self.env)
    }

    /// Emit an event on behalf of the running advisor.
    pub fn emit(&self, event: AdviceEvent) {
        self.env.events.emit(
            &event
                .invocation(self.join_point.id())
                .advice(&self.advisor.name),
        );
    }
}
