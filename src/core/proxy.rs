//! Stand-ins and their construction.
//!
//! [`ProxyFactory::build`] matches every advisor against every operation of
//! the target once, fixes the per-operation chains and returns an immutable
//! [`Proxy`]. Calls made through the proxy run the chain; calls the target
//! makes on itself never see the proxy and so bypass every advice.
use std::{fmt, sync::Arc};

use tracing::{debug, info};

use crate::{
    config::models::ProxyConfig,
    core::{
        advice::Advisor,
        chain::{ChainEntry, ChainEnv, InterceptorChain},
        dispatch::{DispatchStrategyFactory, StrategyKind},
        error::{AopError, AopResult},
        joinpoint::{JoinPoint, ProxyIdentity, Value},
        pointcut::{StaticContext, StaticMatch},
        signature::{Signature, TypeRegistry, Visibility},
    },
    ports::{
        event_sink::{AdviceEvent, EventSink, Phase},
        target::Target,
    },
    metrics::InvocationTimer,
    tracing_setup::create_invocation_span,
};

struct ProxyOperation {
    signature: Arc<Signature>,
    /// `None` when the call goes straight to the target
    chain: Option<InterceptorChain>,
}

/// The object callers invoke in place of the target.
pub struct Proxy {
    identity: Arc<ProxyIdentity>,
    target: Arc<dyn Target>,
    operations: Vec<ProxyOperation>,
    env: Arc<ChainEnv>,
}

impl Proxy {
    pub fn bean_name(&self) -> &str {
        &self.identity.bean_name
    }

    pub fn strategy(&self) -> StrategyKind {
        self.identity.strategy
    }

    pub fn target_type(&self) -> &str {
        &self.identity.target_type
    }

    pub fn target(&self) -> &Arc<dyn Target> {
        &self.target
    }

    pub fn identity(&self) -> &ProxyIdentity {
        &self.identity
    }

    /// Whether the bean was wrapped at all. Unadvised beans are handed out
    /// as direct handles.
    pub fn is_aop_proxy(&self) -> bool {
        self.identity.strategy != StrategyKind::Direct
    }

    /// Operations callable through this stand-in.
    pub fn operations(&self) -> impl Iterator<Item = &Signature> {
        self.operations.iter().map(|op| op.signature.as_ref())
    }

    /// Same signature the registry gives for the target type. With
    /// overloads this is the first one declared; use
    /// [`describe_overload`](Self::describe_overload) to pick one.
    pub fn describe(&self, method: &str) -> AopResult<&Signature> {
        self.operations
            .iter()
            .find(|op| op.signature.method_name == method)
            .map(|op| op.signature.as_ref())
            .ok_or_else(|| AopError::not_found("operation", format!("{}.{method}", self.target_type())))
    }

    /// The overload of `method` declared with exactly these parameter types.
    pub fn describe_overload(&self, method: &str, params: &[&str]) -> AopResult<&Signature> {
        let registry = &self.env.registry;
        let params = params
            .iter()
            .map(|p| registry.resolve(p))
            .collect::<AopResult<Vec<_>>>()?;
        self.operations
            .iter()
            .find(|op| op.signature.method_name == method && op.signature.parameter_types == params)
            .map(|op| op.signature.as_ref())
            .ok_or_else(|| {
                AopError::not_found(
                    "operation",
                    format!("{}.{method}({})", self.target_type(), params.join(",")),
                )
            })
    }

    pub fn chain_for(&self, signature: &Signature) -> Option<&InterceptorChain> {
        self.operations
            .iter()
            .find(|op| op.signature.as_ref() == signature)
            .and_then(|op| op.chain.as_ref())
    }

    /// Whether the stand-in can be viewed as `type_name`.
    pub fn is_instance_of(&self, type_name: &str) -> bool {
        self.identity.viewable_as(&self.env.registry, type_name)
    }

    /// View the stand-in as another type. Fails with `TypeMismatch` when the
    /// stand-in was not built to be that type.
    pub fn view(&self, type_name: &str) -> AopResult<ProxyView<'_>> {
        let canonical = self.env.registry.resolve(type_name)?.to_string();
        if !self.is_instance_of(&canonical) {
            return Err(AopError::TypeMismatch {
                bean: self.bean_name().to_string(),
                requested: canonical,
                strategy: self.strategy().as_str(),
            });
        }
        Ok(ProxyView {
            proxy: self,
            type_name: canonical,
        })
    }

    /// Call an operation by name, picking the overload whose parameters
    /// accept the argument values.
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> AopResult<Value> {
        let op = self.resolve(method, &args, |_| true)?;
        self.dispatch(op, args)
    }

    /// Call a specific operation.
    pub fn invoke_signature(&self, signature: &Signature, args: Vec<Value>) -> AopResult<Value> {
        let op = self
            .operations
            .iter()
            .find(|op| op.signature.as_ref() == signature)
            .ok_or_else(|| AopError::not_found("operation", signature.to_string()))?;
        if args.len() != signature.parameter_types.len() {
            return Err(AopError::not_found(
                "operation",
                format!("{signature} with {} arguments", args.len()),
            ));
        }
        self.dispatch(op, args)
    }

    fn resolve<F>(&self, method: &str, args: &[Value], visible: F) -> AopResult<&ProxyOperation>
    where
        F: Fn(&Signature) -> bool,
    {
        let registry = &self.env.registry;
        self.operations
            .iter()
            .filter(|op| op.signature.method_name == method && visible(&op.signature))
            .find(|op| {
                let params = &op.signature.parameter_types;
                params.len() == args.len()
                    && args
                        .iter()
                        .zip(params)
                        .all(|(arg, param)| registry.is_assignable(arg.runtime_type(), param))
            })
            .ok_or_else(|| {
                let arg_types: Vec<_> = args.iter().map(Value::runtime_type).collect();
                AopError::not_found(
                    "operation",
                    format!("{}.{method}({})", self.target_type(), arg_types.join(",")),
                )
            })
    }

    fn dispatch(&self, op: &ProxyOperation, args: Vec<Value>) -> AopResult<Value> {
        match &op.chain {
            Some(chain) => {
                let join_point = JoinPoint::new(
                    op.signature.clone(),
                    args,
                    self.target.clone(),
                    self.identity.clone(),
                );
                let span = create_invocation_span(&op.signature, join_point.id());
                let _guard = span.enter();
                let _timer = InvocationTimer::new(&op.signature);
                let result = chain.invoke(&join_point, &self.env);
                span.record("outcome", if result.is_ok() { "returned" } else { "failed" });
                result.map_err(AopError::Target)
            }
            None => self
                .target
                .invoke(&op.signature, &args)
                .map_err(AopError::Target),
        }
    }
}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("bean", &self.identity.bean_name)
            .field("strategy", &self.identity.strategy)
            .field("target_type", &self.identity.target_type)
            .field("operations", &self.operations.len())
            .finish()
    }
}

/// A stand-in seen as one of the types it can be viewed as. Only operations
/// that type declares (or inherits) are reachable.
#[derive(Debug)]
pub struct ProxyView<'a> {
    proxy: &'a Proxy,
    type_name: String,
}

impl ProxyView<'_> {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn proxy(&self) -> &Proxy {
        self.proxy
    }

    pub fn invoke(&self, method: &str, args: Vec<Value>) -> AopResult<Value> {
        let registry = &self.proxy.env.registry;
        let op = self.proxy.resolve(method, &args, |sig| {
            !registry.declarers_of(&self.type_name, &sig.key()).is_empty()
        })?;
        self.proxy.dispatch(op, args)
    }
}

/// Static match of one advisor against one operation.
#[derive(Debug, Clone)]
pub struct AdvisorMatch {
    pub advisor: Arc<Advisor>,
    pub decision: StaticMatch,
}

/// Builds stand-ins for targets against a fixed set of advisors.
pub struct ProxyFactory<'a> {
    registry: &'a Arc<TypeRegistry>,
    advisors: &'a [Arc<Advisor>],
    events: &'a Arc<dyn EventSink>,
    config: &'a ProxyConfig,
}

impl<'a> ProxyFactory<'a> {
    /// `advisors` must already be in chain order.
    pub fn new(
        registry: &'a Arc<TypeRegistry>,
        advisors: &'a [Arc<Advisor>],
        events: &'a Arc<dyn EventSink>,
        config: &'a ProxyConfig,
    ) -> Self {
        Self {
            registry,
            advisors,
            events,
            config,
        }
    }

    /// Match every advisor against one operation as seen on `bean_name`.
    pub fn match_operation(&self, bean_name: &str, signature: &Signature) -> Vec<AdvisorMatch> {
        let ctx = StaticContext::new(signature).with_bean(bean_name);
        self.advisors
            .iter()
            .map(|advisor| {
                let decision = advisor.pointcut.static_match(&ctx, self.registry);
                debug!(
                    bean = bean_name,
                    advisor = %advisor.name,
                    %signature,
                    %decision,
                    "static pointcut match"
                );
                self.events.emit(
                    &AdviceEvent::new(Phase::MatchDecision, signature)
                        .advice(&advisor.name)
                        .matched(decision.could_match()),
                );
                AdvisorMatch {
                    advisor: advisor.clone(),
                    decision,
                }
            })
            .collect()
    }

    /// Build the stand-in for `target` registered as `bean_name`.
    ///
    /// Fails without producing a partial stand-in when the target type is
    /// unknown, cannot be wrapped with the selected strategy, or an
    /// interceptor rejects one of the operations it was matched to.
    pub fn build(&self, bean_name: &str, target: Arc<dyn Target>) -> AopResult<Proxy> {
        let target_type = self.registry.resolve(target.type_name())?.to_string();

        // private operations never go through a stand-in
        let mut chains = Vec::new();
        for signature in self
            .registry
            .operations(&target_type)?
            .into_iter()
            .filter(|sig| sig.visibility != Visibility::Private)
        {
            let entries: Vec<ChainEntry> = self
                .match_operation(bean_name, &signature)
                .into_iter()
                .filter(|m| m.decision.could_match())
                .map(|m| ChainEntry {
                    runtime_check: m.decision == StaticMatch::Maybe,
                    advisor: m.advisor,
                })
                .collect();
            chains.push((signature, entries));
        }

        let advised = chains.iter().any(|(_, entries)| !entries.is_empty());
        let kind = if advised {
            DispatchStrategyFactory::select(self.config, bean_name, self.registry, &target_type)
        } else {
            StrategyKind::Direct
        };
        let strategy = DispatchStrategyFactory::create_strategy(kind);
        let plan = strategy.prepare(self.registry, &target_type)?;

        let mut operations = Vec::with_capacity(plan.operations.len());
        for signature in plan.operations {
            let entries = chains
                .iter()
                .find(|(sig, _)| *sig == signature)
                .map(|(_, entries)| entries.clone())
                .unwrap_or_default();
            for entry in &entries {
                entry.advisor.interceptor.validate(&signature)?;
            }
            let signature = Arc::new(signature);
            let chain = (!entries.is_empty() && strategy.intercepts(&signature))
                .then(|| InterceptorChain::new(signature.clone(), entries));
            operations.push(ProxyOperation { signature, chain });
        }

        let intercepted = operations.iter().filter(|op| op.chain.is_some()).count();
        info!(
            bean = bean_name,
            target_type = %target_type,
            strategy = %kind,
            operations = operations.len(),
            intercepted,
            "built stand-in"
        );

        Ok(Proxy {
            identity: Arc::new(ProxyIdentity {
                bean_name: bean_name.to_string(),
                strategy: kind,
                target_type,
                exposed: plan.exposed,
            }),
            target,
            operations,
            env: Arc::new(ChainEnv::new(self.registry.clone(), self.events.clone())),
        })
    }
}
