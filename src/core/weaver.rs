//! The orchestrator: holds the metadata registry, named pointcuts, the
//! ordered advisor list and the bean table.
//!
//! Registration is single-threaded (`&mut self`); once beans are built they
//! are immutable and may be invoked from any number of threads. Aspects
//! registered after a bean was built do not apply to that bean.
use std::sync::{Arc, Weak};

use scc::HashMap;
use tracing::{debug, info};

use crate::{
    adapters::{interceptors::InterceptorFactory, tracing_sink::TracingEventSink},
    config::models::{ProxyConfig, WeaverConfig},
    core::{
        advice::{Advisor, Aspect},
        error::{AopError, AopResult},
        pointcut::{Pointcut, PointcutLibrary, StaticContext, StaticMatch},
        proxy::{AdvisorMatch, Proxy, ProxyFactory},
        signature::{Signature, TypeRegistry, TypeRegistryBuilder},
    },
    ports::{event_sink::EventSink, target::Target},
};

type BeanTable = HashMap<String, Arc<Proxy>>;

pub struct Weaver {
    registry: Arc<TypeRegistry>,
    pointcuts: PointcutLibrary,
    /// Kept sorted by [`Advisor::sort_key`]
    advisors: Vec<Arc<Advisor>>,
    next_seq: usize,
    events: Arc<dyn EventSink>,
    proxy_config: ProxyConfig,
    beans: Arc<BeanTable>,
}

impl Weaver {
    pub fn new(registry: TypeRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            pointcuts: PointcutLibrary::new(),
            advisors: Vec::new(),
            next_seq: 0,
            events: Arc::new(TracingEventSink),
            proxy_config: ProxyConfig::default(),
            beans: Arc::new(HashMap::new()),
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_proxy_config(mut self, config: ProxyConfig) -> Self {
        self.proxy_config = config;
        self
    }

    /// Build a weaver from a loaded configuration: catalog, named
    /// pointcuts, then every aspect in file order.
    pub fn from_config(config: &WeaverConfig, events: Arc<dyn EventSink>) -> AopResult<Self> {
        let registry = TypeRegistryBuilder::default()
            .register_all(config.types.iter().cloned())
            .build()?;
        let mut weaver = Self::new(registry)
            .with_event_sink(events)
            .with_proxy_config(config.proxy.clone());

        for (name, expression) in &config.pointcuts {
            weaver.define_pointcut(name, expression)?;
        }

        for aspect_config in &config.aspects {
            let mut aspect = Aspect::new(&aspect_config.name);
            aspect.order = aspect_config.order;
            for (index, advice) in aspect_config.advice.iter().enumerate() {
                let interceptor = InterceptorFactory::create(advice, &config.retry)?;
                let name = advice
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{}#{index}", advice.interceptor));
                aspect = aspect.named_advice(name, &advice.pointcut, interceptor, advice.order);
            }
            weaver.register_aspect(aspect)?;
        }

        info!(
            types = config.types.len(),
            pointcuts = config.pointcuts.len(),
            advisors = weaver.advisors.len(),
            "weaver configured"
        );
        Ok(weaver)
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn pointcuts(&self) -> &PointcutLibrary {
        &self.pointcuts
    }

    pub fn proxy_config(&self) -> &ProxyConfig {
        &self.proxy_config
    }

    pub fn define_pointcut(&mut self, name: &str, expression: &str) -> AopResult<()> {
        self.pointcuts.define(name, expression)?;
        debug!(name, expression, "pointcut defined");
        Ok(())
    }

    /// Compile an expression against the named pointcuts and the registry.
    pub fn compile(&self, expression: &str) -> AopResult<Pointcut> {
        self.pointcuts.compile(expression, &self.registry)
    }

    /// Register every advice body of an aspect. Either all of them are
    /// added or, when one pointcut fails to compile, none are.
    pub fn register_aspect(&mut self, aspect: Aspect) -> AopResult<()> {
        let mut compiled = Vec::with_capacity(aspect.advice.len());
        for body in aspect.advice {
            let pointcut = self
                .pointcuts
                .compile_with_params(&body.pointcut, &body.params, &self.registry)?;
            compiled.push((body, pointcut));
        }

        for (body, pointcut) in compiled {
            let advisor = Advisor {
                name: format!("{}.{}", aspect.name, body.name),
                aspect: aspect.name.clone(),
                pointcut,
                order: body.order.or(aspect.order),
                interceptor: body.interceptor,
                seq: self.next_seq,
            };
            self.next_seq += 1;
            debug!(
                advisor = %advisor.name,
                kind = %advisor.kind(),
                order = ?advisor.order,
                pointcut = %advisor.pointcut,
                "advisor registered"
            );
            self.advisors.push(Arc::new(advisor));
        }
        self.advisors.sort_by_key(|a| a.sort_key());
        Ok(())
    }

    /// Advisors in chain order.
    pub fn advisors(&self) -> &[Arc<Advisor>] {
        &self.advisors
    }

    fn factory(&self) -> ProxyFactory<'_> {
        ProxyFactory::new(&self.registry, &self.advisors, &self.events, &self.proxy_config)
    }

    /// Build a stand-in without registering it.
    pub fn proxy(&self, bean_name: &str, target: Arc<dyn Target>) -> AopResult<Proxy> {
        self.factory().build(bean_name, target)
    }

    /// Build a stand-in and publish it under `bean_name`.
    pub fn register_bean(&self, bean_name: &str, target: Arc<dyn Target>) -> AopResult<Arc<Proxy>> {
        let proxy = Arc::new(self.proxy(bean_name, target)?);
        self.beans
            .insert_sync(bean_name.to_string(), proxy.clone())
            .map_err(|_| {
                AopError::invalid_config(format!("bean '{bean_name}' is already registered"))
            })?;
        Ok(proxy)
    }

    pub fn bean(&self, bean_name: &str) -> AopResult<Arc<Proxy>> {
        self.beans
            .read_sync(bean_name, |_, proxy| proxy.clone())
            .ok_or_else(|| AopError::not_found("bean", bean_name))
    }

    /// A handle that looks a bean up when it is used rather than when it
    /// is created, so a target can hold a route to its own stand-in before
    /// that stand-in exists.
    pub fn provider(&self, bean_name: &str) -> BeanProvider {
        BeanProvider {
            bean_name: bean_name.to_string(),
            beans: Arc::downgrade(&self.beans),
        }
    }

    /// Static matching of every advisor against every operation of
    /// `type_name`, as it would be for a bean called `bean_name`.
    pub fn plan(&self, bean_name: &str, type_name: &str) -> AopResult<Vec<OperationPlan>> {
        let factory = self.factory();
        let owner = self.registry.resolve(type_name)?;
        Ok(self
            .registry
            .operations(owner)?
            .into_iter()
            .map(|signature| OperationPlan {
                matches: factory
                    .match_operation(bean_name, &signature)
                    .into_iter()
                    .filter(|m| m.decision.could_match())
                    .collect(),
                signature,
            })
            .collect())
    }

    /// Static decision of one expression for every user-defined operation.
    pub fn scan(&self, expression: &str, bean_name: Option<&str>) -> AopResult<Vec<(Signature, StaticMatch)>> {
        let pointcut = self.compile(expression)?;
        let mut decisions = Vec::new();
        for desc in self.registry.types().filter(|d| !TypeRegistry::is_builtin(&d.name)) {
            for signature in self.registry.operations(&desc.name)? {
                if signature.declaring_type != desc.name {
                    continue;
                }
                let mut ctx = StaticContext::new(&signature);
                if let Some(bean_name) = bean_name {
                    ctx = ctx.with_bean(bean_name);
                }
                let decision = pointcut.static_match(&ctx, &self.registry);
                decisions.push((signature, decision));
            }
        }
        Ok(decisions)
    }
}

impl std::fmt::Debug for Weaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Weaver")
            .field("pointcuts", &self.pointcuts)
            .field("advisors", &self.advisors)
            .field("beans", &self.beans.len())
            .finish()
    }
}

/// One operation and the advisors whose pointcuts could select it.
#[derive(Debug, Clone)]
pub struct OperationPlan {
    pub signature: Signature,
    pub matches: Vec<AdvisorMatch>,
}

impl OperationPlan {
    pub fn is_advised(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Deferred lookup of a registered bean.
#[derive(Debug, Clone)]
pub struct BeanProvider {
    bean_name: String,
    beans: Weak<BeanTable>,
}

impl BeanProvider {
    pub fn bean_name(&self) -> &str {
        &self.bean_name
    }

    /// Resolve the bean now. Fails with `NotFound` while it is not yet
    /// registered, or once the weaver is gone.
    pub fn get(&self) -> AopResult<Arc<Proxy>> {
        self.beans
            .upgrade()
            .and_then(|beans| beans.read_sync(&self.bean_name, |_, proxy| proxy.clone()))
            .ok_or_else(|| AopError::not_found("bean", &self.bean_name))
    }
}
