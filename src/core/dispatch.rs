//! Dispatch strategies: how a stand-in relates to the type it wraps.
//!
//! * Surface-based stand-ins expose only the user-defined interfaces the
//!   target implements. They cannot be viewed as the concrete type.
//! * Subtype-based stand-ins extend the concrete type, so they can be viewed
//!   as it and as every supertype. Sealed types cannot be extended and final
//!   operations cannot be overridden.
//! * Direct handles are used for beans no advice applies to; they are the
//!   target itself.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    config::models::{ProxyConfig, StrategyChoice},
    core::{
        error::{AopError, AopResult},
        signature::{Signature, TypeRegistry, Visibility},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Surface,
    Subtype,
    Direct,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Surface => "surface-based",
            StrategyKind::Subtype => "subtype-based",
            StrategyKind::Direct => "direct",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a strategy decided about one target type.
#[derive(Debug, Clone)]
pub struct DispatchPlan {
    pub kind: StrategyKind,
    /// Types the stand-in can be viewed as (plus their supertypes)
    pub exposed: Vec<String>,
    /// Operations callable through the stand-in, described on the target type
    pub operations: Vec<Signature>,
}

/// Trait defining how stand-ins are shaped for a target type
pub trait DispatchStrategy: Send + Sync + 'static {
    fn kind(&self) -> StrategyKind;

    /// Check the target type can be wrapped and work out its surface.
    /// Fails with `Unproxyable` when it cannot.
    fn prepare(&self, registry: &TypeRegistry, target_type: &str) -> AopResult<DispatchPlan>;

    /// Whether calls to this operation go through the interceptor chain.
    fn intercepts(&self, _signature: &Signature) -> bool {
        true
    }

    /// Create a new instance of this strategy as a boxed trait object
    fn boxed(self) -> Box<dyn DispatchStrategy>
    where
        Self: Sized,
    {
        Box::new(self)
    }
}

/// Interface-style dispatch.
#[derive(Debug, Default)]
pub struct SurfaceDispatch;

impl DispatchStrategy for SurfaceDispatch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Surface
    }

    fn prepare(&self, registry: &TypeRegistry, target_type: &str) -> AopResult<DispatchPlan> {
        let exposed: Vec<String> = registry
            .interfaces_of(target_type)
            .into_iter()
            .map(|d| d.name.clone())
            .collect();
        if exposed.is_empty() {
            return Err(AopError::Unproxyable {
                type_name: target_type.to_string(),
                reason: "implements no interface to expose".to_string(),
            });
        }

        let operations = registry
            .operations(target_type)?
            .into_iter()
            .filter(|sig| sig.visibility == Visibility::Public)
            .filter(|sig| {
                registry
                    .declarers_of(target_type, &sig.key())
                    .iter()
                    .any(|declarer| exposed.iter().any(|e| e == declarer))
            })
            .collect();

        Ok(DispatchPlan {
            kind: StrategyKind::Surface,
            exposed,
            operations,
        })
    }
}

/// Subclass-style dispatch.
#[derive(Debug, Default)]
pub struct SubtypeDispatch;

impl DispatchStrategy for SubtypeDispatch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Subtype
    }

    fn prepare(&self, registry: &TypeRegistry, target_type: &str) -> AopResult<DispatchPlan> {
        let desc = registry.lookup(target_type)?;
        if desc.sealed {
            return Err(AopError::Unproxyable {
                type_name: desc.name.clone(),
                reason: "type is sealed and cannot be extended".to_string(),
            });
        }
        if desc.is_interface() {
            return Err(AopError::Unproxyable {
                type_name: desc.name.clone(),
                reason: "an interface has no implementation to extend".to_string(),
            });
        }

        let operations = registry
            .operations(&desc.name)?
            .into_iter()
            .filter(|sig| sig.visibility != Visibility::Private)
            .collect();

        Ok(DispatchPlan {
            kind: StrategyKind::Subtype,
            exposed: vec![desc.name.clone()],
            operations,
        })
    }

    fn intercepts(&self, signature: &Signature) -> bool {
        !signature.is_final
    }
}

/// No stand-in at all: calls go straight to the target.
#[derive(Debug, Default)]
pub struct DirectDispatch;

impl DispatchStrategy for DirectDispatch {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Direct
    }

    fn prepare(&self, registry: &TypeRegistry, target_type: &str) -> AopResult<DispatchPlan> {
        let name = registry.resolve(target_type)?.to_string();
        let operations = registry
            .operations(&name)?
            .into_iter()
            .filter(|sig| sig.visibility != Visibility::Private)
            .collect();
        Ok(DispatchPlan {
            kind: StrategyKind::Direct,
            exposed: vec![name],
            operations,
        })
    }

    fn intercepts(&self, _signature: &Signature) -> bool {
        false
    }
}

/// Factory for choosing and creating dispatch strategies from configuration
pub struct DispatchStrategyFactory;

impl DispatchStrategyFactory {
    pub fn create_strategy(kind: StrategyKind) -> Box<dyn DispatchStrategy> {
        match kind {
            StrategyKind::Surface => SurfaceDispatch.boxed(),
            StrategyKind::Subtype => SubtypeDispatch.boxed(),
            StrategyKind::Direct => DirectDispatch.boxed(),
        }
    }

    /// Pick the strategy for a bean. A per-bean override wins; otherwise
    /// subtype-based dispatch is used unless `target_class` is off and the
    /// target implements at least one user-defined interface.
    pub fn select(
        config: &ProxyConfig,
        bean_name: &str,
        registry: &TypeRegistry,
        target_type: &str,
    ) -> StrategyKind {
        let choice = config
            .beans
            .get(bean_name)
            .map(|b| b.strategy)
            .unwrap_or_default();
        match choice {
            StrategyChoice::Surface => StrategyKind::Surface,
            StrategyChoice::Subtype => StrategyKind::Subtype,
            StrategyChoice::Auto => {
                if !config.target_class && !registry.interfaces_of(target_type).is_empty() {
                    StrategyKind::Surface
                } else {
                    StrategyKind::Subtype
                }
            }
        }
    }
}
