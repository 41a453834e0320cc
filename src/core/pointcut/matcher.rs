//! Evaluation of parsed pointcuts.
//!
//! Static evaluation runs once per (target type, bean, operation) when a
//! stand-in is built and yields a tri-state [`StaticMatch`]. Anything that
//! comes out `Maybe` is re-evaluated per call against the live join point.
use std::fmt;

use serde::Serialize;

use crate::core::{
    joinpoint::JoinPoint,
    pointcut::{
        parser::PointcutExpr,
        pattern::{ExecutionPattern, TypePattern},
    },
    signature::{Signature, TypeRegistry},
};

/// Outcome of evaluating a pointcut without runtime values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticMatch {
    Always,
    Never,
    /// Decidable only per call
    Maybe,
}

impl StaticMatch {
    pub fn from_bool(matched: bool) -> Self {
        if matched {
            StaticMatch::Always
        } else {
            StaticMatch::Never
        }
    }

    pub fn and(self, other: StaticMatch) -> StaticMatch {
        match (self, other) {
            (StaticMatch::Never, _) | (_, StaticMatch::Never) => StaticMatch::Never,
            (StaticMatch::Always, StaticMatch::Always) => StaticMatch::Always,
            _ => StaticMatch::Maybe,
        }
    }

    pub fn or(self, other: StaticMatch) -> StaticMatch {
        match (self, other) {
            (StaticMatch::Always, _) | (_, StaticMatch::Always) => StaticMatch::Always,
            (StaticMatch::Never, StaticMatch::Never) => StaticMatch::Never,
            _ => StaticMatch::Maybe,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> StaticMatch {
        match self {
            StaticMatch::Always => StaticMatch::Never,
            StaticMatch::Never => StaticMatch::Always,
            StaticMatch::Maybe => StaticMatch::Maybe,
        }
    }

    /// Whether the operation must be wrapped.
    pub fn could_match(self) -> bool {
        self != StaticMatch::Never
    }
}

impl fmt::Display for StaticMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StaticMatch::Always => "always",
            StaticMatch::Never => "never",
            StaticMatch::Maybe => "runtime check",
        })
    }
}

/// What is known about an operation before it is called.
#[derive(Debug, Clone, Copy)]
pub struct StaticContext<'a> {
    pub signature: &'a Signature,
    /// Registered component name; `bean(..)` never matches without one
    pub bean_name: Option<&'a str>,
}

impl<'a> StaticContext<'a> {
    pub fn new(signature: &'a Signature) -> Self {
        Self {
            signature,
            bean_name: None,
        }
    }

    pub fn with_bean(mut self, bean_name: &'a str) -> Self {
        self.bean_name = Some(bean_name);
        self
    }
}

pub fn evaluate_static(
    expr: &PointcutExpr,
    ctx: &StaticContext<'_>,
    registry: &TypeRegistry,
) -> StaticMatch {
    let sig = ctx.signature;
    match expr {
        PointcutExpr::Execution(pattern) => {
            StaticMatch::from_bool(execution_matches(pattern, sig, registry))
        }
        PointcutExpr::Within(pattern) => StaticMatch::from_bool(pattern.matches(&sig.declaring_type)),
        PointcutExpr::Bean(pattern) => {
            StaticMatch::from_bool(ctx.bean_name.is_some_and(|bean| pattern.matches(bean)))
        }
        PointcutExpr::Args(pattern) => {
            let params = &sig.parameter_types;
            if !pattern.accepts_arity(params.len()) {
                StaticMatch::Never
            } else if pattern.matches_with(params.len(), |tp, i| {
                type_satisfies(registry, &params[i], tp)
            }) {
                // declared types already guarantee every runtime value fits
                StaticMatch::Always
            } else {
                StaticMatch::Maybe
            }
        }
        PointcutExpr::AtAnnotation(annotation) => {
            StaticMatch::from_bool(sig.has_annotation(annotation))
        }
        PointcutExpr::AtWithin(annotation) => StaticMatch::from_bool(
            registry
                .lookup(&sig.declaring_type)
                .is_ok_and(|declaring| declaring.has_annotation(annotation)),
        ),
        PointcutExpr::AtTarget(_) | PointcutExpr::This(_) | PointcutExpr::Target(_) => {
            StaticMatch::Maybe
        }
        // references are inlined before evaluation
        PointcutExpr::Reference(_) => StaticMatch::Never,
        PointcutExpr::And(a, b) => match evaluate_static(a, ctx, registry) {
            StaticMatch::Never => StaticMatch::Never,
            left => left.and(evaluate_static(b, ctx, registry)),
        },
        PointcutExpr::Or(a, b) => match evaluate_static(a, ctx, registry) {
            StaticMatch::Always => StaticMatch::Always,
            left => left.or(evaluate_static(b, ctx, registry)),
        },
        PointcutExpr::Not(inner) => evaluate_static(inner, ctx, registry).not(),
    }
}

/// Full evaluation against a live call.
pub fn evaluate_dynamic(expr: &PointcutExpr, jp: &JoinPoint, registry: &TypeRegistry) -> bool {
    match expr {
        PointcutExpr::Args(pattern) => {
            let args = jp.args();
            pattern.matches_with(args.len(), |tp, i| {
                type_satisfies(registry, args[i].runtime_type(), tp)
            })
        }
        PointcutExpr::AtTarget(annotation) => registry
            .lineage(jp.target_type())
            .iter()
            .any(|desc| desc.has_annotation(annotation)),
        PointcutExpr::This(type_name) => jp.this().viewable_as(registry, type_name),
        PointcutExpr::Target(type_name) => registry.is_assignable(jp.target_type(), type_name),
        PointcutExpr::And(a, b) => {
            evaluate_dynamic(a, jp, registry) && evaluate_dynamic(b, jp, registry)
        }
        PointcutExpr::Or(a, b) => {
            evaluate_dynamic(a, jp, registry) || evaluate_dynamic(b, jp, registry)
        }
        PointcutExpr::Not(inner) => !evaluate_dynamic(inner, jp, registry),
        static_only => {
            let ctx = StaticContext::new(jp.signature()).with_bean(jp.bean_name());
            evaluate_static(static_only, &ctx, registry) == StaticMatch::Always
        }
    }
}

/// `execution` compares declared types exactly. The declaring-type part is
/// tried against every type in the owner's hierarchy that declares the same
/// operation, so a pattern naming an interface matches its implementations'
/// overrides but not operations the interface never declared.
fn execution_matches(pattern: &ExecutionPattern, sig: &Signature, registry: &TypeRegistry) -> bool {
    if pattern.modifier.is_some_and(|m| m != sig.visibility) {
        return false;
    }
    if !pattern.return_type.matches(&sig.return_type)
        || !pattern.name.matches(&sig.method_name)
        || !pattern.params.matches(&sig.parameter_types)
    {
        return false;
    }
    if !pattern
        .throws
        .iter()
        .all(|t| sig.throws.iter().any(|declared| t.matches(declared)))
    {
        return false;
    }

    let Some(type_pattern) = &pattern.declaring_type else {
        return true;
    };
    let declarers = registry.declarers_of(&sig.owner_type, &sig.key());
    if declarers.is_empty() {
        type_pattern.matches(&sig.declaring_type)
    } else {
        declarers.iter().any(|d| type_pattern.matches(d))
    }
}

/// Whether a value of `type_name` is acceptable for `pattern` (the type
/// itself or any supertype matches).
fn type_satisfies(registry: &TypeRegistry, type_name: &str, pattern: &TypePattern) -> bool {
    pattern.matches(type_name)
        || registry
            .lineage(type_name)
            .iter()
            .any(|desc| pattern.matches(&desc.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tri_state_algebra() {
        use StaticMatch::*;
        assert_eq!(Always.and(Maybe), Maybe);
        assert_eq!(Never.and(Maybe), Never);
        assert_eq!(Always.or(Maybe), Always);
        assert_eq!(Never.or(Maybe), Maybe);
        assert_eq!(Maybe.not(), Maybe);
        assert_eq!(Always.not(), Never);
        assert!(!Never.could_match());
        assert!(Maybe.could_match());
    }
}
