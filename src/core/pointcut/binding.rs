//! Advice parameters bound from the join point.
//!
//! An advice body may declare named parameters. A designator whose body is
//! one of those names matches on the parameter's declared type instead, and
//! the matching value is handed to the body:
//!
//! ```text
//! args(arg, ..)       arg = first argument value
//! this(obj)           obj = the stand-in the call went through
//! target(obj)         obj = the real receiver
//! @target(ann)        ann = annotation on the receiver's class or a supertype
//! @within(ann)        ann = annotation on the declaring type
//! @annotation(ann)    ann = annotation on the operation
//! ```
use std::{fmt, sync::Arc};

use crate::{
    core::{
        error::{AopError, AopResult},
        joinpoint::{JoinPoint, ProxyIdentity, Value},
        pointcut::{
            parser::PointcutExpr,
            pattern::{ParamElem, TypePattern},
        },
        signature::{AnnotationRef, TypeRegistry},
    },
    ports::target::Target,
};

/// A named parameter declared by an advice body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdviceParam {
    pub name: String,
    pub type_name: String,
}

impl AdviceParam {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

impl From<(&str, &str)> for AdviceParam {
    fn from((name, type_name): (&str, &str)) -> Self {
        Self::new(name, type_name)
    }
}

/// Where a bound parameter takes its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSource {
    /// Argument at a fixed position
    Arg(usize),
    This,
    Target,
    TargetAnnotation(String),
    WithinAnnotation(String),
    OperationAnnotation(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub source: BindingSource,
}

/// The value bound to one parameter for one call.
#[derive(Debug, Clone)]
pub enum Bound {
    Value(Value),
    Proxy(ProxyIdentity),
    Target(Arc<dyn Target>),
    Annotation(AnnotationRef),
}

impl Bound {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Bound::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&ProxyIdentity> {
        match self {
            Bound::Proxy(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn as_target(&self) -> Option<&Arc<dyn Target>> {
        match self {
            Bound::Target(target) => Some(target),
            _ => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&AnnotationRef> {
        match self {
            Bound::Annotation(annotation) => Some(annotation),
            _ => None,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Value(value) => write!(f, "{value}"),
            Bound::Proxy(identity) => {
                write!(f, "{} stand-in of {}", identity.strategy, identity.target_type)
            }
            Bound::Target(target) => f.write_str(target.type_name()),
            Bound::Annotation(annotation) => write!(f, "{annotation}"),
        }
    }
}

/// Parameter values bound for one advice on one call.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    values: Vec<(String, Bound)>,
}

impl Bindings {
    pub fn get(&self, name: &str) -> Option<&Bound> {
        self.values
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bound)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Collect the values `bindings` name from a live call. Sources that
    /// have nothing to offer (an argument list shorter than expected after
    /// `proceed_with`) are left unbound.
    pub fn resolve(bindings: &[Binding], jp: &JoinPoint, registry: &TypeRegistry) -> Self {
        let values = bindings
            .iter()
            .filter_map(|binding| {
                let value = match &binding.source {
                    BindingSource::Arg(index) => jp.args().get(*index).cloned().map(Bound::Value),
                    BindingSource::This => Some(Bound::Proxy(jp.this().clone())),
                    BindingSource::Target => Some(Bound::Target(jp.target().clone())),
                    BindingSource::TargetAnnotation(reference) => registry
                        .lineage(jp.target_type())
                        .into_iter()
                        .find_map(|desc| desc.annotations.iter().find(|a| a.is(reference)))
                        .cloned()
                        .map(Bound::Annotation),
                    BindingSource::WithinAnnotation(reference) => registry
                        .lookup(&jp.signature().declaring_type)
                        .ok()
                        .and_then(|desc| desc.annotations.iter().find(|a| a.is(reference)))
                        .cloned()
                        .map(Bound::Annotation),
                    BindingSource::OperationAnnotation(reference) => jp
                        .signature()
                        .annotation(reference)
                        .cloned()
                        .map(Bound::Annotation),
                };
                value.map(|value| (binding.name.clone(), value))
            })
            .collect();
        Self { values }
    }
}

/// Replaces parameter names in designators with their declared types and
/// records where each parameter's value comes from.
pub(crate) struct Binder<'a> {
    params: &'a [AdviceParam],
    expression: &'a str,
    bindings: Vec<Binding>,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(params: &'a [AdviceParam], expression: &'a str) -> AopResult<Self> {
        for (i, param) in params.iter().enumerate() {
            if params[..i].iter().any(|p| p.name == param.name) {
                return Err(AopError::invalid_config(format!(
                    "advice parameter '{}' declared twice",
                    param.name
                )));
            }
        }
        Ok(Self {
            params,
            expression,
            bindings: Vec::new(),
        })
    }

    fn error(&self, message: String) -> AopError {
        AopError::InvalidPointcut {
            expression: self.expression.to_string(),
            position: 0,
            message,
        }
    }

    fn param(&self, name: &str) -> Option<AdviceParam> {
        self.params.iter().find(|p| p.name == name).cloned()
    }

    fn bind(&mut self, name: &str, source: BindingSource, exclusive: bool) -> AopResult<()> {
        if !exclusive {
            return Err(self.error(format!(
                "parameter '{name}' cannot be bound under '||' or '!'"
            )));
        }
        if self.bindings.iter().any(|b| b.name == name) {
            return Err(self.error(format!("parameter '{name}' is bound more than once")));
        }
        self.bindings.push(Binding {
            name: name.to_string(),
            source,
        });
        Ok(())
    }

    /// `exclusive` is false below `||` and `!`, where a match would not say
    /// which side supplied the value.
    pub(crate) fn rewrite(&mut self, expr: PointcutExpr, exclusive: bool) -> AopResult<PointcutExpr> {
        if self.params.is_empty() {
            return Ok(expr);
        }
        Ok(match expr {
            PointcutExpr::Args(mut pattern) => {
                for index in 0..pattern.elems().len() {
                    let param = match &pattern.elems()[index] {
                        ParamElem::Type(tp) => tp.literal().and_then(|name| self.param(name)),
                        _ => None,
                    };
                    let Some(param) = param else {
                        continue;
                    };
                    if pattern.elems()[..index]
                        .iter()
                        .any(|e| matches!(e, ParamElem::AnyRun))
                    {
                        return Err(self.error(format!(
                            "position of '{}' in args(..) follows '..' and is ambiguous",
                            param.name
                        )));
                    }
                    self.bind(&param.name, BindingSource::Arg(index), exclusive)?;
                    let declared = TypePattern::parse(&param.type_name).map_err(|e| self.error(e))?;
                    pattern = pattern.replace(index, ParamElem::Type(declared));
                }
                PointcutExpr::Args(pattern)
            }
            PointcutExpr::This(name) => match self.param(&name) {
                Some(param) => {
                    self.bind(&param.name, BindingSource::This, exclusive)?;
                    PointcutExpr::This(param.type_name)
                }
                None => PointcutExpr::This(name),
            },
            PointcutExpr::Target(name) => match self.param(&name) {
                Some(param) => {
                    self.bind(&param.name, BindingSource::Target, exclusive)?;
                    PointcutExpr::Target(param.type_name)
                }
                None => PointcutExpr::Target(name),
            },
            PointcutExpr::AtTarget(name) => match self.param(&name) {
                Some(param) => {
                    let source = BindingSource::TargetAnnotation(param.type_name.clone());
                    self.bind(&param.name, source, exclusive)?;
                    PointcutExpr::AtTarget(param.type_name)
                }
                None => PointcutExpr::AtTarget(name),
            },
            PointcutExpr::AtWithin(name) => match self.param(&name) {
                Some(param) => {
                    let source = BindingSource::WithinAnnotation(param.type_name.clone());
                    self.bind(&param.name, source, exclusive)?;
                    PointcutExpr::AtWithin(param.type_name)
                }
                None => PointcutExpr::AtWithin(name),
            },
            PointcutExpr::AtAnnotation(name) => match self.param(&name) {
                Some(param) => {
                    let source = BindingSource::OperationAnnotation(param.type_name.clone());
                    self.bind(&param.name, source, exclusive)?;
                    PointcutExpr::AtAnnotation(param.type_name)
                }
                None => PointcutExpr::AtAnnotation(name),
            },
            PointcutExpr::And(a, b) => PointcutExpr::And(
                Box::new(self.rewrite(*a, exclusive)?),
                Box::new(self.rewrite(*b, exclusive)?),
            ),
            PointcutExpr::Or(a, b) => PointcutExpr::Or(
                Box::new(self.rewrite(*a, false)?),
                Box::new(self.rewrite(*b, false)?),
            ),
            PointcutExpr::Not(inner) => PointcutExpr::Not(Box::new(self.rewrite(*inner, false)?)),
            other => other,
        })
    }

    /// Every declared parameter must have been bound.
    pub(crate) fn finish(self) -> AopResult<Vec<Binding>> {
        if let Some(unbound) = self
            .params
            .iter()
            .find(|p| !self.bindings.iter().any(|b| b.name == p.name))
        {
            return Err(self.error(format!(
                "parameter '{}' is not bound by the pointcut",
                unbound.name
            )));
        }
        Ok(self.bindings)
    }
}
