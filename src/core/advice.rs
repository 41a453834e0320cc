//! Advice kinds, the [`Interceptor`] trait and the registration units that
//! attach interceptors to pointcuts.
//!
//! Every advice kind is expressed as an interceptor with around-semantics;
//! the closure adapters [`Before`], [`After`], [`AfterReturning`] and
//! [`AfterThrowing`] fix where the body runs relative to `proceed()`.
use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::core::{
    chain::Invocation,
    error::AopResult,
    joinpoint::{Failure, JoinPoint, Value},
    pointcut::{AdviceParam, Bindings, Pointcut},
    signature::Signature,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceKind {
    Around,
    Before,
    /// Runs whether the call returned or failed
    After,
    AfterReturning,
    AfterThrowing,
}

impl AdviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdviceKind::Around => "around",
            AdviceKind::Before => "before",
            AdviceKind::After => "after",
            AdviceKind::AfterReturning => "after_returning",
            AdviceKind::AfterThrowing => "after_throwing",
        }
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdviceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "around" => Ok(AdviceKind::Around),
            "before" => Ok(AdviceKind::Before),
            "after" => Ok(AdviceKind::After),
            "after_returning" => Ok(AdviceKind::AfterReturning),
            "after_throwing" => Ok(AdviceKind::AfterThrowing),
            other => Err(format!("unknown advice kind '{other}'")),
        }
    }
}

/// What an after-throwing body wants done with the failure it observed.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Rethrow,
    /// Turn the failed call into a normal return
    Return(Value),
}

/// Trait defining one unit of advice in a chain.
pub trait Interceptor: Send + Sync + 'static {
    fn kind(&self) -> AdviceKind {
        AdviceKind::Around
    }

    /// Run the advice. Call `invocation.proceed()` to continue down the
    /// chain; not calling it short-circuits the real operation.
    fn intercept(&self, invocation: &Invocation<'_>) -> Result<Value, Failure>;

    /// Build-time check against each operation the interceptor is attached to.
    fn validate(&self, _signature: &Signature) -> AopResult<()> {
        Ok(())
    }

    /// Wrap this interceptor for sharing between advisors and threads
    fn shared(self) -> Arc<dyn Interceptor>
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

/// Around advice from a closure.
pub struct Around<F>(F);

impl<F> Around<F>
where
    F: Fn(&Invocation<'_>) -> Result<Value, Failure> + Send + Sync + 'static,
{
    pub fn new(body: F) -> Self {
        Self(body)
    }
}

impl<F> Interceptor for Around<F>
where
    F: Fn(&Invocation<'_>) -> Result<Value, Failure> + Send + Sync + 'static,
{
    fn intercept(&self, invocation: &Invocation<'_>) -> Result<Value, Failure> {
        (self.0)(invocation)
    }
}

/// Runs its body, then always continues unless the body fails.
pub struct Before<F>(F);

impl<F> Before<F>
where
    F: Fn(&JoinPoint) -> Result<(), Failure> + Send + Sync + 'static,
{
    pub fn new(body: F) -> Self {
        Self(body)
    }
}

impl<F> Interceptor for Before<F>
where
    F: Fn(&JoinPoint) -> Result<(), Failure> + Send + Sync + 'static,
{
    fn kind(&self) -> AdviceKind {
        AdviceKind::Before
    }

    fn intercept(&self, invocation: &Invocation<'_>) -> Result<Value, Failure> {
        (self.0)(invocation.join_point())?;
        invocation.proceed()
    }
}

/// Before advice whose body also receives the parameters its pointcut bound.
pub struct BoundBefore<F>(F);

impl<F> BoundBefore<F>
where
    F: Fn(&JoinPoint, &Bindings) -> Result<(), Failure> + Send + Sync + 'static,
{
    pub fn new(body: F) -> Self {
        Self(body)
    }
}

impl<F> Interceptor for BoundBefore<F>
where
    F: Fn(&JoinPoint, &Bindings) -> Result<(), Failure> + Send + Sync + 'static,
{
    fn kind(&self) -> AdviceKind {
        AdviceKind::Before
    }

    fn intercept(&self, invocation: &Invocation<'_>) -> Result<Value, Failure> {
        (self.0)(invocation.join_point(), invocation.bindings())?;
        invocation.proceed()
    }
}

/// Runs after the call on both paths. A failing body replaces the outcome.
pub struct After<F>(F);

impl<F> After<F>
where
    F: Fn(&JoinPoint) -> Result<(), Failure> + Send + Sync + 'static,
{
    pub fn new(body: F) -> Self {
        Self(body)
    }
}

impl<F> Interceptor for After<F>
where
    F: Fn(&JoinPoint) -> Result<(), Failure> + Send + Sync + 'static,
{
    fn kind(&self) -> AdviceKind {
        AdviceKind::After
    }

    fn intercept(&self, invocation: &Invocation<'_>) -> Result<Value, Failure> {
        let outcome = invocation.proceed();
        (self.0)(invocation.join_point())?;
        outcome
    }
}

/// Observes the value of a call that returned normally.
pub struct AfterReturning<F>(F);

impl<F> AfterReturning<F>
where
    F: Fn(&JoinPoint, &Value) -> Result<(), Failure> + Send + Sync + 'static,
{
    pub fn new(body: F) -> Self {
        Self(body)
    }
}

impl<F> Interceptor for AfterReturning<F>
where
    F: Fn(&JoinPoint, &Value) -> Result<(), Failure> + Send + Sync + 'static,
{
    fn kind(&self) -> AdviceKind {
        AdviceKind::AfterReturning
    }

    fn intercept(&self, invocation: &Invocation<'_>) -> Result<Value, Failure> {
        let value = invocation.proceed()?;
        (self.0)(invocation.join_point(), &value)?;
        Ok(value)
    }
}

/// Observes a failure. The failure is re-raised unless the body explicitly
/// returns [`Disposition::Return`].
pub struct AfterThrowing<F>(F);

impl<F> AfterThrowing<F>
where
    F: Fn(&JoinPoint, &Failure) -> Disposition + Send + Sync + 'static,
{
    pub fn new(body: F) -> Self {
        Self(body)
    }
}

impl<F> Interceptor for AfterThrowing<F>
where
    F: Fn(&JoinPoint, &Failure) -> Disposition + Send + Sync + 'static,
{
    fn kind(&self) -> AdviceKind {
        AdviceKind::AfterThrowing
    }

    fn intercept(&self, invocation: &Invocation<'_>) -> Result<Value, Failure> {
        match invocation.proceed() {
            Ok(value) => Ok(value),
            Err(failure) => match (self.0)(invocation.join_point(), &failure) {
                Disposition::Rethrow => Err(failure),
                Disposition::Return(value) => {
                    tracing::debug!(
                        signature = %invocation.signature(),
                        error = %failure,
                        "after-throwing advice converted failure into a return"
                    );
                    Ok(value)
                }
            },
        }
    }
}

/// A compiled advice body bound to its pointcut.
pub struct Advisor {
    /// `aspect.advice`
    pub name: String,
    pub aspect: String,
    pub pointcut: Pointcut,
    /// `None` sorts after every explicit order
    pub order: Option<i32>,
    pub interceptor: Arc<dyn Interceptor>,
    /// Registration sequence, the tie-break for equal orders
    pub seq: usize,
}

impl Advisor {
    pub fn kind(&self) -> AdviceKind {
        self.interceptor.kind()
    }

    pub fn sort_key(&self) -> (i32, usize) {
        (self.order.unwrap_or(i32::MAX), self.seq)
    }
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisor")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("pointcut", &self.pointcut.expression())
            .field("order", &self.order)
            .field("seq", &self.seq)
            .finish()
    }
}

/// One advice body waiting to be registered.
pub struct AdviceSpec {
    pub name: String,
    pub pointcut: String,
    pub interceptor: Arc<dyn Interceptor>,
    /// Overrides the aspect's order for this body only
    pub order: Option<i32>,
    /// Named parameters the pointcut binds for the body
    pub params: Vec<AdviceParam>,
}

/// A named group of advice bodies sharing a default order.
///
/// Bodies that do not set their own order inherit the aspect's; among
/// themselves they then run in the order they were added.
pub struct Aspect {
    pub name: String,
    pub order: Option<i32>,
    pub advice: Vec<AdviceSpec>,
}

impl Aspect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: None,
            advice: Vec::new(),
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn advice(self, pointcut: impl Into<String>, interceptor: Arc<dyn Interceptor>) -> Self {
        let name = format!("{}#{}", interceptor.kind(), self.advice.len());
        self.named_advice(name, pointcut, interceptor, None)
    }

    pub fn named_advice(
        mut self,
        name: impl Into<String>,
        pointcut: impl Into<String>,
        interceptor: Arc<dyn Interceptor>,
        order: Option<i32>,
    ) -> Self {
        self.advice.push(AdviceSpec {
            name: name.into(),
            pointcut: pointcut.into(),
            interceptor,
            order,
            params: Vec::new(),
        });
        self
    }

    /// Add a body declaring `(name, type)` parameters. The pointcut must
    /// bind each of them; the body reads them through
    /// [`Invocation::bound`].
    pub fn bound_advice(
        mut self,
        pointcut: impl Into<String>,
        params: &[(&str, &str)],
        interceptor: Arc<dyn Interceptor>,
    ) -> Self {
        self.advice.push(AdviceSpec {
            name: format!("{}#{}", interceptor.kind(), self.advice.len()),
            pointcut: pointcut.into(),
            interceptor,
            order: None,
            params: params.iter().copied().map(AdviceParam::from).collect(),
        });
        self
    }

    pub fn around_bound<F>(self, pointcut: impl Into<String>, params: &[(&str, &str)], body: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value, Failure> + Send + Sync + 'static,
    {
        self.bound_advice(pointcut, params, Around::new(body).shared())
    }

    pub fn before_bound<F>(self, pointcut: impl Into<String>, params: &[(&str, &str)], body: F) -> Self
    where
        F: Fn(&JoinPoint, &Bindings) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.bound_advice(pointcut, params, BoundBefore::new(body).shared())
    }

    pub fn around<F>(self, pointcut: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> Result<Value, Failure> + Send + Sync + 'static,
    {
        self.advice(pointcut, Around::new(body).shared())
    }

    pub fn before<F>(self, pointcut: impl Into<String>, body: F) -> Self
    where
        F: Fn(&JoinPoint) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.advice(pointcut, Before::new(body).shared())
    }

    pub fn after<F>(self, pointcut: impl Into<String>, body: F) -> Self
    where
        F: Fn(&JoinPoint) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.advice(pointcut, After::new(body).shared())
    }

    pub fn after_returning<F>(self, pointcut: impl Into<String>, body: F) -> Self
    where
        F: Fn(&JoinPoint, &Value) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.advice(pointcut, AfterReturning::new(body).shared())
    }

    pub fn after_throwing<F>(self, pointcut: impl Into<String>, body: F) -> Self
    where
        F: Fn(&JoinPoint, &Failure) -> Disposition + Send + Sync + 'static,
    {
        self.advice(pointcut, AfterThrowing::new(body).shared())
    }
}

impl fmt::Debug for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let advice: Vec<_> = self.advice.iter().map(|a| a.name.as_str()).collect();
        f.debug_struct("Aspect")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("advice", &advice)
            .finish()
    }
}
