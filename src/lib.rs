//! Weft - method interception for registered beans.
//!
//! Weft wraps a target object in a stand-in that runs ordered advice around
//! its operations. Which operations are advised is decided by pointcut
//! expressions evaluated against registration-time metadata; what the advice
//! does is up to [`Interceptor`] implementations. Calls a target makes on
//! itself never pass through its stand-in and are never advised.
//!
//! # Features
//! - Pointcut language: `execution`, `within`, `args`, `bean`, `this`, `target`,
//!   `@annotation`, `@within`, `@target`, combined with `&&`, `||`, `!` and
//!   named references
//! - Static matching at build time, with per-call checks only where runtime
//!   values are needed
//! - Surface-based (interface) and subtype-based dispatch strategies
//! - Around, before, after, after-returning and after-throwing advice with
//!   deterministic ordering
//! - Annotation-driven bounded retry
//! - Structured events through a pluggable [`EventSink`], plus `tracing` and
//!   `metrics` integration
//! - TOML / YAML / JSON configuration with validation
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use weft::{
//!     Aspect, FnTarget, MethodDecl, TypeDescriptor, TypeRegistry, Value, Weaver,
//! };
//!
//! # fn main() -> Result<(), weft::AopError> {
//! let registry = TypeRegistry::builder()
//!     .register(
//!         TypeDescriptor::class("hello.aop.order.OrderService")
//!             .method(MethodDecl::new("orderItem").param("String")),
//!     )
//!     .build()?;
//!
//! let mut weaver = Weaver::new(registry);
//! weaver.register_aspect(
//!     Aspect::new("log").before("execution(* hello.aop.order..*(..))", |jp| {
//!         println!("[log] {}", jp.signature());
//!         Ok(())
//!     }),
//! )?;
//!
//! let target = FnTarget::new("hello.aop.order.OrderService")
//!     .on("orderItem", |_| Ok(Value::Unit))
//!     .shared();
//! let order_service = weaver.register_bean("orderService", target)?;
//! order_service.invoke("orderItem", vec![Value::from("itemA")])?;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! Domain logic lives in `core` and performs no I/O. `ports` holds the
//! traits for collaborators (the real target and the event destination);
//! `adapters` provides implementations of them along with the builtin
//! interceptors. `config` loads and validates configuration files.
//!
//! # Error Handling
//! Library APIs return [`AopResult`]. Failures raised by targets or advice
//! travel through the chain as [`Failure`] values and surface unchanged as
//! [`AopError::Target`]. The configuration layer and the binary use
//! `eyre::Result` with context attached through `WrapErr`.
//!
//! # Concurrency & Data Structures
//! Stand-ins are immutable once built and can be invoked from any number of
//! threads. The bean table is an `scc::HashMap` so lookups through
//! [`BeanProvider`] never block registration.
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the types most callers need
pub use crate::{
    adapters::{FnTarget, MemoryEventSink, NoopEventSink, TracingEventSink},
    core::{
        AdviceKind, AdviceParam, AnnotationRef, AopError, AopResult, Aspect, BeanProvider,
        Bindings, Bound, Disposition, Failure, Interceptor, Invocation, JoinPoint, MethodDecl,
        Proxy, Signature, StrategyKind, TypeDescriptor, TypeRegistry, Value, Visibility, Weaver,
    },
    ports::{AdviceEvent, EventSink, Phase, Target},
};
