pub mod advice;
pub mod chain;
pub mod dispatch;
pub mod error;
pub mod joinpoint;
pub mod pointcut;
pub mod proxy;
pub mod retry;
pub mod signature;
pub mod weaver;

pub use advice::{AdviceKind, Aspect, Disposition, Interceptor};
pub use chain::Invocation;
pub use dispatch::{DispatchStrategyFactory, StrategyKind};
pub use error::{AopError, AopResult};
pub use joinpoint::{Failure, JoinPoint, Value};
pub use pointcut::{AdviceParam, Bindings, Bound, Pointcut, PointcutLibrary, StaticMatch};
pub use proxy::{Proxy, ProxyFactory, ProxyView};
pub use retry::{RetryInterceptor, RetryPolicy};
pub use signature::{
    AnnotationRef, MethodDecl, Signature, TypeDescriptor, TypeRegistry, Visibility,
};
pub use weaver::{BeanProvider, OperationPlan, Weaver};
