pub mod fn_target;
pub mod interceptors;
pub mod memory_sink;
pub mod tracing_sink;

/// Re-export commonly used types from adapters
pub use fn_target::FnTarget;
pub use interceptors::{InterceptorFactory, LogInterceptor, TimingInterceptor, TraceInterceptor};
pub use memory_sink::MemoryEventSink;
pub use tracing_sink::{FanoutEventSink, NoopEventSink, TracingEventSink};
