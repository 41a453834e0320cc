pub mod event_sink;
pub mod target;

pub use event_sink::{AdviceEvent, EventSink, Phase};
pub use target::Target;
