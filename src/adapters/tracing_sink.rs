use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::ports::event_sink::{AdviceEvent, EventSink, Phase};

/// Forwards events to `tracing`. Failures are logged at warn level, match
/// decisions at trace level and everything else at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &AdviceEvent) {
        let invocation = event.invocation.map(|id| id.to_string()).unwrap_or_default();
        let advice = event.advice.as_deref().unwrap_or("");
        match event.phase {
            Phase::MatchDecision => trace!(
                target: "weft::events",
                signature = %event.signature,
                advice,
                matched = event.matched,
                invocation = invocation.as_str(),
                "match decision"
            ),
            Phase::Failure | Phase::RetryExhausted | Phase::RetryFailure => warn!(
                target: "weft::events",
                phase = %event.phase,
                signature = %event.signature,
                advice,
                attempt = event.attempt,
                error = event.error.as_deref().unwrap_or(""),
                invocation = invocation.as_str(),
                "advice event"
            ),
            _ => debug!(
                target: "weft::events",
                phase = %event.phase,
                signature = %event.signature,
                advice,
                attempt = event.attempt,
                error = event.error.as_deref(),
                invocation = invocation.as_str(),
                "advice event"
            ),
        }
    }
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &AdviceEvent) {}
}

/// Delivers each event to several sinks, in the order they were added.
#[derive(Default, Clone)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutEventSink {
    fn emit(&self, event: &AdviceEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

impl std::fmt::Debug for FanoutEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutEventSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory_sink::MemoryEventSink;

    #[test]
    fn test_fanout_reaches_every_sink() {
        let first = Arc::new(MemoryEventSink::new());
        let second = Arc::new(MemoryEventSink::new());
        let fanout = FanoutEventSink::new()
            .with(first.clone())
            .with(Arc::new(NoopEventSink))
            .with(Arc::new(TracingEventSink))
            .with(second.clone());
        assert_eq!(fanout.len(), 4);

        fanout.emit(&AdviceEvent::new(Phase::TargetInvoke, "op()"));
        assert_eq!(first.phases(), vec![Phase::TargetInvoke]);
        assert_eq!(second.phases(), vec![Phase::TargetInvoke]);
    }
}
