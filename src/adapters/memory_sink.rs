use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::ports::event_sink::{AdviceEvent, EventSink, Phase};

/// Keeps every event in memory, in emission order.
///
/// Meant for tests and for the CLI's dry runs; nothing is ever evicted.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<AdviceEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<AdviceEvent>> {
        // a panicking emitter cannot leave the vector half-written
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<AdviceEvent> {
        self.guard().clone()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.guard().iter().map(|e| e.phase).collect()
    }

    pub fn of_phase(&self, phase: Phase) -> Vec<AdviceEvent> {
        self.guard()
            .iter()
            .filter(|e| e.phase == phase)
            .cloned()
            .collect()
    }

    pub fn count(&self, phase: Phase) -> usize {
        self.guard().iter().filter(|e| e.phase == phase).count()
    }

    pub fn for_invocation(&self, id: Uuid) -> Vec<AdviceEvent> {
        self.guard()
            .iter()
            .filter(|e| e.invocation == Some(id))
            .cloned()
            .collect()
    }

    /// Call-time events rendered as `phase` or `phase:advice`, skipping
    /// match decisions.
    pub fn trace(&self) -> Vec<String> {
        self.guard()
            .iter()
            .filter(|e| e.phase != Phase::MatchDecision)
            .map(|e| match &e.advice {
                Some(advice) => format!("{}:{advice}", e.phase),
                None => e.phase.to_string(),
            })
            .collect()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &AdviceEvent) {
        self.guard().push(event.clone());
    }
}
