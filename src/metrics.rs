//! Metrics for weft, built on the `metrics` crate facade.
//!
//! No exporter is embedded; the application installs whatever recorder it
//! wants and these counters flow into it. Without a recorder every call is
//! a no-op.
//!
//! Provided metrics:
//! * `weft_advice_invocations_total` (counter, labels: advice)
//! * `weft_retry_attempts_total` (counter, labels: signature)
//! * `weft_failures_total` (counter, labels: signature)
//! * `weft_match_decisions_total` (counter, labels: matched)
//! * `weft_invocation_duration_seconds` (histogram, labels: operation)
//!
//! [`InvocationTimer`] uses `Drop` so the duration is recorded on every exit
//! path, failures included.
use std::{collections::HashMap, sync::Mutex, time::Instant};

use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::Lazy;

use crate::{
    core::signature::Signature,
    ports::event_sink::{AdviceEvent, EventSink, Phase},
};

pub const WEFT_ADVICE_INVOCATIONS_TOTAL: &str = "weft_advice_invocations_total";
pub const WEFT_RETRY_ATTEMPTS_TOTAL: &str = "weft_retry_attempts_total";
pub const WEFT_FAILURES_TOTAL: &str = "weft_failures_total";
pub const WEFT_MATCH_DECISIONS_TOTAL: &str = "weft_match_decisions_total";
pub const WEFT_INVOCATION_DURATION_SECONDS: &str = "weft_invocation_duration_seconds";

/// Per-phase event totals seen by any [`MetricsEventSink`], for ad-hoc
/// snapshots without a recorder.
pub static PHASE_TOTALS: Lazy<Mutex<HashMap<String, u64>>> = Lazy::new(|| {
    describe_counter!(
        WEFT_ADVICE_INVOCATIONS_TOTAL,
        Unit::Count,
        "Number of times an advice unit started running."
    );
    describe_counter!(
        WEFT_RETRY_ATTEMPTS_TOTAL,
        Unit::Count,
        "Attempts made by retry advice, first attempts included."
    );
    describe_counter!(
        WEFT_FAILURES_TOTAL,
        Unit::Count,
        "Failures that left the outermost advice of a call."
    );
    describe_counter!(
        WEFT_MATCH_DECISIONS_TOTAL,
        Unit::Count,
        "Pointcut evaluations, at build time and per call."
    );
    describe_histogram!(
        WEFT_INVOCATION_DURATION_SECONDS,
        Unit::Seconds,
        "Latency of calls made through an advised stand-in."
    );

    Mutex::new(HashMap::new())
});

fn record_phase(phase: Phase) {
    if let Ok(mut totals) = PHASE_TOTALS.lock() {
        *totals.entry(phase.as_str().to_string()).or_default() += 1;
    } else {
        tracing::error!("Failed to acquire lock for phase totals");
    }
}

/// Event sink translating interception events into counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsEventSink;

impl MetricsEventSink {
    pub fn new() -> Self {
        Lazy::force(&PHASE_TOTALS);
        Self
    }
}

impl EventSink for MetricsEventSink {
    fn emit(&self, event: &AdviceEvent) {
        record_phase(event.phase);
        match event.phase {
            Phase::AdviceEnter => counter!(
                WEFT_ADVICE_INVOCATIONS_TOTAL,
                "advice" => event.advice.clone().unwrap_or_default()
            )
            .increment(1),
            Phase::RetryAttempt => counter!(
                WEFT_RETRY_ATTEMPTS_TOTAL,
                "signature" => event.signature.clone()
            )
            .increment(1),
            Phase::Failure => counter!(
                WEFT_FAILURES_TOTAL,
                "signature" => event.signature.clone()
            )
            .increment(1),
            Phase::MatchDecision => counter!(
                WEFT_MATCH_DECISIONS_TOTAL,
                "matched" => event.matched.unwrap_or(false).to_string()
            )
            .increment(1),
            _ => {}
        }
    }
}

/// RAII helper measuring one advised call.
pub struct InvocationTimer {
    start: Instant,
    operation: String,
}

impl InvocationTimer {
    pub fn new(signature: &Signature) -> Self {
        Self {
            start: Instant::now(),
            operation: format!("{}.{}", signature.owner_type, signature.method_name),
        }
    }
}

impl Drop for InvocationTimer {
    fn drop(&mut self) {
        histogram!(
            WEFT_INVOCATION_DURATION_SECONDS,
            "operation" => self.operation.clone()
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

/// Initialize metric descriptions (idempotent).
pub fn init_metrics() -> eyre::Result<()> {
    tracing::info!("Initializing weft metrics");

    // Force lazy initialization of metrics descriptions
    Lazy::force(&PHASE_TOTALS);

    tracing::info!("weft metrics initialized");
    Ok(())
}

/// Snapshot of per-phase totals.
pub fn get_current_metrics() -> HashMap<String, u64> {
    PHASE_TOTALS
        .lock()
        .map(|totals| totals.clone())
        .unwrap_or_default()
}
