//! Subscriber installation and the spans weft opens around intercepted calls.
use eyre::{Result, WrapErr};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::core::signature::Signature;

/// Shape of the log lines written by the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line; `spans` adds the current span and span list
    Json { spans: bool },
    /// Multi-line human readable output
    Pretty,
}

fn env_filter_or_info() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Fails if one is already installed.
fn install(filter: EnvFilter, format: LogFormat) -> Result<()> {
    let layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);
    let subscriber = Registry::default().with(filter);

    match format {
        LogFormat::Json { spans } => subscriber
            .with(layer.json().with_current_span(spans).with_span_list(spans))
            .try_init(),
        LogFormat::Pretty => subscriber.with(layer.pretty().with_ansi(true)).try_init(),
    }
    .wrap_err("A global tracing subscriber is already installed")
}

/// JSON logging filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() -> Result<()> {
    install(env_filter_or_info(), LogFormat::Json { spans: true })?;
    tracing::info!("weft structured logging initialized");
    Ok(())
}

/// Pretty console logging filtered by `RUST_LOG` (default `info`).
pub fn init_console_tracing() -> Result<()> {
    install(env_filter_or_info(), LogFormat::Pretty)?;
    tracing::info!("weft console logging initialized");
    Ok(())
}

/// Logging as described by the `[logging]` config section. `level` is an
/// `EnvFilter` directive and is checked before anything is installed.
pub fn init_tracing_with_config(level: &str, json_format: bool, include_spans: bool) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).wrap_err_with(|| format!("Invalid log level: {level}"))?;
    let format = if json_format {
        LogFormat::Json {
            spans: include_spans,
        }
    } else {
        LogFormat::Pretty
    };
    install(filter, format)?;

    tracing::info!(level, ?format, "weft logging initialized");
    Ok(())
}

/// Span for one part of the program (weaver, factory, cli)
pub fn configure_component_tracing(component: &str) -> tracing::Span {
    tracing::info_span!("component", name = component)
}

/// Span covering one intercepted call. `outcome` is recorded when the
/// chain finishes.
pub fn create_invocation_span(signature: &Signature, invocation: Uuid) -> tracing::Span {
    tracing::debug_span!(
        "invocation",
        invocation.id = %invocation,
        operation = %signature,
        owner = %signature.owner_type,
        outcome = tracing::field::Empty,
    )
}
