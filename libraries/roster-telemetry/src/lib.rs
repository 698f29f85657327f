//! Roster Telemetry
//!
//! Tracing for the roster service without ambient context. Each request gets
//! an explicit [`TraceContext`] that is passed down the call chain, and the
//! matching [`TraceSession`] hands back every span the trace exported,
//! serialized as OTLP-style JSON ([`ExportTraceRequest`]). Traces no session
//! claims are logged, or forwarded to a collector when one is configured.
//!
//! # Example
//!
//! ```rust,no_run
//! use opentelemetry::trace::Span as _;
//! use roster_telemetry::{Telemetry, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let telemetry = Telemetry::new(&TelemetryConfig::default());
//!
//!     let (trace, session) = telemetry.begin_request(None);
//!     let mut span = trace.start_span("load-profiles");
//!     span.end();
//!
//!     let reported = session.finish();
//!     println!("exported {} spans", reported.span_count());
//!     telemetry.shutdown();
//! }
//! ```

pub mod context;
pub mod export;

mod exporter;
mod forwarder;

pub use context::{
    remote_span_context, ReportedTrace, TraceContext, TraceSession, TRACEPARENT_HEADER,
};
pub use export::ExportTraceRequest;

use std::borrow::Cow;

use opentelemetry::trace::{Span, SpanContext, TraceFlags, TraceState, Tracer as _, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_sdk::trace::{IdGenerator, RandomIdGenerator, Sampler, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use serde::Deserialize;
use tracing::warn;

use exporter::{FallbackSink, ReportingExporter, TraceRegistry};
use forwarder::CollectorForwarder;

/// Instrumentation scope spans are created under.
pub(crate) const SCOPE_NAME: &str = "roster-telemetry";

/// Telemetry settings, embedded in the server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Value of the `service.name` resource attribute.
    #[serde(default = "default_service")]
    pub service: String,
    /// Execution environment recorded on the resource (`development`,
    /// `preview`, `production`).
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Base URL of an OTLP/HTTP collector. When unset, unclaimed traces
    /// are logged instead of forwarded.
    #[serde(default)]
    pub collector: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            environment: default_environment(),
            collector: None,
        }
    }
}

fn default_service() -> String {
    "roster".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// Process-wide telemetry: tracer provider, reporter registry, and the
/// fallback sink for unclaimed traces.
///
/// Built once at startup and injected into request handling through shared
/// state; nothing is registered globally, so two instances in one process
/// (as in tests) never observe each other's spans.
#[derive(Debug)]
pub struct Telemetry {
    provider: SdkTracerProvider,
    registry: TraceRegistry,
    ids: RandomIdGenerator,
    forwarder: Option<CollectorForwarder>,
}

impl Telemetry {
    /// Build the provider stack for `config`.
    ///
    /// Must be called inside a tokio runtime when a collector endpoint is
    /// configured, because the forwarder spawns a background task.
    pub fn new(config: &TelemetryConfig) -> Self {
        let registry = TraceRegistry::default();
        let forwarder = config.collector.as_deref().map(CollectorForwarder::start);
        let sink = match forwarder.clone() {
            Some(forwarder) => FallbackSink::Collector(forwarder),
            None => {
                if config.environment == "production" {
                    warn!("no collector endpoint configured in production, unclaimed traces will only be logged");
                }
                FallbackSink::Log
            }
        };

        let resource = Resource::builder()
            .with_service_name(config.service.clone())
            .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
            .with_attribute(KeyValue::new("env", config.environment.clone()))
            .build();

        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(ReportingExporter::new(registry.clone(), sink))
            .with_sampler(Sampler::AlwaysOn)
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(resource)
            .build();

        Self {
            provider,
            registry,
            ids: RandomIdGenerator::default(),
            forwarder,
        }
    }

    /// Begin the trace for one request.
    ///
    /// `remote` is the caller's span context when a `traceparent` header was
    /// sent; otherwise a root context is synthesized so the request's spans
    /// still share one fresh trace id. The reporter is registered before
    /// this returns, so no span started from the context can be missed.
    pub fn begin_request(&self, remote: Option<SpanContext>) -> (TraceContext, TraceSession) {
        let root = match remote {
            Some(context) if context.is_valid() => context,
            _ => self.synthesize_root(),
        };

        let trace_id = root.trace_id();
        let rx = self.registry.register(trace_id);
        let context = TraceContext::new(self.provider.clone(), root);
        let session = TraceSession::new(trace_id, rx, self.registry.clone());
        (context, session)
    }

    /// Start a span outside any request session.
    ///
    /// Used by the CLI paths; the span's trace has no registered reporter,
    /// so it reaches the fallback sink when it ends.
    pub fn start_span(&self, name: impl Into<Cow<'static, str>>) -> impl Span {
        self.provider.tracer(SCOPE_NAME).start(name)
    }

    /// Queue a reported trace for collector delivery.
    ///
    /// Returns `false` when no collector is configured, in which case the
    /// caller's log line is the trace's final destination.
    pub fn forward(&self, request: ExportTraceRequest) -> bool {
        match &self.forwarder {
            Some(forwarder) => {
                forwarder.enqueue(request);
                true
            }
            None => false,
        }
    }

    /// Flush pending exports and shut the provider down.
    pub fn shutdown(&self) {
        if let Err(err) = self.provider.shutdown() {
            warn!(error = %err, "telemetry shutdown reported an error");
        }
    }

    fn synthesize_root(&self) -> SpanContext {
        SpanContext::new(
            self.ids.new_trace_id(),
            self.ids.new_span_id(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        )
    }
}
