//! Request-scoped trace context
//!
//! The explicit context object that replaces ambient current-span lookup:
//! request handling receives a [`TraceContext`], starts child spans from it,
//! and the matching [`TraceSession`] collects everything the trace exported.

use std::borrow::Cow;
use std::collections::HashMap;

use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{Span, SpanContext, TraceContextExt, TraceId, Tracer, TracerProvider};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tokio::sync::mpsc;

use crate::export::{ExportTraceRequest, SpanModel};
use crate::exporter::TraceRegistry;
use crate::SCOPE_NAME;

/// W3C header carrying the caller's span context.
pub const TRACEPARENT_HEADER: &str = "traceparent";

/// Cloneable request-scoped handle for starting spans under one trace.
///
/// Built by [`crate::Telemetry::begin_request`] and passed explicitly down
/// the call chain; nothing here reads process-global state.
#[derive(Clone, Debug)]
pub struct TraceContext {
    provider: SdkTracerProvider,
    root: Context,
    trace_id: TraceId,
}

impl TraceContext {
    pub(crate) fn new(provider: SdkTracerProvider, root: SpanContext) -> Self {
        let trace_id = root.trace_id();
        Self {
            provider,
            root: Context::new().with_remote_span_context(root),
            trace_id,
        }
    }

    /// Start a span parented to the request's root span context.
    ///
    /// The span is recorded when it is ended or dropped, whichever comes
    /// first, and reaches the exporter exactly once.
    pub fn start_span(&self, name: impl Into<Cow<'static, str>>) -> impl Span {
        self.provider.tracer(SCOPE_NAME).start_with_context(name, &self.root)
    }

    /// Trace id shared by every span started from this context.
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The root span context child spans are parented to.
    pub fn span_context(&self) -> SpanContext {
        self.root.span().span_context().clone()
    }
}

/// Everything exported under one request's trace.
#[derive(Debug)]
pub struct ReportedTrace {
    pub trace_id: TraceId,
    pub requests: Vec<ExportTraceRequest>,
}

impl ReportedTrace {
    /// Total spans across the reported export requests.
    pub fn span_count(&self) -> usize {
        self.requests.iter().map(ExportTraceRequest::span_count).sum()
    }

    /// Span names in report order.
    pub fn span_names(&self) -> Vec<String> {
        self.spans().map(|span| span.name.clone()).collect()
    }

    /// Iterate every reported span.
    pub fn spans(&self) -> impl Iterator<Item = &SpanModel> {
        self.requests.iter().flat_map(ExportTraceRequest::spans)
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

/// Collector side of a request's trace, owned by whoever runs the request
/// to completion.
///
/// The session holds the reporter registration for its trace id; finishing
/// or dropping it removes the registration, after which late exports for
/// the id fall through to the process-wide sink.
#[derive(Debug)]
pub struct TraceSession {
    trace_id: TraceId,
    rx: mpsc::UnboundedReceiver<ExportTraceRequest>,
    registry: TraceRegistry,
    done: bool,
}

impl TraceSession {
    pub(crate) fn new(
        trace_id: TraceId,
        rx: mpsc::UnboundedReceiver<ExportTraceRequest>,
        registry: TraceRegistry,
    ) -> Self {
        Self {
            trace_id,
            rx,
            registry,
            done: false,
        }
    }

    /// Unregister and drain everything reported for this trace so far.
    ///
    /// Spans end synchronously into the registry on the thread that ends
    /// them, so by the time request handling returns the drain is complete.
    pub fn finish(mut self) -> ReportedTrace {
        self.registry.unregister(self.trace_id);
        self.done = true;

        let mut requests = Vec::new();
        while let Ok(request) = self.rx.try_recv() {
            requests.push(request);
        }
        ReportedTrace {
            trace_id: self.trace_id,
            requests,
        }
    }
}

impl Drop for TraceSession {
    fn drop(&mut self) {
        // Covers panic and early-return paths that never reach finish().
        if !self.done {
            self.registry.unregister(self.trace_id);
        }
    }
}

/// Extract the caller's span context from a `traceparent` header value.
///
/// Returns `None` for absent, malformed, or all-zero contexts, per the W3C
/// rule that an unusable traceparent is ignored rather than rejected.
pub fn remote_span_context(traceparent: Option<&str>) -> Option<SpanContext> {
    let value = traceparent?;
    let mut carrier = HashMap::with_capacity(1);
    carrier.insert(TRACEPARENT_HEADER.to_string(), value.to_string());

    let extracted = TraceContextPropagator::new().extract_with_context(&Context::new(), &carrier);
    let remote = extracted.span().span_context().clone();
    remote.is_valid().then_some(remote)
}
