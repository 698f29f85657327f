//! Span export routing
//!
//! Finished spans arrive here from the provider's simple processor. Each
//! batch is grouped by trace id and serialized; a group whose trace id has a
//! registered reporter is delivered to that request's session, everything
//! else goes to the process-wide fallback sink.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use opentelemetry::trace::TraceId;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use opentelemetry_sdk::Resource;
use tokio::sync::mpsc;
use tracing::debug;

use crate::export::ExportTraceRequest;
use crate::forwarder::CollectorForwarder;

/// Reporter registry keyed by trace id.
///
/// A request's session registers itself before any handler work starts and
/// unregisters when it finishes, so exports for its trace are routed back to
/// the request that produced them.
#[derive(Clone, Debug, Default)]
pub(crate) struct TraceRegistry {
    inner: Arc<Mutex<HashMap<TraceId, mpsc::UnboundedSender<ExportTraceRequest>>>>,
}

impl TraceRegistry {
    pub(crate) fn register(&self, trace_id: TraceId) -> mpsc::UnboundedReceiver<ExportTraceRequest> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().insert(trace_id, tx);
        rx
    }

    pub(crate) fn unregister(&self, trace_id: TraceId) {
        self.inner.lock().unwrap().remove(&trace_id);
    }

    /// Deliver a serialized trace to its registered reporter. The request
    /// comes back when no live reporter exists for the trace id.
    fn report(
        &self,
        trace_id: TraceId,
        request: ExportTraceRequest,
    ) -> Result<(), ExportTraceRequest> {
        let sender = self.inner.lock().unwrap().get(&trace_id).cloned();
        match sender {
            Some(tx) => tx.send(request).map_err(|rejected| rejected.0),
            None => Err(request),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// Where traces with no registered reporter go.
#[derive(Debug)]
pub(crate) enum FallbackSink {
    /// Log the serialized trace. The development default.
    Log,
    /// Queue for the background collector forwarder.
    Collector(CollectorForwarder),
}

impl FallbackSink {
    fn consume(&self, trace_id: TraceId, request: ExportTraceRequest) {
        match self {
            Self::Log => {
                let payload = serde_json::to_string(&request).unwrap_or_default();
                debug!(
                    trace_id = %trace_id,
                    spans = request.span_count(),
                    payload = %payload,
                    "trace finished outside a request session"
                );
            }
            Self::Collector(forwarder) => forwarder.enqueue(request),
        }
    }
}

/// Span exporter that routes each finished trace to the request that
/// created it, with unclaimed traces falling through to the sink.
#[derive(Debug)]
pub(crate) struct ReportingExporter {
    registry: TraceRegistry,
    sink: FallbackSink,
    resource: Resource,
}

impl ReportingExporter {
    pub(crate) fn new(registry: TraceRegistry, sink: FallbackSink) -> Self {
        Self {
            registry,
            sink,
            resource: Resource::builder_empty().build(),
        }
    }

    fn dispatch(&self, batch: Vec<SpanData>) {
        for (trace_id, spans) in group_by_trace(batch) {
            let request = ExportTraceRequest::from_spans(&spans, &self.resource);
            if let Err(unclaimed) = self.registry.report(trace_id, request) {
                self.sink.consume(trace_id, unclaimed);
            }
        }
    }
}

impl SpanExporter for ReportingExporter {
    fn export(
        &self,
        batch: Vec<SpanData>,
    ) -> impl std::future::Future<Output = OTelSdkResult> + Send {
        self.dispatch(batch);
        std::future::ready(Ok(()))
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = resource.clone();
    }
}

fn group_by_trace(batch: Vec<SpanData>) -> Vec<(TraceId, Vec<SpanData>)> {
    let mut groups: Vec<(TraceId, Vec<SpanData>)> = Vec::new();
    for span in batch {
        let trace_id = span.span_context.trace_id();
        match groups.iter_mut().find(|(id, _)| *id == trace_id) {
            Some((_, spans)) => spans.push(span),
            None => groups.push((trace_id, vec![span])),
        }
    }
    groups
}
