/// Telemetry middleware
use crate::{error::ServerError, state::AppState};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use roster_telemetry::{remote_span_context, TraceContext, TRACEPARENT_HEADER};

/// Response header carrying the request's trace id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Extension type to store the request's trace context
/// Can be used as an extractor in handlers
#[derive(Debug, Clone)]
pub struct RequestTrace(pub TraceContext);

/// Middleware that opens a trace session around the request and consumes
/// the reported spans once the response is ready.
///
/// The caller's `traceparent` header roots the trace when present; without
/// one a fresh trace id is synthesized. Reported traces are logged and, if
/// a collector is configured, queued for forwarding. The response always
/// carries the trace id in `x-trace-id`.
pub async fn telemetry_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let traceparent = request
        .headers()
        .get(TRACEPARENT_HEADER)
        .and_then(|h| h.to_str().ok());
    let remote = remote_span_context(traceparent);

    let (trace, session) = app_state.telemetry.begin_request(remote);
    let trace_id = trace.trace_id();
    request.extensions_mut().insert(RequestTrace(trace));

    let mut response = next.run(request).await;

    let reported = session.finish();
    if !reported.is_empty() {
        tracing::info!(
            trace_id = %reported.trace_id,
            spans = reported.span_count(),
            "request trace reported"
        );
        for export in reported.requests {
            if let Ok(payload) = serde_json::to_string(&export) {
                tracing::debug!("trace export for {}: {}", reported.trace_id, payload);
            }
            app_state.telemetry.forward(export);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&trace_id.to_string()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }

    response
}

/// Implement FromRequestParts so RequestTrace can be used as an extractor
#[axum::async_trait]
impl<S> FromRequestParts<S> for RequestTrace
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestTrace>()
            .cloned()
            .ok_or_else(|| ServerError::Internal("Request trace context missing".to_string()))
    }
}
