//! Background forwarding to a trace collector
//!
//! Unclaimed traces are queued onto an unbounded channel and shipped by a
//! single background task as JSON over HTTP, so delivery never blocks the
//! thread that ended the span.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::export::ExportTraceRequest;

/// Handle to the background forwarding task.
#[derive(Clone, Debug)]
pub(crate) struct CollectorForwarder {
    tx: mpsc::UnboundedSender<ExportTraceRequest>,
}

impl CollectorForwarder {
    /// Spawn the forwarding task. Must be called inside a tokio runtime.
    pub(crate) fn start(endpoint: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let url = format!("{}/v1/traces", endpoint.trim_end_matches('/'));
        tokio::spawn(run(url, rx));
        Self { tx }
    }

    /// Queue a trace for delivery. Sends after the task has stopped are
    /// dropped, which only happens during process shutdown.
    pub(crate) fn enqueue(&self, request: ExportTraceRequest) {
        let _ = self.tx.send(request);
    }
}

async fn run(url: String, mut rx: mpsc::UnboundedReceiver<ExportTraceRequest>) {
    let client = reqwest::Client::new();
    while let Some(request) = rx.recv().await {
        match client.post(&url).json(&request).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(spans = request.span_count(), "forwarded trace to collector");
            }
            Ok(response) => {
                warn!(status = %response.status(), "collector rejected trace export");
            }
            Err(err) => {
                warn!(error = %err, "failed to reach trace collector");
            }
        }
    }
}
