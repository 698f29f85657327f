/// Shared application state
use crate::services::ProfileLoader;
use roster_telemetry::Telemetry;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub loader: Arc<ProfileLoader>,
    pub telemetry: Arc<Telemetry>,
}

impl AppState {
    pub fn new(loader: Arc<ProfileLoader>, telemetry: Arc<Telemetry>) -> Self {
        Self { loader, telemetry }
    }
}
