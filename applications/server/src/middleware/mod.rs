/// Request middleware
pub mod telemetry;

pub use telemetry::{telemetry_middleware, RequestTrace, TRACE_ID_HEADER};
