//! Serialized trace exports
//!
//! The wire model for finished spans: OTLP-style JSON with camelCase keys,
//! hex-encoded ids, and nanosecond timestamps carried as decimal strings.
//! This is what request sessions receive and what the collector forwarder
//! POSTs, so the same shape serves both consumers.

use std::time::{SystemTime, UNIX_EPOCH};

use opentelemetry::trace::{SpanId, SpanKind, Status};
use opentelemetry::{Array, KeyValue, Value};
use opentelemetry_sdk::trace::SpanData;
use opentelemetry_sdk::Resource;
use serde::{Deserialize, Serialize};

/// One trace-service export request: every span in it belongs to a single
/// trace, grouped under the process resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportTraceRequest {
    pub resource_spans: Vec<ResourceSpans>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpans {
    pub resource: ResourceModel,
    pub scope_spans: Vec<ScopeSpans>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceModel {
    pub attributes: Vec<KeyValueModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeSpans {
    pub scope: ScopeModel,
    pub spans: Vec<SpanModel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeModel {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A finished span. Ids are lowercase hex (32 chars for the trace id, 16
/// for span ids); a root span omits `parentSpanId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanModel {
    pub trace_id: String,
    pub span_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    pub name: String,
    pub kind: u32,
    pub start_time_unix_nano: String,
    pub end_time_unix_nano: String,
    pub attributes: Vec<KeyValueModel>,
    pub status: StatusModel,
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValueModel {
    pub key: String,
    pub value: AnyValue,
}

/// Attribute value in the tagged form the trace service expects, e.g.
/// `{"stringValue": "production"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnyValue {
    #[serde(rename = "stringValue")]
    String(String),
    #[serde(rename = "boolValue")]
    Bool(bool),
    #[serde(rename = "intValue")]
    Int(i64),
    #[serde(rename = "doubleValue")]
    Double(f64),
    #[serde(rename = "arrayValue")]
    Array(ArrayValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayValue {
    pub values: Vec<AnyValue>,
}

/// Status codes carried on [`StatusModel`].
const STATUS_UNSET: u32 = 0;
const STATUS_OK: u32 = 1;
const STATUS_ERROR: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusModel {
    pub code: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExportTraceRequest {
    /// Serialize finished spans into one export request.
    ///
    /// Spans are grouped by instrumentation scope in first-seen order; the
    /// caller is responsible for only passing spans of a single trace.
    pub fn from_spans(spans: &[SpanData], resource: &Resource) -> Self {
        let mut scopes: Vec<ScopeSpans> = Vec::new();
        for span in spans {
            let name = span.instrumentation_scope.name();
            let version = span.instrumentation_scope.version();
            let idx = match scopes
                .iter()
                .position(|s| s.scope.name == name && s.scope.version.as_deref() == version)
            {
                Some(idx) => idx,
                None => {
                    scopes.push(ScopeSpans {
                        scope: ScopeModel {
                            name: name.to_string(),
                            version: version.map(str::to_string),
                        },
                        spans: Vec::new(),
                    });
                    scopes.len() - 1
                }
            };
            scopes[idx].spans.push(SpanModel::from_span(span));
        }

        let attributes = resource
            .iter()
            .map(|(key, value)| KeyValueModel {
                key: key.as_str().to_string(),
                value: AnyValue::from_value(value),
            })
            .collect();

        Self {
            resource_spans: vec![ResourceSpans {
                resource: ResourceModel { attributes },
                scope_spans: scopes,
            }],
        }
    }

    /// Total number of spans across all scope groups.
    pub fn span_count(&self) -> usize {
        self.spans().count()
    }

    /// Iterate every span in the request.
    pub fn spans(&self) -> impl Iterator<Item = &SpanModel> {
        self.resource_spans
            .iter()
            .flat_map(|rs| rs.scope_spans.iter())
            .flat_map(|ss| ss.spans.iter())
    }
}

impl SpanModel {
    fn from_span(span: &SpanData) -> Self {
        let context = &span.span_context;
        let parent_span_id = (span.parent_span_id != SpanId::INVALID)
            .then(|| span.parent_span_id.to_string());

        Self {
            trace_id: context.trace_id().to_string(),
            span_id: context.span_id().to_string(),
            parent_span_id,
            name: span.name.to_string(),
            kind: kind_code(&span.span_kind),
            start_time_unix_nano: unix_nanos(span.start_time),
            end_time_unix_nano: unix_nanos(span.end_time),
            attributes: span.attributes.iter().map(KeyValueModel::from_key_value).collect(),
            status: StatusModel::from_status(&span.status),
            flags: u32::from(context.trace_flags().is_sampled()),
        }
    }
}

impl KeyValueModel {
    fn from_key_value(kv: &KeyValue) -> Self {
        Self {
            key: kv.key.as_str().to_string(),
            value: AnyValue::from_value(&kv.value),
        }
    }
}

impl AnyValue {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(b) => Self::Bool(*b),
            Value::I64(i) => Self::Int(*i),
            Value::F64(f) => Self::Double(*f),
            Value::String(s) => Self::String(s.to_string()),
            Value::Array(array) => Self::Array(ArrayValue::from_array(array)),
            // Value is non_exhaustive upstream.
            other => Self::String(other.to_string()),
        }
    }
}

impl ArrayValue {
    fn from_array(array: &Array) -> Self {
        let values = match array {
            Array::Bool(items) => items.iter().map(|b| AnyValue::Bool(*b)).collect(),
            Array::I64(items) => items.iter().map(|i| AnyValue::Int(*i)).collect(),
            Array::F64(items) => items.iter().map(|f| AnyValue::Double(*f)).collect(),
            Array::String(items) => items.iter().map(|s| AnyValue::String(s.to_string())).collect(),
            // Array is non_exhaustive upstream.
            _ => Vec::new(),
        };
        Self { values }
    }
}

impl StatusModel {
    fn from_status(status: &Status) -> Self {
        match status {
            Status::Ok => Self { code: STATUS_OK, message: None },
            Status::Error { description } if description.is_empty() => {
                Self { code: STATUS_ERROR, message: None }
            }
            Status::Error { description } => Self {
                code: STATUS_ERROR,
                message: Some(description.to_string()),
            },
            _ => Self { code: STATUS_UNSET, message: None },
        }
    }
}

fn kind_code(kind: &SpanKind) -> u32 {
    match kind {
        SpanKind::Internal => 1,
        SpanKind::Server => 2,
        SpanKind::Client => 3,
        SpanKind::Producer => 4,
        SpanKind::Consumer => 5,
    }
}

fn unix_nanos(time: SystemTime) -> String {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use opentelemetry::trace::{SpanContext, TraceFlags, TraceId, TraceState};
    use opentelemetry::InstrumentationScope;
    use opentelemetry_sdk::trace::{SpanEvents, SpanLinks};

    fn span_data(name: &'static str, parent: SpanId) -> SpanData {
        SpanData {
            span_context: SpanContext::new(
                TraceId::from_hex("0af7651916cd43dd8448eb211c80319c").unwrap(),
                SpanId::from_hex("00f067aa0ba902b7").unwrap(),
                TraceFlags::SAMPLED,
                false,
                TraceState::default(),
            ),
            parent_span_id: parent,
            span_kind: SpanKind::Internal,
            name: name.into(),
            start_time: UNIX_EPOCH + Duration::from_nanos(1_700_000_000_000_000_001),
            end_time: UNIX_EPOCH + Duration::from_nanos(1_700_000_000_000_000_501),
            attributes: vec![KeyValue::new("rows", 5_i64)],
            dropped_attributes_count: 0,
            events: SpanEvents::default(),
            links: SpanLinks::default(),
            status: Status::Unset,
            instrumentation_scope: InstrumentationScope::builder("roster-telemetry")
                .with_version("0.1.0")
                .build(),
        }
    }

    #[test]
    fn serializes_hex_ids_and_camel_case_keys() {
        let resource = Resource::builder_empty().build();
        let request = ExportTraceRequest::from_spans(&[span_data("load-profiles", SpanId::INVALID)], &resource);

        let json = serde_json::to_value(&request).unwrap();
        let span = &json["resourceSpans"][0]["scopeSpans"][0]["spans"][0];
        assert_eq!(span["traceId"], "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(span["spanId"], "00f067aa0ba902b7");
        assert_eq!(span["name"], "load-profiles");
        assert_eq!(span["kind"], 1);
        assert_eq!(span["startTimeUnixNano"], "1700000000000000001");
        assert_eq!(span["endTimeUnixNano"], "1700000000000000501");
        assert_eq!(span["flags"], 1);
        assert_eq!(span["status"]["code"], 0);
        assert!(span.get("parentSpanId").is_none());
    }

    #[test]
    fn root_and_child_parent_ids() {
        let resource = Resource::builder_empty().build();
        let parent = SpanId::from_hex("b7ad6b7169203331").unwrap();
        let request = ExportTraceRequest::from_spans(&[span_data("seed-profiles", parent)], &resource);

        let span = request.spans().next().unwrap();
        assert_eq!(span.parent_span_id.as_deref(), Some("b7ad6b7169203331"));
    }

    #[test]
    fn attributes_use_tagged_values() {
        let resource = Resource::builder_empty().build();
        let mut data = span_data("load-profiles", SpanId::INVALID);
        data.attributes.push(KeyValue::new(
            "labels",
            Value::Array(Array::String(vec!["seeded".into(), "retried".into()])),
        ));
        let request = ExportTraceRequest::from_spans(&[data], &resource);

        let json = serde_json::to_value(&request).unwrap();
        let attrs = &json["resourceSpans"][0]["scopeSpans"][0]["spans"][0]["attributes"];
        assert_eq!(attrs[0]["key"], "rows");
        assert_eq!(attrs[0]["value"]["intValue"], 5);
        assert_eq!(attrs[1]["value"]["arrayValue"]["values"][0]["stringValue"], "seeded");
        assert_eq!(attrs[1]["value"]["arrayValue"]["values"][1]["stringValue"], "retried");
    }

    #[test]
    fn resource_attributes_are_carried() {
        let resource = Resource::builder_empty()
            .with_attribute(KeyValue::new("env", "production"))
            .build();
        let request = ExportTraceRequest::from_spans(&[span_data("load-profiles", SpanId::INVALID)], &resource);

        let attrs = &request.resource_spans[0].resource.attributes;
        assert!(attrs.contains(&KeyValueModel {
            key: "env".to_string(),
            value: AnyValue::String("production".to_string()),
        }));
    }

    #[test]
    fn error_status_carries_the_message() {
        let resource = Resource::builder_empty().build();
        let mut data = span_data("load-profiles", SpanId::INVALID);
        data.status = Status::error("relation does not exist");
        let request = ExportTraceRequest::from_spans(&[data], &resource);

        let span = request.spans().next().unwrap();
        assert_eq!(span.status.code, 2);
        assert_eq!(span.status.message.as_deref(), Some("relation does not exist"));
    }

    #[test]
    fn scope_carries_name_and_version() {
        let resource = Resource::builder_empty().build();
        let request = ExportTraceRequest::from_spans(&[span_data("load-profiles", SpanId::INVALID)], &resource);

        let scope = &request.resource_spans[0].scope_spans[0].scope;
        assert_eq!(scope.name, "roster-telemetry");
        assert_eq!(scope.version.as_deref(), Some("0.1.0"));
    }
}
