//! Structural classification of JSON-RPC frames.
//!
//! Only the shape of a frame matters here: whether it carries `method` and
//! `id`. Nothing about protocol semantics is validated.

use serde_json::Value;

/// Correlation id keyed by its canonical JSON text.
///
/// `1` and `"1"` are different ids, matching how JSON-RPC peers compare them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Build from a JSON value; `null` is treated as no id.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            other => Some(Self(other.to_string())),
        }
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shape of a parsed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    /// Has both `method` and `id`.
    Request { id: CorrelationId, method: String },
    /// Has `method` but no `id`.
    Notification { method: String },
    /// Has `id` but no `method`.
    Response { id: CorrelationId, is_error: bool },
}

impl Classified {
    /// Method carried directly by the frame.
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method } => Some(method),
            Self::Response { .. } => None,
        }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Response { is_error: true, .. })
    }
}

/// A present, non-null `method` names the frame's method. Non-string values
/// are kept in their JSON text form.
fn method_name(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(name) => Some(name.clone()),
        other => Some(other.to_string()),
    }
}

/// Classify a frame, or `None` when it is not a JSON object of a known shape.
pub fn classify(frame: &str) -> Option<Classified> {
    let value: Value = serde_json::from_str(frame).ok()?;
    let object = value.as_object()?;

    let method = object.get("method").and_then(method_name);
    let id = object.get("id").and_then(CorrelationId::from_value);

    match (method, id) {
        (Some(method), Some(id)) => Some(Classified::Request { id, method }),
        (Some(method), None) => Some(Classified::Notification { method }),
        (None, Some(id)) => {
            let is_error = object.get("error").is_some_and(|e| !e.is_null());
            Some(Classified::Response { id, is_error })
        }
        (None, None) => None,
    }
}
